//! Classify Command
//!
//! Shows how a step sentence is understood without opening a browser.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use stepwise_common::EngineConfig;
use stepwise_engine::{Action, CandidateResolver, Classifier, SelectorResolver, TargetSpec};

use crate::output::{print_serialized, OutputFormat};

#[derive(Args, Debug)]
pub struct ClassifyArgs {
    /// Step sentences to classify
    #[arg(required = true)]
    pub steps: Vec<String>,
}

/// Classification of one step plus the locators it would try
#[derive(Debug, Serialize)]
pub struct Classification {
    pub step: String,
    pub action: Action,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<String>,
}

/// Classify `step` and expand its target the way the executor would
pub fn classify(step: &str, config: &EngineConfig) -> Classification {
    let classifier = Classifier::new(
        config.execution.max_conditional_depth,
        config.execution.default_wait_secs,
    );
    let resolver = CandidateResolver::new(&config.resolver);
    let action = classifier.classify(step);
    let candidates = candidates(&action, &resolver);
    Classification {
        step: step.to_string(),
        action,
        candidates,
    }
}

fn candidates(action: &Action, resolver: &dyn SelectorResolver) -> Vec<String> {
    let target = match action {
        Action::Click { target }
        | Action::Fill { target, .. }
        | Action::Verify { target }
        | Action::WaitFor { target, .. } => target,
        Action::Store { source, .. } => source,
        Action::Conditional { then, .. } => return candidates(then, resolver),
        Action::Navigate { .. }
        | Action::WaitForLoad
        | Action::WaitDuration { .. }
        | Action::Unknown { .. } => return Vec::new(),
    };
    match target {
        TargetSpec::Explicit(locator) => vec![locator.clone()],
        TargetSpec::Implied(hint) => resolver.resolve(hint, action.kind()),
    }
}

pub fn execute(args: ClassifyArgs, config: &EngineConfig, format: OutputFormat) -> Result<()> {
    let results: Vec<Classification> = args.steps.iter().map(|s| classify(s, config)).collect();

    if format != OutputFormat::Table {
        print_serialized(&results, format);
        return Ok(());
    }

    for result in &results {
        println!("{}", result.step.bold());
        println!("  {} {}", "action:".dimmed(), result.action.describe());
        for (i, candidate) in result.candidates.iter().enumerate() {
            println!("  {} {}", format!("{:>2}.", i + 1).dimmed(), candidate);
        }
    }
    Ok(())
}
