//! Run Command

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use stepwise_common::{cases, write_json, BrowserKind, EngineConfig};
use stepwise_engine::{PlaywrightEngine, Runner, StepProgress};
use tokio::sync::mpsc;

use crate::output::{self, OutputFormat};

/// Exit code when every case passed
pub const EXIT_PASSED: i32 = 0;
/// Exit code when the run completed with failing cases
pub const EXIT_FAILED: i32 = 1;
/// Exit code when the run could not execute
pub const EXIT_ERROR: i32 = 2;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Case file, or directory searched for .yaml/.yml/.json case files
    #[arg(short, long, default_value = "cases")]
    pub cases: PathBuf,

    /// URL opened before the first case
    #[arg(short, long, env = "STEPWISE_TARGET_URL")]
    pub url: String,

    /// Run only cases carrying this tag
    #[arg(short, long)]
    pub tag: Option<String>,

    /// Run only the case with this id
    #[arg(long = "case")]
    pub case_id: Option<String>,

    /// Write the JSON report here
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Browser engine (chromium, firefox)
    #[arg(long)]
    pub browser: Option<BrowserKind>,

    /// Show the browser window when the environment allows it
    #[arg(long)]
    pub headed: bool,

    /// Skip screenshot evidence
    #[arg(long)]
    pub no_screenshots: bool,

    /// Record network responses per step
    #[arg(long)]
    pub network: bool,

    /// Directory for screenshot evidence
    #[arg(long)]
    pub evidence_dir: Option<PathBuf>,
}

impl RunArgs {
    /// Fold command-line overrides into the loaded configuration
    fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if let Some(kind) = self.browser {
            config.browser.kind = kind;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.no_screenshots {
            config.evidence.capture_screenshots = false;
        }
        if self.network {
            config.evidence.capture_network = true;
        }
        if let Some(dir) = &self.evidence_dir {
            config.evidence.output_dir = dir.clone();
        }
        config
    }
}

/// Load configuration: file, then environment, then flags
pub fn load_config(path: &Path, args: &RunArgs) -> Result<EngineConfig> {
    let config = EngineConfig::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?
        .apply_env()?;
    let config = args.apply(config);
    config.validate()?;
    Ok(config)
}

/// Run the selected cases; returns the process exit code
pub async fn execute(args: RunArgs, config_path: &Path, format: OutputFormat) -> Result<i32> {
    let config = load_config(config_path, &args)?;

    let mut selected = cases::load_all(&args.cases)
        .with_context(|| format!("failed to load cases from {}", args.cases.display()))?;
    if let Some(tag) = &args.tag {
        selected = cases::filter_by_tag(selected, tag);
    }
    if let Some(id) = &args.case_id {
        selected = vec![cases::find(&selected, id)?];
    }
    if selected.is_empty() {
        output::print_warning("No cases matched; nothing to run.");
        return Ok(EXIT_PASSED);
    }

    tracing::info!("Loaded {} case(s) from {}", selected.len(), args.cases.display());

    let engine = Arc::new(PlaywrightEngine::new(&config.browser));
    let mut runner = Runner::new(engine);

    // Live step lines only make sense for humans
    let printer = if format == OutputFormat::Table {
        let (tx, mut rx) = mpsc::unbounded_channel::<StepProgress>();
        runner = runner.with_progress(tx);
        Some(tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                output::print_step(&event.case_id, &event.result);
            }
        }))
    } else {
        None
    };

    let report = runner.execute(&selected, &config, &args.url).await;
    drop(runner);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    if let Some(path) = &args.output {
        write_json(path, &report)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!("Report written to: {}", path.display());
    }

    output::print_report(&report, format);

    Ok(if report.error.is_some() {
        EXIT_ERROR
    } else if report.is_success() {
        EXIT_PASSED
    } else {
        EXIT_FAILED
    })
}
