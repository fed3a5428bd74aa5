//! Case runner: executes one test case's steps in order under a deadline

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use stepwise_common::{
    CaseTermination, EngineConfig, EvidenceConfig, StepResult, TestCase, TestCaseResult,
};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, info_span, warn, Instrument};

use crate::browser::{NetworkLog, Page};
use crate::classifier::{normalize, Classifier};
use crate::error::StepError;
use crate::evidence::EvidenceDir;
use crate::executor::{ExecutorSettings, StepExecutor};
use crate::resolver::SelectorResolver;
use crate::variables::VariableContext;

/// A step result published while a case runs.
///
/// Each step is published twice: once as PENDING when it starts and once
/// with its final status.
#[derive(Debug, Clone)]
pub struct StepProgress {
    pub run_id: String,
    pub case_id: String,
    pub result: StepResult,
}

/// Runs cases against a shared page; holds no per-case state
pub struct CaseRunner {
    classifier: Classifier,
    resolver: Arc<dyn SelectorResolver>,
    settings: ExecutorSettings,
    case_timeout: Duration,
    evidence: EvidenceConfig,
    run_id: String,
    base_url: String,
    progress: Option<UnboundedSender<StepProgress>>,
}

impl CaseRunner {
    pub fn new(
        config: &EngineConfig,
        resolver: Arc<dyn SelectorResolver>,
        run_id: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            classifier: Classifier::new(
                config.execution.max_conditional_depth,
                config.execution.default_wait_secs,
            ),
            resolver,
            settings: ExecutorSettings::from(&config.execution),
            case_timeout: config.execution.case_timeout(),
            evidence: config.evidence.clone(),
            run_id: run_id.into(),
            base_url: base_url.into(),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: UnboundedSender<StepProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Execute `case` to a terminal state. Always returns a result.
    pub async fn run(&self, case: &TestCase, page: &dyn Page) -> TestCaseResult {
        let span = info_span!("case", id = %case.id);
        self.run_inner(case, page).instrument(span).await
    }

    async fn run_inner(&self, case: &TestCase, page: &dyn Page) -> TestCaseResult {
        let started_at = Utc::now();
        info!("Running case: {} ({} steps)", case.name, case.steps.len());

        let network = self.evidence.capture_network.then(NetworkLog::new);
        page.capture_responses(network.clone());

        let mut executor = StepExecutor::new(
            self.resolver.clone(),
            self.settings.clone(),
            self.base_url.clone(),
        );
        if self.evidence.capture_screenshots {
            executor = executor.with_evidence(EvidenceDir::new(
                &self.evidence.output_dir,
                &self.run_id,
                &case.id,
            ));
        }

        let mut vars = VariableContext::new();
        let mut steps = Vec::with_capacity(case.steps.len());

        // Whichever finishes first wins; a step still in flight when the
        // deadline fires is dropped and never recorded.
        let termination = tokio::select! {
            termination = self.run_steps(case, page, &executor, &mut vars, network.as_deref(), &mut steps) => termination,
            _ = tokio::time::sleep(self.case_timeout) => CaseTermination::TimedOut,
        };

        page.capture_responses(None);
        drop(vars);

        let error = match termination {
            CaseTermination::TimedOut => {
                let e = StepError::CaseTimeout {
                    timeout_secs: self.case_timeout.as_secs(),
                };
                warn!("Case {}: {} after {} steps", case.id, e, steps.len());
                Some(e.to_string())
            }
            _ => None,
        };

        let result = TestCaseResult::new(case, steps, termination, started_at, error);
        info!(
            "Case {} finished: {} ({}/{} passed, {})",
            case.id, result.status, result.summary.passed, result.summary.total, termination
        );
        result
    }

    async fn run_steps(
        &self,
        case: &TestCase,
        page: &dyn Page,
        executor: &StepExecutor,
        vars: &mut VariableContext,
        network: Option<&NetworkLog>,
        steps: &mut Vec<StepResult>,
    ) -> CaseTermination {
        for (index, raw) in case.steps.iter().enumerate() {
            let text = vars.substitute(raw);
            let description = normalize(&text).to_string();
            let action = self.classifier.classify(&text);

            self.publish(case, StepResult::pending(index, description.as_str()));
            let mut result = executor
                .execute(index, &description, &action, page, vars)
                .await;
            if let Some(log) = network {
                result.network = Some(log.drain());
            }
            self.publish(case, result.clone());

            let failed = result.is_fail();
            steps.push(result);
            if failed {
                return CaseTermination::Aborted;
            }
        }
        CaseTermination::Completed
    }

    fn publish(&self, case: &TestCase, result: StepResult) {
        if let Some(tx) = &self.progress {
            // A dropped receiver only means nobody is watching
            let _ = tx.send(StepProgress {
                run_id: self.run_id.clone(),
                case_id: case.id.clone(),
                result,
            });
        }
    }
}
