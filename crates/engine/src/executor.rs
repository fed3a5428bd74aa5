//! Step executor: performs one classified action against a page

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use stepwise_common::{ExecutionConfig, StepNote, StepResult};
use tracing::{debug, warn};

use crate::action::{Action, ActionKind, TargetSpec, WaitState};
use crate::browser::{LoadState, Page};
use crate::error::{EngineError, EngineResult, StepError};
use crate::evidence::EvidenceDir;
use crate::resolver::SelectorResolver;
use crate::variables::VariableContext;

/// Slack granted on top of an operation's own timeout before we stop waiting for the engine
const ENGINE_GRACE: Duration = Duration::from_secs(1);

/// Timeouts and delays applied by the executor
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub candidate_timeout: Duration,
    pub wait_timeout: Duration,
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
}

impl From<&ExecutionConfig> for ExecutorSettings {
    fn from(config: &ExecutionConfig) -> Self {
        Self {
            candidate_timeout: config.candidate_timeout(),
            wait_timeout: config.wait_timeout(),
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
        }
    }
}

/// How a step that did not fail ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Done,
    Skipped(StepNote),
}

/// Element operation attempted against each candidate
#[derive(Clone, Copy)]
enum ElementOp<'a> {
    Click,
    Fill(&'a str),
    Read,
}

/// Executes one action per step; built once per case
pub struct StepExecutor {
    resolver: Arc<dyn SelectorResolver>,
    settings: ExecutorSettings,
    base_url: String,
    evidence: Option<EvidenceDir>,
}

impl StepExecutor {
    pub fn new(
        resolver: Arc<dyn SelectorResolver>,
        settings: ExecutorSettings,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            settings,
            base_url: base_url.into(),
            evidence: None,
        }
    }

    /// Capture a screenshot after each step into `evidence`
    pub fn with_evidence(mut self, evidence: EvidenceDir) -> Self {
        self.evidence = Some(evidence);
        self
    }

    /// Run `action` and produce the finished result for step `index`.
    ///
    /// Never returns an error: failures are recorded on the result. The
    /// settle delay is applied before returning, pass or fail.
    pub async fn execute(
        &self,
        index: usize,
        description: &str,
        action: &Action,
        page: &dyn Page,
        vars: &mut VariableContext,
    ) -> StepResult {
        let pending = StepResult::pending(index, description);
        debug!("Step {}: {}", index + 1, action.describe());

        let mut result = match self.perform(action, page, vars).await {
            Ok(Completion::Done) => pending.pass(),
            Ok(Completion::Skipped(note)) => pending.pass().with_note(note),
            Err(e) => {
                warn!("Step {} failed: {}", index + 1, e);
                pending.fail(e.to_string())
            }
        };

        if let Some(evidence) = &self.evidence {
            match evidence.capture(page, index).await {
                Ok(artifact) => result.screenshot = Some(artifact),
                Err(e) => warn!("Step {}: {}", index + 1, e),
            }
        }

        if !self.settings.settle_delay.is_zero() {
            tokio::time::sleep(self.settings.settle_delay).await;
        }
        result
    }

    fn perform<'a>(
        &'a self,
        action: &'a Action,
        page: &'a dyn Page,
        vars: &'a mut VariableContext,
    ) -> BoxFuture<'a, Result<Completion, StepError>> {
        async move {
            match action {
                Action::Navigate { url } => {
                    let url = self.absolute_url(url);
                    let timeout = self.settings.navigation_timeout;
                    bounded(
                        format!("navigating to {}", url),
                        timeout,
                        page.goto(&url, LoadState::DomContentLoaded, timeout),
                    )
                    .await?;
                }
                Action::Click { target } => {
                    self.cascade(page, target, ActionKind::Click, ElementOp::Click)
                        .await?;
                }
                Action::Fill { value, target } => {
                    self.cascade(page, target, ActionKind::Fill, ElementOp::Fill(value))
                        .await?;
                }
                Action::Store { source, variable } => {
                    let text = self
                        .cascade(page, source, ActionKind::Store, ElementOp::Read)
                        .await?
                        .unwrap_or_default();
                    debug!("Stored {} = {:?}", variable, text.trim());
                    vars.set(variable.as_str(), &text);
                }
                Action::Verify { target } => {
                    let locator = self.presence_locator(target, ActionKind::Verify)?;
                    let timeout = self.settings.wait_timeout;
                    bounded(
                        format!("verify {}", target),
                        timeout,
                        page.wait_for(&locator, WaitState::Visible, timeout),
                    )
                    .await
                    .map_err(|e| element_error(e, ActionKind::Verify, target))?;
                }
                Action::WaitFor { target, state } => {
                    let locator = self.presence_locator(target, ActionKind::WaitFor)?;
                    let timeout = self.settings.wait_timeout;
                    let operation = format!("waiting for {} to be {}", target, state.as_str());
                    bounded(operation.clone(), timeout, page.wait_for(&locator, *state, timeout))
                        .await
                        .map_err(|e| match e {
                            EngineError::Timeout { timeout_ms, .. } => {
                                StepError::ActionTimeout { operation, timeout_ms }
                            }
                            other => other.into(),
                        })?;
                }
                Action::WaitForLoad => {
                    let timeout = self.settings.navigation_timeout;
                    bounded(
                        "waiting for the page to load".to_string(),
                        timeout,
                        page.wait_for_load(LoadState::Load, timeout),
                    )
                    .await?;
                }
                Action::WaitDuration { seconds } => {
                    let delay = Duration::try_from_secs_f64(*seconds).map_err(|_| {
                        StepError::EngineFailure(format!("invalid wait of {} seconds", seconds))
                    })?;
                    tokio::time::sleep(delay).await;
                }
                Action::Conditional { target, condition, then } => {
                    if !self.probe(page, target, (*condition).into()).await {
                        debug!("Condition on {} not met, skipping", target);
                        return Ok(Completion::Skipped(StepNote::ConditionNotMet));
                    }
                    return self.perform(then, page, vars).await;
                }
                Action::Unknown { text } => {
                    warn!("Unrecognized step, treating as no-op: {}", text);
                    return Ok(Completion::Skipped(StepNote::Unrecognized));
                }
            }
            Ok(Completion::Done)
        }
        .boxed()
    }

    /// Try each candidate in order until one succeeds.
    ///
    /// Explicit targets are used as-is with the full wait timeout. Implied
    /// targets go through the resolver and get the shorter per-candidate timeout.
    async fn cascade(
        &self,
        page: &dyn Page,
        target: &TargetSpec,
        kind: ActionKind,
        op: ElementOp<'_>,
    ) -> Result<Option<String>, StepError> {
        let (candidates, timeout) = match target {
            TargetSpec::Explicit(locator) => (vec![locator.clone()], self.settings.wait_timeout),
            TargetSpec::Implied(hint) => (
                self.resolver.resolve(hint, kind),
                self.settings.candidate_timeout,
            ),
        };

        for (attempt, locator) in candidates.iter().enumerate() {
            let operation = format!("{} {}", kind.verb(), locator);
            let outcome = match op {
                ElementOp::Click => bounded(operation, timeout, page.click(locator, timeout))
                    .await
                    .map(|_| None),
                ElementOp::Fill(value) => {
                    bounded(operation, timeout, page.fill(locator, value, timeout))
                        .await
                        .map(|_| None)
                }
                ElementOp::Read => bounded(operation, timeout, page.read_text(locator, timeout))
                    .await
                    .map(Some),
            };

            match outcome {
                Ok(value) => {
                    debug!("Resolved {} via {} (attempt {})", target, locator, attempt + 1);
                    return Ok(value);
                }
                Err(e) if e.is_fatal() => return Err(StepError::EngineFailure(e.to_string())),
                Err(e) => debug!("Candidate {} failed: {}", locator, e),
            }
        }

        Err(resolution_failure(kind, target))
    }

    /// Existence check for a conditional; any engine error reads as "absent"
    async fn probe(&self, page: &dyn Page, target: &TargetSpec, state: WaitState) -> bool {
        let Ok(locator) = self.presence_locator(target, ActionKind::Conditional) else {
            return false;
        };
        let timeout = self.settings.candidate_timeout;
        bounded(
            format!("probe {}", locator),
            timeout,
            page.wait_for(&locator, state, timeout),
        )
        .await
        .is_ok()
    }

    /// Presence checks use a single locator
    fn presence_locator(&self, target: &TargetSpec, kind: ActionKind) -> Result<String, StepError> {
        match target {
            TargetSpec::Explicit(locator) => Ok(locator.clone()),
            TargetSpec::Implied(hint) => self
                .resolver
                .resolve(hint, kind)
                .into_iter()
                .next()
                .ok_or_else(|| resolution_failure(kind, target)),
        }
    }

    /// Resolve a relative navigation target against the run's base URL
    fn absolute_url(&self, url: &str) -> String {
        if !url.starts_with('/') || self.base_url.is_empty() {
            return url.to_string();
        }
        match origin(&self.base_url) {
            Some(origin) => format!("{}{}", origin, url),
            None => url.to_string(),
        }
    }
}

/// `scheme://host[:port]` of an absolute URL
fn origin(url: &str) -> Option<&str> {
    let scheme_end = url.find("://")? + 3;
    let host_end = url[scheme_end..]
        .find(&['/', '?', '#'][..])
        .map(|i| scheme_end + i)
        .unwrap_or(url.len());
    Some(&url[..host_end])
}

fn resolution_failure(kind: ActionKind, target: &TargetSpec) -> StepError {
    StepError::ResolutionFailure {
        action: kind.verb(),
        hint: target.to_string(),
    }
}

/// Element-level failures read as resolution failures unless the engine is gone
fn element_error(e: EngineError, kind: ActionKind, target: &TargetSpec) -> StepError {
    if e.is_fatal() {
        StepError::EngineFailure(e.to_string())
    } else {
        resolution_failure(kind, target)
    }
}

/// Await an engine call, giving up shortly after its own timeout would have fired
async fn bounded<T, F>(operation: String, timeout: Duration, call: F) -> EngineResult<T>
where
    F: Future<Output = EngineResult<T>>,
{
    match tokio::time::timeout(timeout + ENGINE_GRACE, call).await {
        Ok(result) => result,
        Err(_) => Err(EngineError::Timeout {
            operation,
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::CandidateResolver;

    fn executor(base_url: &str) -> StepExecutor {
        StepExecutor::new(
            Arc::new(CandidateResolver::default()),
            ExecutorSettings::from(&ExecutionConfig::default()),
            base_url,
        )
    }

    #[test]
    fn test_relative_urls_join_the_origin() {
        let exec = executor("https://shop.test/app/home?x=1");
        assert_eq!(exec.absolute_url("/login"), "https://shop.test/login");
        assert_eq!(exec.absolute_url("https://other.test/"), "https://other.test/");
    }

    #[test]
    fn test_relative_url_without_base_is_kept() {
        assert_eq!(executor("").absolute_url("/login"), "/login");
    }

    #[test]
    fn test_origin_keeps_port() {
        assert_eq!(origin("http://localhost:8080/a/b"), Some("http://localhost:8080"));
        assert_eq!(origin("https://x.test"), Some("https://x.test"));
        assert_eq!(origin("not a url"), None);
    }

    #[test]
    fn test_resolution_failure_message_names_hint() {
        let err = resolution_failure(ActionKind::Fill, &TargetSpec::parse("\"Username\""));
        assert_eq!(err.to_string(), "Could not find element to fill: \"Username\"");
    }
}
