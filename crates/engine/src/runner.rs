//! Run orchestrator: one browser session, every case in order, guaranteed cleanup

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::Utc;
use futures::FutureExt;
use stepwise_common::{EngineConfig, RunReport, TestCase, TestCaseResult};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::auth::authenticate;
use crate::browser::{BrowserEngine, BrowserSession, LaunchOptions, LoadState};
use crate::case::{CaseRunner, StepProgress};
use crate::error::{RunError, RunResult};
use crate::resolver::{CandidateResolver, SelectorResolver};

/// Entry point for executing a set of cases against a target
pub struct Runner {
    engine: Arc<dyn BrowserEngine>,
    resolver: Option<Arc<dyn SelectorResolver>>,
    progress: Option<UnboundedSender<StepProgress>>,
}

impl Runner {
    pub fn new(engine: Arc<dyn BrowserEngine>) -> Self {
        Self {
            engine,
            resolver: None,
            progress: None,
        }
    }

    /// Use `resolver` instead of one built from the run's configuration
    pub fn with_resolver(mut self, resolver: Arc<dyn SelectorResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Publish step progress on `progress` while cases run
    pub fn with_progress(mut self, progress: UnboundedSender<StepProgress>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run `cases` in order against `target_url`.
    ///
    /// Never fails: a run-fatal problem (launch, login, first navigation, or a
    /// panic during case execution) lands in [`RunReport::error`]. The browser
    /// session is closed on every path once launched.
    pub async fn execute(
        &self,
        cases: &[TestCase],
        config: &EngineConfig,
        target_url: &str,
    ) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("run", id = %run_id, url = %target_url);
        self.execute_inner(run_id, cases, config, target_url)
            .instrument(span)
            .await
    }

    async fn execute_inner(
        &self,
        run_id: String,
        cases: &[TestCase],
        config: &EngineConfig,
        target_url: &str,
    ) -> RunReport {
        let started_at = Utc::now();
        info!("Starting run against {} ({} case(s))", target_url, cases.len());

        let options = LaunchOptions::from(&config.browser);
        let mut session = match self.engine.launch(&options).await {
            Ok(session) => session,
            Err(e) => {
                let e = RunError::Launch(e);
                error!("{}", e);
                return RunReport::new(run_id, target_url, started_at, Vec::new(), Some(e.to_string()));
            }
        };

        let mut results = Vec::with_capacity(cases.len());
        let outcome = AssertUnwindSafe(self.run_session(
            session.as_mut(),
            &run_id,
            cases,
            config,
            target_url,
            &mut results,
        ))
        .catch_unwind()
        .await;

        if let Err(e) = session.close().await {
            warn!("Failed to close browser session: {}", e);
        }

        let error = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(e)) => {
                // Setup failed before any case ran
                error!("{}", e);
                results.clear();
                Some(e.to_string())
            }
            Err(panic) => {
                let e = RunError::Panicked(panic_message(panic.as_ref()));
                error!("{}", e);
                Some(e.to_string())
            }
        };

        let report = RunReport::new(run_id, target_url, started_at, results, error);
        info!(
            "Run finished: {} passed, {} failed ({} ms)",
            report.summary.passed_cases, report.summary.failed_cases, report.summary.duration_ms
        );
        report
    }

    async fn run_session(
        &self,
        session: &mut dyn BrowserSession,
        run_id: &str,
        cases: &[TestCase],
        config: &EngineConfig,
        target_url: &str,
        results: &mut Vec<TestCaseResult>,
    ) -> RunResult<()> {
        let page = session.open_page().await.map_err(RunError::Page)?;
        let navigation_timeout = config.execution.navigation_timeout();

        if config.authentication.enabled {
            authenticate(page.as_ref(), &config.authentication, target_url, navigation_timeout)
                .await?;
        }

        page.goto(target_url, LoadState::DomContentLoaded, navigation_timeout)
            .await
            .map_err(|source| RunError::Navigation {
                url: target_url.to_string(),
                source,
            })?;

        let resolver: Arc<dyn SelectorResolver> = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(CandidateResolver::new(&config.resolver)),
        };
        let mut runner = CaseRunner::new(config, resolver, run_id, target_url);
        if let Some(progress) = &self.progress {
            runner = runner.with_progress(progress.clone());
        }

        for case in cases {
            let result = runner.run(case, page.as_ref()).await;
            results.push(result);
        }
        Ok(())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
