//! Core types for Stepwise

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A test case as written by its author: metadata plus free-text steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    /// Stable identifier, used in evidence paths and reports; generated when omitted
    #[serde(default = "generate_case_id")]
    pub id: String,

    /// Human-readable name
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Tags for filtering cases
    #[serde(default)]
    pub tags: Vec<String>,

    /// Step instructions, executed in order
    pub steps: Vec<String>,
}

fn generate_case_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("case-{}", &id[..8])
}

impl TestCase {
    pub fn new(id: impl Into<String>, steps: Vec<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            tags: Vec::new(),
            steps,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Pass,
    Fail,
    /// Step has started but not finished; only seen on progress events
    Pending,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pass => write!(f, "PASS"),
            StepStatus::Fail => write!(f, "FAIL"),
            StepStatus::Pending => write!(f, "PENDING"),
        }
    }
}

/// Marker distinguishing a deliberate no-op pass from a normal one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepNote {
    /// The instruction matched no grammar rule and was skipped
    Unrecognized,
    /// A conditional step whose probe was false; the nested action did not run
    ConditionNotMet,
}

/// One HTTP response observed while a step was executing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLogEntry {
    pub url: String,
    pub method: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
    pub elapsed_ms: u64,
}

/// Screenshot written to disk as step evidence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotArtifact {
    pub path: PathBuf,
    pub bytes: usize,
    pub sha256: String,
}

/// Result of executing one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// Zero-based position within the case
    pub index: usize,

    /// Step text after variable substitution
    pub description: String,

    pub status: StepStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<StepNote>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<ScreenshotArtifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<Vec<NetworkLogEntry>>,
}

impl StepResult {
    /// A step that has started and not yet finished
    pub fn pending(index: usize, description: impl Into<String>) -> Self {
        Self {
            index,
            description: description.into(),
            status: StepStatus::Pending,
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
            error: None,
            note: None,
            screenshot: None,
            network: None,
        }
    }

    /// Finish a pending step as passed
    pub fn pass(mut self) -> Self {
        self.finish(StepStatus::Pass);
        self
    }

    /// Finish a pending step as failed
    pub fn fail(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self.finish(StepStatus::Fail);
        self
    }

    pub fn with_note(mut self, note: StepNote) -> Self {
        self.note = Some(note);
        self
    }

    fn finish(&mut self, status: StepStatus) {
        let now = Utc::now();
        self.status = status;
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0) as u64;
        self.finished_at = Some(now);
    }

    pub fn is_pass(&self) -> bool {
        self.status == StepStatus::Pass
    }

    pub fn is_fail(&self) -> bool {
        self.status == StepStatus::Fail
    }
}

/// Overall case status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CaseStatus {
    Pass,
    Fail,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Pass => write!(f, "PASS"),
            CaseStatus::Fail => write!(f, "FAIL"),
        }
    }
}

/// Terminal state of the case runner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseTermination {
    /// Every declared step ran
    Completed,
    /// The case deadline fired before the step loop finished
    TimedOut,
    /// A step failed and the remaining steps were skipped
    Aborted,
}

impl std::fmt::Display for CaseTermination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseTermination::Completed => write!(f, "completed"),
            CaseTermination::TimedOut => write!(f, "timed_out"),
            CaseTermination::Aborted => write!(f, "aborted"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub passed: usize,
    pub failed: usize,
    /// Executed steps
    pub executed: usize,
    /// Declared steps
    pub total: usize,
}

/// Result of running one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub case_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<StepResult>,
    pub summary: CaseSummary,
    pub status: CaseStatus,
    pub termination: CaseTermination,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseResult {
    /// Build a case result; summary and status are derived from the step history
    pub fn new(
        case: &TestCase,
        steps: Vec<StepResult>,
        termination: CaseTermination,
        started_at: DateTime<Utc>,
        error: Option<String>,
    ) -> Self {
        let finished_at = Utc::now();
        let passed = steps.iter().filter(|s| s.is_pass()).count();
        let failed = steps.iter().filter(|s| s.is_fail()).count();
        let summary = CaseSummary {
            passed,
            failed,
            executed: steps.len(),
            total: case.steps.len(),
        };
        let status = if failed == 0 && steps.len() == case.steps.len() {
            CaseStatus::Pass
        } else {
            CaseStatus::Fail
        };

        Self {
            case_id: case.id.clone(),
            name: case.name.clone(),
            description: case.description.clone(),
            tags: case.tags.clone(),
            steps,
            summary,
            status,
            termination,
            started_at,
            finished_at,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
            error,
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == CaseStatus::Pass
    }
}

/// Aggregated counts for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_cases: usize,
    pub passed_cases: usize,
    pub failed_cases: usize,
    pub total_steps: usize,
    pub passed_steps: usize,
    pub failed_steps: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn from_cases(cases: &[TestCaseResult], duration_ms: u64) -> Self {
        let passed_cases = cases.iter().filter(|c| c.is_pass()).count();
        Self {
            total_cases: cases.len(),
            passed_cases,
            failed_cases: cases.len() - passed_cases,
            total_steps: cases.iter().map(|c| c.summary.total).sum(),
            passed_steps: cases.iter().map(|c| c.summary.passed).sum(),
            failed_steps: cases.iter().map(|c| c.summary.failed).sum(),
            duration_ms,
        }
    }
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub summary: RunSummary,
    pub cases: Vec<TestCaseResult>,
    /// Set only when the run could not execute its cases
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunReport {
    pub fn new(
        run_id: impl Into<String>,
        target_url: impl Into<String>,
        started_at: DateTime<Utc>,
        cases: Vec<TestCaseResult>,
        error: Option<String>,
    ) -> Self {
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            run_id: run_id.into(),
            target_url: target_url.into(),
            started_at,
            finished_at,
            summary: RunSummary::from_cases(&cases, duration_ms),
            cases,
            error,
        }
    }

    /// True when there is no run-level error and every case passed
    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.cases.iter().all(TestCaseResult::is_pass)
    }
}
