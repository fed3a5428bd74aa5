//! Error types for step execution

use thiserror::Error;

/// Failures reported by the browser automation engine
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Timed out after {timeout_ms} ms: {operation}")]
    Timeout { operation: String, timeout_ms: u64 },

    #[error("Browser launch failed: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Browser driver is not running")]
    Disconnected,

    #[error("Node.js or the playwright package was not found: {0}")]
    DriverNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EngineError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, EngineError::Timeout { .. })
    }

    /// The driver process is gone; no further call can succeed
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Disconnected | EngineError::DriverNotFound(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

/// Why a single step failed
#[derive(Error, Debug)]
pub enum StepError {
    /// No candidate locator matched; carries the hint as the author wrote it
    #[error("Could not find element to {action}: {hint}")]
    ResolutionFailure { action: &'static str, hint: String },

    #[error("Timed out after {timeout_ms} ms {operation}")]
    ActionTimeout { operation: String, timeout_ms: u64 },

    #[error("Case exceeded its {timeout_secs}s deadline")]
    CaseTimeout { timeout_secs: u64 },

    #[error("Browser error: {0}")]
    EngineFailure(String),

    /// Never fails a step; logged and suppressed
    #[error("Evidence capture failed: {0}")]
    EvidenceCaptureFailure(String),
}

impl From<EngineError> for StepError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::Timeout { operation, timeout_ms } => {
                StepError::ActionTimeout { operation, timeout_ms }
            }
            other => StepError::EngineFailure(other.to_string()),
        }
    }
}

/// Failures that prevent a run from executing any case
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Failed to start browser session: {0}")]
    Launch(#[source] EngineError),

    #[error("Failed to open page: {0}")]
    Page(#[source] EngineError),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to open target {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: EngineError,
    },

    #[error("Run aborted unexpectedly: {0}")]
    Panicked(String),
}

pub type RunResult<T> = Result<T, RunError>;
