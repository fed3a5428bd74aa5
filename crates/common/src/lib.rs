//! Stepwise Common Library
//!
//! Shared data model, configuration, and test-case loading for the Stepwise
//! step engine and its command-line front end.

pub mod cases;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{
    AuthenticationConfig, BrowserConfig, BrowserKind, EngineConfig, EvidenceConfig,
    ExecutionConfig, ResolverConfig, Viewport,
};
pub use error::{Error, Result};
pub use types::*;

/// Stepwise version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Write a serializable report as pretty JSON, creating parent directories
pub fn write_json<T: serde::Serialize>(path: &std::path::Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}
