//! Error types for Stepwise

use thiserror::Error;

/// Result type alias using the Stepwise common Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading configuration, test cases, or writing reports
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Test case parse error in {path}: {reason}")]
    CaseParse { path: String, reason: String },

    #[error("Test case not found: {0}")]
    CaseNotFound(String),
}
