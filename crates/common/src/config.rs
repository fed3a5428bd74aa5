//! Engine configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Top-level configuration recognized by the step engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub browser: BrowserConfig,
    pub authentication: AuthenticationConfig,
    pub evidence: EvidenceConfig,
    pub execution: ExecutionConfig,
    pub resolver: ResolverConfig,
}

/// Browser backend kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Chromium,
    Firefox,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Chromium => "chromium",
            BrowserKind::Firefox => "firefox",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(BrowserKind::Chromium),
            "firefox" => Ok(BrowserKind::Firefox),
            other => Err(Error::InvalidConfig(format!("unsupported browser type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self { width: 1280, height: 720 }
    }
}

/// Browser session configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    #[serde(rename = "type")]
    pub kind: BrowserKind,

    /// Requested mode; see [`BrowserConfig::effective_headless`]
    pub headless: bool,

    pub viewport: Viewport,

    /// Node.js executable used to host the Playwright driver
    pub node_binary: PathBuf,

    /// Directory from which `require('playwright')` resolves
    pub driver_dir: PathBuf,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Chromium,
            headless: true,
            viewport: Viewport::default(),
            node_binary: PathBuf::from("node"),
            driver_dir: PathBuf::from("."),
        }
    }
}

impl BrowserConfig {
    /// Headless mode after accounting for environments without a display
    pub fn effective_headless(&self) -> bool {
        self.headless || constrained_environment()
    }
}

/// True when a headed browser cannot be shown (CI, no display server, or forced)
fn constrained_environment() -> bool {
    let flag = |name: &str| {
        std::env::var(name)
            .map(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"))
            .unwrap_or(false)
    };
    if flag("STEPWISE_FORCE_HEADLESS") || flag("CI") {
        return true;
    }
    cfg!(target_os = "linux")
        && std::env::var_os("DISPLAY").is_none()
        && std::env::var_os("WAYLAND_DISPLAY").is_none()
}

/// Pre-navigation login sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthenticationConfig {
    pub enabled: bool,

    /// Login page; the target URL is used when unset
    #[serde(alias = "loginUrl")]
    pub login_url: Option<String>,

    pub username: String,
    pub password: String,

    /// Tried in order until one is found
    pub username_locators: Vec<String>,
    pub password_locators: Vec<String>,
    pub submit_locators: Vec<String>,

    /// Per-locator probe timeout and post-submit settle timeout
    pub timeout_ms: u64,
}

impl Default for AuthenticationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            login_url: None,
            username: String::new(),
            password: String::new(),
            username_locators: vec![
                "input[name=\"username\"]".to_string(),
                "input[name=\"email\"]".to_string(),
                "input[type=\"email\"]".to_string(),
                "#username".to_string(),
                "#email".to_string(),
                "input[autocomplete=\"username\"]".to_string(),
            ],
            password_locators: vec![
                "input[name=\"password\"]".to_string(),
                "input[type=\"password\"]".to_string(),
                "#password".to_string(),
            ],
            submit_locators: vec![
                "button[type=\"submit\"]".to_string(),
                "input[type=\"submit\"]".to_string(),
                "role=button[name=/log ?in|sign ?in/i]".to_string(),
            ],
            timeout_ms: 5_000,
        }
    }
}

impl AuthenticationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Step evidence capture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    pub capture_screenshots: bool,
    pub capture_network: bool,
    pub output_dir: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            capture_screenshots: true,
            capture_network: false,
            output_dir: PathBuf::from("test-results/screenshots"),
        }
    }
}

/// Timeouts and pacing for step execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Wall-clock ceiling for a whole case
    pub case_timeout_secs: u64,

    /// Per-candidate timeout while cascading click/fill/store locators
    pub candidate_timeout_ms: u64,

    /// Single timeout for verify and wait-for
    pub wait_timeout_ms: u64,

    pub navigation_timeout_ms: u64,

    /// Pause after every step
    pub settle_delay_ms: u64,

    /// Maximum nesting of conditional steps
    pub max_conditional_depth: usize,

    /// Duration of a bare "wait" step
    pub default_wait_secs: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            case_timeout_secs: 300,
            candidate_timeout_ms: 2_000,
            wait_timeout_ms: 10_000,
            navigation_timeout_ms: 30_000,
            settle_delay_ms: 500,
            max_conditional_depth: 3,
            default_wait_secs: 1.0,
        }
    }
}

impl ExecutionConfig {
    pub fn case_timeout(&self) -> Duration {
        Duration::from_secs(self.case_timeout_secs)
    }

    pub fn candidate_timeout(&self) -> Duration {
        Duration::from_millis(self.candidate_timeout_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Stop words stripped from hints before candidate generation, per action kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    pub click: Vec<String>,
    pub fill: Vec<String>,
    pub verify: Vec<String>,
    pub store: Vec<String>,
    pub wait: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            click: words(&["click", "press", "tap", "on", "the", "button", "link", "icon"]),
            fill: words(&[
                "type", "enter", "fill", "into", "in", "the", "field", "input", "box", "textbox",
            ]),
            verify: words(&[
                "verify", "check", "assert", "expect", "ensure", "confirm", "should", "see",
                "that", "the", "text", "is", "visible", "displayed", "present",
            ]),
            store: words(&["store", "the", "text", "value", "of", "from"]),
            wait: words(&["wait", "for", "until", "the", "to", "be", "is"]),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file; a missing file yields defaults
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `STEPWISE_BROWSER` and `STEPWISE_HEADLESS` overrides
    pub fn apply_env(mut self) -> Result<Self> {
        if let Ok(kind) = std::env::var("STEPWISE_BROWSER") {
            self.browser.kind = kind.parse()?;
        }
        if let Ok(headless) = std::env::var("STEPWISE_HEADLESS") {
            self.browser.headless = matches!(headless.as_str(), "1" | "true" | "yes");
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.authentication.enabled && self.authentication.username.is_empty() {
            return Err(Error::InvalidConfig(
                "authentication.enabled requires a username".to_string(),
            ));
        }
        if self.execution.case_timeout_secs == 0 {
            return Err(Error::InvalidConfig(
                "execution.case_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
