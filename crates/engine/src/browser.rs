//! Browser automation engine seam
//!
//! The step engine never talks to a browser directly. It drives these traits,
//! implemented by [`crate::playwright::PlaywrightEngine`] in production and by
//! scripted fakes in tests.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepwise_common::{BrowserConfig, BrowserKind, NetworkLogEntry, Viewport};

use crate::action::WaitState;
use crate::error::EngineResult;

/// Options for launching one browser session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchOptions {
    pub kind: BrowserKind,
    pub headless: bool,
    pub viewport: Viewport,
}

impl From<&BrowserConfig> for LaunchOptions {
    fn from(config: &BrowserConfig) -> Self {
        Self {
            kind: config.kind,
            headless: config.effective_headless(),
            viewport: config.viewport,
        }
    }
}

/// Condition a navigation waits for before returning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadState {
    Load,
    #[default]
    DomContentLoaded,
    NetworkIdle,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::Load => "load",
            LoadState::DomContentLoaded => "domcontentloaded",
            LoadState::NetworkIdle => "networkidle",
        }
    }
}

/// Response events recorded while capture is attached.
///
/// Written by the engine's event delivery, drained by the case runner between
/// steps; the two never run at the same time.
#[derive(Debug, Default)]
pub struct NetworkLog {
    entries: Mutex<Vec<NetworkLogEntry>>,
}

impl NetworkLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, entry: NetworkLogEntry) {
        self.entries.lock().push(entry);
    }

    /// Take everything recorded so far, leaving the log empty
    pub fn drain(&self) -> Vec<NetworkLogEntry> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Launches browser sessions
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn BrowserSession>>;
}

/// One running browser
#[async_trait]
pub trait BrowserSession: Send {
    /// Open a browsing context with a single page
    async fn open_page(&mut self) -> EngineResult<Arc<dyn Page>>;

    /// Close the context and the browser
    async fn close(&mut self) -> EngineResult<()>;
}

/// A page handle; every element operation takes a locator and a timeout
#[async_trait]
pub trait Page: Send + Sync {
    async fn goto(&self, url: &str, until: LoadState, timeout: Duration) -> EngineResult<()>;

    async fn wait_for_load(&self, until: LoadState, timeout: Duration) -> EngineResult<()>;

    async fn click(&self, locator: &str, timeout: Duration) -> EngineResult<()>;

    async fn fill(&self, locator: &str, value: &str, timeout: Duration) -> EngineResult<()>;

    /// Visible text of the element, or its value for form controls
    async fn read_text(&self, locator: &str, timeout: Duration) -> EngineResult<String>;

    async fn wait_for(&self, locator: &str, state: WaitState, timeout: Duration)
        -> EngineResult<()>;

    /// PNG bytes
    async fn screenshot(&self, full_page: bool) -> EngineResult<Vec<u8>>;

    /// Route response events into `sink`; `None` detaches
    fn capture_responses(&self, sink: Option<Arc<NetworkLog>>);
}
