//! Scripted in-memory browser engine for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use stepwise_common::{EngineConfig, NetworkLogEntry};
use stepwise_engine::{
    ActionKind, BrowserEngine, BrowserSession, CandidateResolver, EngineError, EngineResult,
    LaunchOptions, LoadState, NetworkLog, Page, SelectorResolver, WaitState,
};

/// What a scripted operation does instead of succeeding
#[derive(Debug, Clone)]
pub enum Behavior {
    Fail,
    Disconnect,
    Delay(Duration),
    Panic,
}

/// A page whose operations succeed unless a rule says otherwise.
///
/// Rules are keyed by `(operation, locator)`; a locator of `*` matches any.
#[derive(Default)]
pub struct FakePage {
    calls: Mutex<Vec<String>>,
    rules: Mutex<HashMap<(String, String), Behavior>>,
    texts: Mutex<HashMap<String, String>>,
    responses: Mutex<HashMap<String, Vec<String>>>,
    sink: Mutex<Option<Arc<NetworkLog>>>,
}

impl FakePage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn rule(&self, op: &str, locator: &str, behavior: Behavior) -> &Self {
        self.rules
            .lock()
            .insert((op.to_string(), locator.to_string()), behavior);
        self
    }

    pub fn fail(&self, op: &str, locator: &str) -> &Self {
        self.rule(op, locator, Behavior::Fail)
    }

    pub fn text(&self, locator: &str, value: &str) -> &Self {
        self.texts.lock().insert(locator.to_string(), value.to_string());
        self
    }

    /// Emit a response event for `url` whenever `locator` is clicked
    pub fn respond_on_click(&self, locator: &str, url: &str) -> &Self {
        self.responses
            .lock()
            .entry(locator.to_string())
            .or_default()
            .push(url.to_string());
        self
    }

    /// Every call as `op:locator`, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, op: &str) -> Vec<String> {
        let prefix = format!("{}:", op);
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(&prefix))
            .collect()
    }

    pub fn is_capturing(&self) -> bool {
        self.sink.lock().is_some()
    }

    async fn perform(&self, op: &str, locator: &str) -> EngineResult<()> {
        self.calls.lock().push(format!("{}:{}", op, locator));

        let behavior = {
            let rules = self.rules.lock();
            rules
                .get(&(op.to_string(), locator.to_string()))
                .or_else(|| rules.get(&(op.to_string(), "*".to_string())))
                .cloned()
        };

        match behavior {
            None => Ok(()),
            Some(Behavior::Fail) => Err(EngineError::Timeout {
                operation: format!("{} {}", op, locator),
                timeout_ms: 10,
            }),
            Some(Behavior::Disconnect) => Err(EngineError::Disconnected),
            Some(Behavior::Delay(d)) => {
                tokio::time::sleep(d).await;
                Ok(())
            }
            Some(Behavior::Panic) => panic!("scripted panic in {}", op),
        }
    }
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&self, url: &str, _until: LoadState, _timeout: Duration) -> EngineResult<()> {
        self.perform("goto", url).await.map_err(|e| match e {
            EngineError::Timeout { .. } => EngineError::Navigation {
                url: url.to_string(),
                reason: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            },
            other => other,
        })
    }

    async fn wait_for_load(&self, until: LoadState, _timeout: Duration) -> EngineResult<()> {
        self.perform("wait_for_load", until.as_str()).await
    }

    async fn click(&self, locator: &str, _timeout: Duration) -> EngineResult<()> {
        self.perform("click", locator).await?;
        let urls = self.responses.lock().get(locator).cloned().unwrap_or_default();
        if let Some(log) = self.sink.lock().as_ref() {
            for url in urls {
                log.record(NetworkLogEntry {
                    url,
                    method: "POST".to_string(),
                    status: 200,
                    timestamp: Utc::now(),
                    elapsed_ms: 5,
                });
            }
        }
        Ok(())
    }

    async fn fill(&self, locator: &str, _value: &str, _timeout: Duration) -> EngineResult<()> {
        self.perform("fill", locator).await
    }

    async fn read_text(&self, locator: &str, _timeout: Duration) -> EngineResult<String> {
        self.perform("read_text", locator).await?;
        Ok(self.texts.lock().get(locator).cloned().unwrap_or_default())
    }

    async fn wait_for(&self, locator: &str, _state: WaitState, _timeout: Duration) -> EngineResult<()> {
        self.perform("wait_for", locator).await
    }

    async fn screenshot(&self, _full_page: bool) -> EngineResult<Vec<u8>> {
        self.perform("screenshot", "page").await?;
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    fn capture_responses(&self, sink: Option<Arc<NetworkLog>>) {
        *self.sink.lock() = sink;
    }
}

/// Engine handing out one shared [`FakePage`]
pub struct FakeEngine {
    pub page: Arc<FakePage>,
    pub launches: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
    launch_error: Option<String>,
}

impl FakeEngine {
    pub fn new(page: Arc<FakePage>) -> Self {
        Self {
            page,
            launches: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            launch_error: None,
        }
    }

    pub fn failing_launch(page: Arc<FakePage>, reason: &str) -> Self {
        Self {
            launch_error: Some(reason.to_string()),
            ..Self::new(page)
        }
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn launch(&self, _options: &LaunchOptions) -> EngineResult<Box<dyn BrowserSession>> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = &self.launch_error {
            return Err(EngineError::Launch(reason.clone()));
        }
        Ok(Box::new(FakeSession {
            page: self.page.clone(),
            closes: self.closes.clone(),
        }))
    }
}

struct FakeSession {
    page: Arc<FakePage>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn open_page(&mut self) -> EngineResult<Arc<dyn Page>> {
        let page: Arc<dyn Page> = self.page.clone();
        Ok(page)
    }

    async fn close(&mut self) -> EngineResult<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// The production resolver, counting how often it is consulted
#[derive(Default)]
pub struct CountingResolver {
    inner: CandidateResolver,
    calls: AtomicUsize,
}

impl CountingResolver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SelectorResolver for CountingResolver {
    fn resolve(&self, hint: &str, kind: ActionKind) -> Vec<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.resolve(hint, kind)
    }
}

/// Configuration with no delays and no evidence on disk
pub fn quiet_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.execution.settle_delay_ms = 0;
    config.evidence.capture_screenshots = false;
    config.evidence.capture_network = false;
    config
}
