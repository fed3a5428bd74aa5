//! Playwright browser automation
//!
//! A long-lived `node` process runs the bundled driver script and speaks one
//! JSON object per line over stdio. Requests carry an id; replies are routed
//! back to the waiting call, and `response` events feed the attached
//! [`NetworkLog`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use chrono::Utc;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use stepwise_common::{BrowserConfig, NetworkLogEntry};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::action::WaitState;
use crate::browser::{BrowserEngine, BrowserSession, LaunchOptions, LoadState, NetworkLog, Page};
use crate::error::{EngineError, EngineResult};

/// Driver script passed to `node --eval`
const DRIVER_SCRIPT: &str = include_str!("playwright_driver.js");

/// Extra time allowed for a reply beyond the operation's own timeout
const REPLY_GRACE: Duration = Duration::from_secs(5);

/// Timeout for commands that carry none of their own
const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);

/// Launches Chromium or Firefox through the Node.js playwright package
#[derive(Debug, Clone)]
pub struct PlaywrightEngine {
    node_binary: PathBuf,
    driver_dir: PathBuf,
}

impl PlaywrightEngine {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            node_binary: config.node_binary.clone(),
            driver_dir: config.driver_dir.clone(),
        }
    }

    /// Check that node runs and can resolve the playwright package
    pub async fn check_installed(&self) -> EngineResult<()> {
        let status = Command::new(&self.node_binary)
            .args(["--eval", "require.resolve('playwright')"])
            .current_dir(&self.driver_dir)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            Ok(_) => Err(EngineError::DriverNotFound(format!(
                "playwright is not installed under {}",
                self.driver_dir.display()
            ))),
            Err(e) => Err(EngineError::DriverNotFound(format!(
                "{}: {}",
                self.node_binary.display(),
                e
            ))),
        }
    }
}

#[async_trait]
impl BrowserEngine for PlaywrightEngine {
    async fn launch(&self, options: &LaunchOptions) -> EngineResult<Box<dyn BrowserSession>> {
        self.check_installed().await?;

        info!(
            "Launching {} (headless: {})",
            options.kind.as_str(),
            options.headless
        );

        let mut child = Command::new(&self.node_binary)
            .arg("--eval")
            .arg(DRIVER_SCRIPT)
            .current_dir(&self.driver_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EngineError::Launch(format!("failed to spawn node: {}", e)))?;

        let stdin = child.stdin.take().ok_or(EngineError::Disconnected)?;
        let stdout = child.stdout.take().ok_or(EngineError::Disconnected)?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!(target: "playwright", "{}", line);
                }
            });
        }

        let conn = Arc::new(Connection::new(stdin));
        let reader = tokio::spawn(read_loop(stdout, conn.clone()));
        let mut session = PlaywrightSession {
            child,
            conn,
            reader,
        };

        let args = json!({
            "browser": options.kind.as_str(),
            "headless": options.headless,
            "viewport": { "width": options.viewport.width, "height": options.viewport.height },
        });
        if let Err(e) = session.conn.call("launch", args, CONTROL_TIMEOUT).await {
            session.shutdown().await;
            return Err(EngineError::Launch(e.to_string()));
        }

        Ok(Box::new(session))
    }
}

/// A line read from the driver
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Incoming {
    Reply(Reply),
    Event(ResponseEvent),
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    timeout: bool,
}

#[derive(Debug, Deserialize)]
struct ResponseEvent {
    #[allow(dead_code)]
    event: String,
    url: String,
    method: String,
    status: u16,
    #[serde(default)]
    elapsed_ms: u64,
}

/// Request/reply plumbing shared by the session, its page, and the reader task
struct Connection {
    stdin: tokio::sync::Mutex<ChildStdin>,
    pending: Mutex<HashMap<u64, oneshot::Sender<Reply>>>,
    next_id: AtomicU64,
    sink: Mutex<Option<Arc<NetworkLog>>>,
}

impl Connection {
    fn new(stdin: ChildStdin) -> Self {
        Self {
            stdin: tokio::sync::Mutex::new(stdin),
            pending: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sink: Mutex::new(None),
        }
    }

    /// Send `cmd` and wait for its reply.
    ///
    /// A reply that arrives after `wait` has elapsed finds no waiter and is dropped.
    async fn call(&self, cmd: &str, args: Value, wait: Duration) -> EngineResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(id, tx);

        let mut line = serde_json::to_string(&json!({ "id": id, "cmd": cmd, "args": args }))?;
        line.push('\n');

        let written = {
            let mut stdin = self.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            self.pending.lock().remove(&id);
            debug!("Driver write failed: {}", e);
            return Err(EngineError::Disconnected);
        }

        match tokio::time::timeout(wait, rx).await {
            Ok(Ok(reply)) => reply_result(cmd, reply, wait),
            Ok(Err(_)) => Err(EngineError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&id);
                Err(EngineError::Timeout {
                    operation: cmd.to_string(),
                    timeout_ms: wait.as_millis() as u64,
                })
            }
        }
    }

    fn route(&self, incoming: Incoming) {
        match incoming {
            Incoming::Reply(reply) => match self.pending.lock().remove(&reply.id) {
                Some(tx) => {
                    let _ = tx.send(reply);
                }
                None => debug!("Discarding late reply {}", reply.id),
            },
            Incoming::Event(event) => {
                if let Some(log) = self.sink.lock().as_ref() {
                    log.record(NetworkLogEntry {
                        url: event.url,
                        method: event.method,
                        status: event.status,
                        timestamp: Utc::now(),
                        elapsed_ms: event.elapsed_ms,
                    });
                }
            }
        }
    }
}

fn reply_result(cmd: &str, reply: Reply, wait: Duration) -> EngineResult<Value> {
    if reply.ok {
        return Ok(reply.value);
    }
    let message = reply.error.unwrap_or_else(|| "unknown driver error".to_string());
    if reply.timeout {
        Err(EngineError::Timeout {
            operation: format!("{}: {}", cmd, message),
            timeout_ms: wait.saturating_sub(REPLY_GRACE).as_millis() as u64,
        })
    } else {
        Err(EngineError::Driver(message))
    }
}

async fn read_loop(stdout: ChildStdout, conn: Arc<Connection>) {
    let mut lines = BufReader::new(stdout).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match serde_json::from_str::<Incoming>(&line) {
                Ok(incoming) => conn.route(incoming),
                Err(e) => debug!("Ignoring driver output {:?}: {}", line, e),
            },
            Ok(None) => break,
            Err(e) => {
                warn!("Driver stdout failed: {}", e);
                break;
            }
        }
    }
    // Wake every waiter with a closed channel
    conn.pending.lock().clear();
}

/// A running driver process with one browser
pub struct PlaywrightSession {
    child: Child,
    conn: Arc<Connection>,
    reader: JoinHandle<()>,
}

impl PlaywrightSession {
    /// Stop the driver: ask politely, then SIGTERM, then kill
    async fn shutdown(&mut self) {
        let exited = tokio::time::timeout(Duration::from_secs(2), self.child.wait()).await;
        if exited.is_err() {
            #[cfg(unix)]
            {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                if let Some(pid) = self.child.id() {
                    if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                        tokio::time::sleep(Duration::from_millis(500)).await;
                    }
                }
            }
            let _ = self.child.kill().await;
        }
        self.reader.abort();
    }
}

#[async_trait]
impl BrowserSession for PlaywrightSession {
    async fn open_page(&mut self) -> EngineResult<Arc<dyn Page>> {
        self.conn.call("open_page", json!({}), CONTROL_TIMEOUT).await?;
        Ok(Arc::new(PlaywrightPage {
            conn: self.conn.clone(),
        }))
    }

    async fn close(&mut self) -> EngineResult<()> {
        info!("Closing browser (pid: {:?})", self.child.id());
        let result = self.conn.call("close", json!({}), CONTROL_TIMEOUT).await;
        self.shutdown().await;
        match result {
            Ok(_) | Err(EngineError::Disconnected) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// The session's single page
pub struct PlaywrightPage {
    conn: Arc<Connection>,
}

impl PlaywrightPage {
    async fn call(&self, cmd: &str, args: Value, timeout: Duration) -> EngineResult<Value> {
        self.conn.call(cmd, args, timeout + REPLY_GRACE).await
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[async_trait]
impl Page for PlaywrightPage {
    async fn goto(&self, url: &str, until: LoadState, timeout: Duration) -> EngineResult<()> {
        let args = json!({ "url": url, "wait_until": until.as_str(), "timeout": millis(timeout) });
        match self.call("goto", args, timeout).await {
            Ok(_) => Ok(()),
            Err(EngineError::Driver(reason)) => Err(EngineError::Navigation {
                url: url.to_string(),
                reason,
            }),
            Err(e) => Err(e),
        }
    }

    async fn wait_for_load(&self, until: LoadState, timeout: Duration) -> EngineResult<()> {
        let args = json!({ "state": until.as_str(), "timeout": millis(timeout) });
        self.call("wait_for_load", args, timeout).await.map(|_| ())
    }

    async fn click(&self, locator: &str, timeout: Duration) -> EngineResult<()> {
        let args = json!({ "locator": locator, "timeout": millis(timeout) });
        self.call("click", args, timeout).await.map(|_| ())
    }

    async fn fill(&self, locator: &str, value: &str, timeout: Duration) -> EngineResult<()> {
        let args = json!({ "locator": locator, "value": value, "timeout": millis(timeout) });
        self.call("fill", args, timeout).await.map(|_| ())
    }

    async fn read_text(&self, locator: &str, timeout: Duration) -> EngineResult<String> {
        let args = json!({ "locator": locator, "timeout": millis(timeout) });
        match self.call("read_text", args, timeout).await? {
            Value::String(text) => Ok(text),
            Value::Null => Ok(String::new()),
            other => Ok(other.to_string()),
        }
    }

    async fn wait_for(&self, locator: &str, state: WaitState, timeout: Duration) -> EngineResult<()> {
        let args = json!({ "locator": locator, "state": state.as_str(), "timeout": millis(timeout) });
        self.call("wait_for", args, timeout).await.map(|_| ())
    }

    async fn screenshot(&self, full_page: bool) -> EngineResult<Vec<u8>> {
        let value = self
            .call("screenshot", json!({ "full_page": full_page }), CONTROL_TIMEOUT)
            .await?;
        let encoded = value
            .as_str()
            .ok_or_else(|| EngineError::Driver("screenshot reply was not a string".to_string()))?;
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| EngineError::Driver(format!("invalid screenshot data: {}", e)))
    }

    fn capture_responses(&self, sink: Option<Arc<NetworkLog>>) {
        *self.conn.sink.lock() = sink;
    }
}
