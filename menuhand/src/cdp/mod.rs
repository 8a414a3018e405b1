//! Chrome DevTools Protocol backend for [`Page`].
//!
//! Targets are discovered over the DevTools HTTP endpoint, commands go over
//! the page's websocket and responses are matched to requests by id through
//! a map of pending oneshot senders.

pub mod script;

use async_trait::async_trait;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace, warn};

use crate::config::{PortalConfig, Viewport};
use crate::errors::AutomationError;
use crate::page::{BoundingBox, ElementHandle, Page};
use crate::selector::Selector;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(15);
const READY_POLL: Duration = Duration::from_millis(100);

type CdpResult = Result<Value, String>;
type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<CdpResult>>>>;

/// One entry of the DevTools `/json/list` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub url: String,
    pub web_socket_debugger_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CdpIncoming {
    id: Option<u64>,
    method: Option<String>,
    result: Option<Value>,
    error: Option<Value>,
}

fn platform(context: &str, e: impl std::fmt::Display) -> AutomationError {
    AutomationError::Platform(format!("{context}: {e}"))
}

/// DevTools HTTP endpoint of a browser started with a debugging port.
#[derive(Debug, Clone)]
pub struct DevToolsEndpoint {
    base_url: String,
    client: reqwest::Client,
}

impl DevToolsEndpoint {
    pub fn new(debug_port: u16) -> Self {
        Self {
            base_url: format!("http://127.0.0.1:{debug_port}"),
            client: reqwest::Client::new(),
        }
    }

    pub async fn is_available(&self) -> bool {
        match self
            .client
            .get(format!("{}/json/version", self.base_url))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn targets(&self) -> Result<Vec<TargetInfo>, AutomationError> {
        self.client
            .get(format!("{}/json/list", self.base_url))
            .send()
            .await
            .map_err(|e| platform("Failed to list targets", e))?
            .json()
            .await
            .map_err(|e| platform("Failed to parse targets", e))
    }

    pub async fn new_tab(&self) -> Result<TargetInfo, AutomationError> {
        self.client
            .put(format!("{}/json/new?about:blank", self.base_url))
            .send()
            .await
            .map_err(|e| platform("Failed to open tab", e))?
            .json()
            .await
            .map_err(|e| platform("Failed to parse new tab", e))
    }

    /// Websocket URL of the first page target, opening one if needed.
    pub async fn page_socket_url(&self) -> Result<String, AutomationError> {
        let existing = self
            .targets()
            .await?
            .into_iter()
            .find(|t| t.target_type == "page" && t.web_socket_debugger_url.is_some());
        let target = match existing {
            Some(t) => t,
            None => self.new_tab().await?,
        };
        debug!("Attaching to target {} ({})", target.id, target.url);
        target
            .web_socket_debugger_url
            .ok_or_else(|| AutomationError::Platform("Target has no websocket URL".into()))
    }
}

/// A [`Page`] driving one Chrome tab over DevTools.
pub struct CdpPage {
    writer: mpsc::UnboundedSender<Message>,
    pending: Pending,
    next_id: AtomicU64,
    reader_task: JoinHandle<()>,
    writer_task: JoinHandle<()>,
}

impl Drop for CdpPage {
    fn drop(&mut self) {
        self.reader_task.abort();
        self.writer_task.abort();
    }
}

impl CdpPage {
    /// Attach to the browser listening on `config.debug_port` and apply the
    /// configured viewport.
    pub async fn connect(config: &PortalConfig) -> Result<Self, AutomationError> {
        let url = DevToolsEndpoint::new(config.debug_port)
            .page_socket_url()
            .await?;
        let page = Self::connect_socket(&url).await?;
        page.send("Page.enable", json!({})).await?;
        page.send("Runtime.enable", json!({})).await?;
        page.set_viewport(config.viewport).await?;
        info!("Connected to browser page on port {}", config.debug_port);
        Ok(page)
    }

    pub async fn connect_socket(url: &str) -> Result<Self, AutomationError> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| platform("DevTools websocket connect failed", e))?;
        let (mut sink, mut source) = stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));

        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = sink.send(msg).await {
                    warn!("DevTools send error: {}", e);
                    break;
                }
            }
        });

        let reader_pending = pending.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = source.next().await {
                if !msg.is_text() {
                    continue;
                }
                let text = msg.into_text().unwrap_or_default();
                match serde_json::from_str::<CdpIncoming>(&text) {
                    Ok(CdpIncoming {
                        id: Some(id),
                        result,
                        error,
                        ..
                    }) => {
                        if let Some(tx) = reader_pending.lock().await.remove(&id) {
                            let _ = tx.send(match error {
                                Some(err) => Err(err
                                    .get("message")
                                    .and_then(Value::as_str)
                                    .map(str::to_string)
                                    .unwrap_or_else(|| err.to_string())),
                                None => Ok(result.unwrap_or(Value::Null)),
                            });
                        }
                    }
                    Ok(CdpIncoming {
                        method: Some(method),
                        ..
                    }) => trace!("DevTools event {}", method),
                    Ok(_) => {}
                    Err(e) => warn!("Invalid DevTools message: {}", e),
                }
            }
            debug!("DevTools connection closed");
            // Dropping the senders fails every request still in flight.
            reader_pending.lock().await.clear();
        });

        Ok(Self {
            writer: tx,
            pending,
            next_id: AtomicU64::new(1),
            reader_task: reader,
            writer_task: writer,
        })
    }

    /// Send one DevTools command and wait for its response.
    pub async fn send(&self, method: &str, params: Value) -> Result<Value, AutomationError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let payload = json!({ "id": id, "method": method, "params": params }).to_string();
        if self.writer.send(Message::Text(payload)).is_err() {
            self.pending.lock().await.remove(&id);
            return Err(AutomationError::Platform(
                "DevTools connection is closed".into(),
            ));
        }

        match tokio::time::timeout(COMMAND_TIMEOUT, rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(AutomationError::Platform(format!(
                "{method} failed: {message}"
            ))),
            Ok(Err(_closed)) => Err(AutomationError::Platform(format!(
                "Connection closed while waiting for {method}"
            ))),
            Err(_elapsed) => {
                self.pending.lock().await.remove(&id);
                Err(AutomationError::Timeout(format!(
                    "No response to {method} within {COMMAND_TIMEOUT:?}"
                )))
            }
        }
    }

    /// Evaluate an expression and return its JSON value.
    pub async fn evaluate(&self, expression: &str) -> Result<Value, AutomationError> {
        let response = self
            .send(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true,
                }),
            )
            .await?;
        if let Some(details) = response.get("exceptionDetails") {
            let text = details
                .pointer("/exception/description")
                .or_else(|| details.get("text"))
                .and_then(Value::as_str)
                .unwrap_or("script exception");
            return Err(AutomationError::Platform(format!("Script failed: {text}")));
        }
        Ok(response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// Evaluate an element snippet, mapping a detached element to
    /// `TransientUi` so the resolver re-resolves it.
    async fn evaluate_on(
        &self,
        element: &ElementHandle,
        expression: String,
    ) -> Result<Value, AutomationError> {
        let value = self.evaluate(&expression).await?;
        if value.as_str() == Some(script::STALE_MARKER) {
            return Err(AutomationError::TransientUi(format!(
                "Element {} is no longer attached",
                element.id
            )));
        }
        Ok(value)
    }

    async fn box_of(
        &self,
        element: &ElementHandle,
        expression: String,
    ) -> Result<Option<BoundingBox>, AutomationError> {
        let value = self.evaluate_on(element, expression).await?;
        let field = |k: &str| value.get(k).and_then(Value::as_f64);
        Ok(match (field("x"), field("y"), field("width"), field("height")) {
            (Some(x), Some(y), Some(width), Some(height)) => {
                Some(BoundingBox::new(x, y, width, height))
            }
            _ => None,
        })
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<(), AutomationError> {
        self.send(
            "Emulation.setDeviceMetricsOverride",
            json!({
                "width": viewport.width,
                "height": viewport.height,
                "deviceScaleFactor": 1,
                "mobile": false,
            }),
        )
        .await
        .map(|_| ())
    }

    async fn mouse(&self, kind: &str, x: f64, y: f64) -> Result<(), AutomationError> {
        let mut params = json!({ "type": kind, "x": x, "y": y });
        if kind != "mouseMoved" {
            params["button"] = json!("left");
            params["clickCount"] = json!(1);
        }
        self.send("Input.dispatchMouseEvent", params)
            .await
            .map(|_| ())
    }
}

/// Key code and DOM `code` for the named keys the engine presses.
fn key_definition(key: &str) -> (i64, &str) {
    match key {
        "Enter" => (13, "Enter"),
        "Escape" => (27, "Escape"),
        "Tab" => (9, "Tab"),
        "Backspace" => (8, "Backspace"),
        "ArrowDown" => (40, "ArrowDown"),
        "ArrowUp" => (38, "ArrowUp"),
        _ => (0, key),
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), AutomationError> {
        let response = self
            .send("Page.navigate", json!({ "url": url }))
            .await
            .map_err(|e| AutomationError::Navigation(format!("Navigation to {url} failed: {e}")))?;
        if let Some(reason) = response.get("errorText").and_then(Value::as_str) {
            return Err(AutomationError::Navigation(format!(
                "Navigation to {url} failed: {reason}"
            )));
        }

        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(state) = self.evaluate(script::READY_STATE).await {
                if state.as_str() == Some("complete") {
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "{url} did not finish loading within {timeout:?}"
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
    }

    async fn current_url(&self) -> Result<String, AutomationError> {
        Ok(self
            .evaluate(script::CURRENT_URL)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn page_text(&self) -> Result<String, AutomationError> {
        Ok(self
            .evaluate(script::PAGE_TEXT)
            .await?
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    async fn query(
        &self,
        selector: &Selector,
        visible_only: bool,
    ) -> Result<Vec<ElementHandle>, AutomationError> {
        if let Selector::Invalid(reason) = selector {
            return Err(AutomationError::InvalidSelector(reason.clone()));
        }
        let value = self
            .evaluate(&script::query(selector, visible_only))
            .await
            .map_err(|e| match e {
                // A malformed CSS or XPath expression throws in the page.
                AutomationError::Platform(msg) if msg.starts_with("Script failed") => {
                    AutomationError::InvalidSelector(format!("{selector}: {msg}"))
                }
                other => other,
            })?;
        Ok(value
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(ElementHandle::new)
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        let bounds = self
            .box_of(element, script::scroll_and_measure(&element.id))
            .await?;
        match bounds {
            Some(b) if !b.is_empty() => {
                let (x, y) = b.center();
                self.mouse("mouseMoved", x, y).await?;
                self.mouse("mousePressed", x, y).await?;
                self.mouse("mouseReleased", x, y).await
            }
            _ => self
                .evaluate_on(element, script::click(&element.id))
                .await
                .map(|_| ()),
        }
    }

    async fn fill(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        self.evaluate_on(element, script::fill(&element.id, text))
            .await
            .map(|_| ())
    }

    async fn press(&self, key: &str) -> Result<(), AutomationError> {
        let (code, dom_code) = key_definition(key);
        for kind in ["keyDown", "keyUp"] {
            self.send(
                "Input.dispatchKeyEvent",
                json!({
                    "type": kind,
                    "key": key,
                    "code": dom_code,
                    "windowsVirtualKeyCode": code,
                    "nativeVirtualKeyCode": code,
                }),
            )
            .await?;
        }
        Ok(())
    }

    async fn text_of(&self, element: &ElementHandle) -> Result<String, AutomationError> {
        let value = self
            .evaluate_on(element, script::text_of(&element.id))
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn is_checked(&self, element: &ElementHandle) -> Result<bool, AutomationError> {
        let value = self
            .evaluate_on(element, script::is_checked(&element.id))
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn bounding_box(
        &self,
        element: &ElementHandle,
    ) -> Result<Option<BoundingBox>, AutomationError> {
        self.box_of(element, script::measure(&element.id)).await
    }

    async fn mouse_move(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.mouse("mouseMoved", x, y).await
    }

    async fn mouse_down(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.mouse("mousePressed", x, y).await
    }

    async fn mouse_up(&self, x: f64, y: f64) -> Result<(), AutomationError> {
        self.mouse("mouseReleased", x, y).await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, AutomationError> {
        let response = self
            .send("Page.captureScreenshot", json!({ "format": "png" }))
            .await?;
        let data = response
            .get("data")
            .and_then(Value::as_str)
            .ok_or_else(|| AutomationError::Platform("Screenshot returned no data".into()))?;
        base64::engine::general_purpose::STANDARD
            .decode(data)
            .map_err(|e| platform("Invalid screenshot data", e))
    }
}

/// Starts Chrome or Chromium with remote debugging enabled.
pub struct BrowserLauncher {
    executable: Option<String>,
    user_data_dir: Option<String>,
}

/// A launched browser. The process is killed when this is dropped.
pub struct BrowserProcess {
    child: Child,
    pub debug_port: u16,
}

impl BrowserProcess {
    pub async fn shutdown(mut self) -> Result<(), AutomationError> {
        self.child
            .kill()
            .await
            .map_err(|e| platform("Failed to stop browser", e))
    }
}

const EXECUTABLE_CANDIDATES: &[&str] = &[
    "google-chrome",
    "google-chrome-stable",
    "chromium",
    "chromium-browser",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
];

impl Default for BrowserLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserLauncher {
    /// Uses `CHROME_PATH` when set, otherwise the usual install locations.
    pub fn new() -> Self {
        Self {
            executable: std::env::var("CHROME_PATH").ok(),
            user_data_dir: None,
        }
    }

    pub fn with_executable(mut self, path: impl Into<String>) -> Self {
        self.executable = Some(path.into());
        self
    }

    pub fn with_user_data_dir(mut self, dir: impl Into<String>) -> Self {
        self.user_data_dir = Some(dir.into());
        self
    }

    pub fn args(&self, config: &PortalConfig) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", config.debug_port),
            format!(
                "--window-size={},{}",
                config.viewport.width, config.viewport.height
            ),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-background-networking".to_string(),
        ];
        if config.headless {
            args.push("--headless=new".to_string());
        }
        if let Some(dir) = &self.user_data_dir {
            args.push(format!("--user-data-dir={dir}"));
        }
        args.push("about:blank".to_string());
        args
    }

    /// Spawn the browser and wait until its DevTools endpoint answers.
    pub async fn launch(&self, config: &PortalConfig) -> Result<BrowserProcess, AutomationError> {
        let args = self.args(config);
        let candidates: Vec<&str> = match &self.executable {
            Some(path) => vec![path.as_str()],
            None => EXECUTABLE_CANDIDATES.to_vec(),
        };

        let mut last_error = None;
        let mut child = None;
        for exe in candidates {
            match Command::new(exe)
                .args(&args)
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
            {
                Ok(c) => {
                    info!("Launched browser {} on port {}", exe, config.debug_port);
                    child = Some(c);
                    break;
                }
                Err(e) => {
                    debug!("Could not start {}: {}", exe, e);
                    last_error = Some(e);
                }
            }
        }
        let child = child.ok_or_else(|| {
            AutomationError::Platform(format!(
                "No Chrome executable found (set CHROME_PATH): {}",
                last_error.map(|e| e.to_string()).unwrap_or_default()
            ))
        })?;

        let endpoint = DevToolsEndpoint::new(config.debug_port);
        let deadline = Instant::now() + LAUNCH_TIMEOUT;
        while !endpoint.is_available().await {
            if Instant::now() >= deadline {
                return Err(AutomationError::Timeout(format!(
                    "Browser did not open port {} within {:?}",
                    config.debug_port, LAUNCH_TIMEOUT
                )));
            }
            tokio::time::sleep(READY_POLL).await;
        }
        Ok(BrowserProcess {
            child,
            debug_port: config.debug_port,
        })
    }
}
