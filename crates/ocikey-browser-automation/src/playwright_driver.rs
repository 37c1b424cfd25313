use std::collections::HashMap;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::driver_script::DRIVER_SCRIPT;
use crate::page_query::{PageQuery, PageQueryError};
use crate::session_lifecycle::{PageExecutor, SessionEvent};

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverLaunchConfig {
    pub node_bin: String,
    pub playwright_module: String,
    pub headless: bool,
    pub startup_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for DriverLaunchConfig {
    fn default() -> Self {
        Self {
            node_bin: "node".to_string(),
            playwright_module: "playwright".to_string(),
            headless: false,
            startup_timeout: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Serialize)]
struct DriverArguments<'a> {
    playwright_module: &'a str,
    headless: bool,
    start_url: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "name", rename_all = "snake_case")]
enum DriverCommand<'a> {
    Navigate { url: &'a str },
    Query { query: &'a PageQuery },
    SetWindowVisible { visible: bool },
    SetAutomatedFlow { enabled: bool },
    Shutdown,
}

impl DriverCommand<'_> {
    fn name(&self) -> &'static str {
        match self {
            Self::Navigate { .. } => "navigate",
            Self::Query { .. } => "query",
            Self::SetWindowVisible { .. } => "set_window_visible",
            Self::SetAutomatedFlow { .. } => "set_automated_flow",
            Self::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug, Serialize)]
struct DriverRequest<'a> {
    id: u64,
    command: DriverCommand<'a>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DriverMessage {
    Ready,
    Response {
        id: u64,
        ok: bool,
        #[serde(default)]
        value: Value,
        #[serde(default)]
        error: Option<String>,
        #[serde(default)]
        kind: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        suggested_filename: Option<String>,
    },
}

impl DriverMessage {
    fn into_session_event(
        event: String,
        url: Option<String>,
        file: Option<String>,
    ) -> Option<SessionEvent> {
        match event.as_str() {
            "navigated" => Some(SessionEvent::Navigated {
                url: url.unwrap_or_default(),
            }),
            "closed" => Some(SessionEvent::Closed),
            "download_cancelled" => Some(SessionEvent::DownloadCancelled {
                suggested_filename: file.unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

type PendingReplies = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, PageQueryError>>>>>;

struct RunningDriver {
    child: Child,
    stdin: ChildStdin,
    pending: PendingReplies,
}

/// [`PageExecutor`] backed by a long-lived `node` process running Playwright.
pub struct PlaywrightDriver {
    config: DriverLaunchConfig,
    running: Option<RunningDriver>,
    next_request_id: u64,
}

impl PlaywrightDriver {
    pub fn new(config: DriverLaunchConfig) -> Result<Self> {
        if config.node_bin.trim().is_empty() {
            bail!("node executable path cannot be empty");
        }
        if config.playwright_module.trim().is_empty() {
            bail!("playwright module name cannot be empty");
        }
        Ok(Self {
            config,
            running: None,
            next_request_id: 0,
        })
    }

    pub fn config(&self) -> &DriverLaunchConfig {
        &self.config
    }

    async fn spawn(&mut self, start_url: &str) -> Result<mpsc::Receiver<SessionEvent>> {
        let arguments = serde_json::to_string(&DriverArguments {
            playwright_module: self.config.playwright_module.trim(),
            headless: self.config.headless,
            start_url,
        })
        .context("serialize driver launch arguments")?;

        let mut child = Command::new(self.config.node_bin.trim())
            .arg("-e")
            .arg(DRIVER_SCRIPT)
            .arg(arguments)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "failed to launch browser driver with '{}'",
                    self.config.node_bin
                )
            })?;

        let stdin = child.stdin.take().context("driver stdin was not captured")?;
        let stdout = child
            .stdout
            .take()
            .context("driver stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("driver stderr was not captured")?;

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "ocikey::driver", "{line}");
            }
        });

        let pending: PendingReplies = Arc::new(Mutex::new(HashMap::new()));
        let (event_sender, event_receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (ready_sender, ready_receiver) = oneshot::channel();
        tokio::spawn(route_driver_output(
            stdout,
            pending.clone(),
            event_sender,
            ready_sender,
        ));

        match tokio::time::timeout(self.config.startup_timeout, ready_receiver).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => {
                let status = child.try_wait().ok().flatten();
                bail!(
                    "browser driver exited during startup (status: {}); is '{}' installed?",
                    status
                        .map(|status| status.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                    self.config.playwright_module
                );
            }
            Err(_) => {
                let _ = child.start_kill();
                bail!(
                    "browser driver did not become ready within {} s",
                    self.config.startup_timeout.as_secs()
                );
            }
        }

        self.running = Some(RunningDriver {
            child,
            stdin,
            pending,
        });
        info!(node = %self.config.node_bin, "browser driver ready");
        Ok(event_receiver)
    }

    async fn request(&mut self, command: DriverCommand<'_>) -> Result<Value, PageQueryError> {
        let timeout = self.config.request_timeout;
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        let command_name = command.name();

        let running = self
            .running
            .as_mut()
            .ok_or_else(|| PageQueryError::SessionGone("driver is not running".to_string()))?;

        let mut line = serde_json::to_string(&DriverRequest { id, command })
            .map_err(|error| PageQueryError::Evaluation(format!("serialize request: {error}")))?;
        line.push('\n');

        let (reply_sender, reply_receiver) = oneshot::channel();
        lock_pending(&running.pending).insert(id, reply_sender);

        let written = async {
            running.stdin.write_all(line.as_bytes()).await?;
            running.stdin.flush().await
        }
        .await;
        if let Err(error) = written {
            lock_pending(&running.pending).remove(&id);
            return Err(PageQueryError::SessionGone(format!(
                "failed to write to driver: {error}"
            )));
        }

        match tokio::time::timeout(timeout, reply_receiver).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(PageQueryError::SessionGone(
                "driver exited before replying".to_string(),
            )),
            Err(_) => {
                lock_pending(&running.pending).remove(&id);
                warn!(command = command_name, id, "driver request timed out");
                Err(PageQueryError::Timeout(timeout.as_millis() as u64))
            }
        }
    }
}

fn lock_pending(
    pending: &PendingReplies,
) -> std::sync::MutexGuard<'_, HashMap<u64, oneshot::Sender<Result<Value, PageQueryError>>>> {
    pending
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn route_driver_output(
    stdout: tokio::process::ChildStdout,
    pending: PendingReplies,
    events: mpsc::Sender<SessionEvent>,
    ready: oneshot::Sender<()>,
) {
    let mut ready = Some(ready);
    let mut lines = BufReader::new(stdout).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(error) => {
                warn!(error = %error, "failed to read driver output");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message = match serde_json::from_str::<DriverMessage>(&line) {
            Ok(message) => message,
            Err(error) => {
                debug!(error = %error, "ignoring non-protocol driver output");
                continue;
            }
        };
        match message {
            DriverMessage::Ready => {
                if let Some(ready) = ready.take() {
                    let _ = ready.send(());
                }
            }
            DriverMessage::Response {
                id,
                ok,
                value,
                error,
                kind,
            } => {
                let reply = if ok {
                    Ok(value)
                } else {
                    Err(PageQueryError::from_driver_kind(
                        kind.as_deref(),
                        error.unwrap_or_else(|| "unknown driver error".to_string()),
                    ))
                };
                match lock_pending(&pending).remove(&id) {
                    Some(sender) => {
                        let _ = sender.send(reply);
                    }
                    None => debug!(id, "dropping reply for abandoned request"),
                }
            }
            DriverMessage::Event {
                event,
                url,
                suggested_filename,
            } => {
                let Some(event) = DriverMessage::into_session_event(event, url, suggested_filename)
                else {
                    continue;
                };
                if let Err(error) = events.try_send(event) {
                    debug!(error = %error, "browser event dropped");
                }
            }
        }
    }

    for (_, sender) in lock_pending(&pending).drain() {
        let _ = sender.send(Err(PageQueryError::SessionGone(
            "driver output closed".to_string(),
        )));
    }
    debug!("driver output stream closed");
}

#[async_trait]
impl PageExecutor for PlaywrightDriver {
    async fn start_session(
        &mut self,
        start_url: &str,
    ) -> Result<mpsc::Receiver<SessionEvent>, PageQueryError> {
        if self.running.is_some() {
            return Err(PageQueryError::SessionGone(
                "driver session already started".to_string(),
            ));
        }
        self.spawn(start_url)
            .await
            .map_err(|error| PageQueryError::SessionGone(format!("{error:#}")))
    }

    async fn navigate(&mut self, url: &str) -> Result<(), PageQueryError> {
        self.request(DriverCommand::Navigate { url }).await.map(|_| ())
    }

    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value, PageQueryError> {
        self.request(DriverCommand::Query { query }).await
    }

    async fn set_window_visible(&mut self, visible: bool) -> Result<(), PageQueryError> {
        self.request(DriverCommand::SetWindowVisible { visible })
            .await
            .map(|_| ())
    }

    async fn set_automated_flow(&mut self, enabled: bool) -> Result<(), PageQueryError> {
        self.request(DriverCommand::SetAutomatedFlow { enabled })
            .await
            .map(|_| ())
    }

    async fn shutdown_session(&mut self) -> Result<(), PageQueryError> {
        if self.running.is_none() {
            return Ok(());
        }
        let result = self.request(DriverCommand::Shutdown).await.map(|_| ());
        if let Some(mut running) = self.running.take() {
            match tokio::time::timeout(Duration::from_secs(5), running.child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "browser driver exited"),
                _ => {
                    let _ = running.child.start_kill();
                }
            }
        }
        result
    }

    fn abandon_session(&mut self) {
        if let Some(mut running) = self.running.take() {
            let _ = running.child.start_kill();
        }
    }
}
