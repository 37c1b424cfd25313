use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::dom_snapshot::{decode_snapshots, DomSnapshot};
use crate::page_query::{FrameTarget, PageQuery, PageQueryError};

/// Events surfaced by the hosting browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Main-frame navigation completed, including in-page navigations.
    Navigated { url: String },
    /// The page (window) was closed by the user.
    Closed,
    DownloadCancelled { suggested_filename: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    Loading,
    Ready,
    Destroyed,
}

/// Seam between the provisioning flow and a concrete browser engine.
#[async_trait]
pub trait PageExecutor: Send {
    /// Opens an isolated, cleared browsing context, starts loading
    /// `start_url`, and hands back the event stream.
    async fn start_session(
        &mut self,
        start_url: &str,
    ) -> Result<mpsc::Receiver<SessionEvent>, PageQueryError>;

    async fn navigate(&mut self, url: &str) -> Result<(), PageQueryError>;

    async fn evaluate(&mut self, query: &PageQuery) -> Result<Value, PageQueryError>;

    async fn set_window_visible(&mut self, _visible: bool) -> Result<(), PageQueryError> {
        Ok(())
    }

    /// While enabled, unsolicited downloads are cancelled and a closed page is
    /// reopened in the same browsing context.
    async fn set_automated_flow(&mut self, _enabled: bool) -> Result<(), PageQueryError> {
        Ok(())
    }

    async fn shutdown_session(&mut self) -> Result<(), PageQueryError>;

    /// Best-effort synchronous teardown used when a session is dropped
    /// without an orderly shutdown.
    fn abandon_session(&mut self) {}
}

/// Owns one browsing session and its lifecycle state.
pub struct BrowserSession<E: PageExecutor> {
    executor: E,
    state: SessionState,
    events: Option<mpsc::Receiver<SessionEvent>>,
    last_url: Option<String>,
}

impl<E: PageExecutor> BrowserSession<E> {
    pub fn new(executor: E) -> Self {
        Self {
            executor,
            state: SessionState::Created,
            events: None,
            last_url: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn last_url(&self) -> Option<&str> {
        self.last_url.as_deref()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub async fn start(&mut self, start_url: &str) -> Result<(), PageQueryError> {
        match self.state {
            SessionState::Created => {}
            SessionState::Destroyed => {
                return Err(PageQueryError::SessionGone(
                    "session was already shut down".to_string(),
                ))
            }
            SessionState::Loading | SessionState::Ready => return Ok(()),
        }
        let events = self.executor.start_session(start_url).await?;
        self.events = Some(events);
        self.state = SessionState::Loading;
        info!(url = start_url, "browser session started");
        Ok(())
    }

    /// Waits for the next browser event. `None` once the event stream ends.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events.as_mut()?.recv().await;
        self.observe(event.as_ref());
        event
    }

    /// Consumes every already-queued event without waiting.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        let mut drained = Vec::new();
        while let Some(receiver) = self.events.as_mut() {
            match receiver.try_recv() {
                Ok(event) => {
                    self.observe(Some(&event));
                    drained.push(event);
                }
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    self.observe(None);
                    break;
                }
            }
        }
        drained
    }

    fn observe(&mut self, event: Option<&SessionEvent>) {
        match event {
            Some(SessionEvent::Navigated { url }) => {
                debug!(url = %url, "navigation completed");
                self.last_url = Some(url.clone());
                self.state = SessionState::Ready;
            }
            Some(SessionEvent::Closed) => {
                info!("browser window closed");
                self.state = SessionState::Loading;
            }
            Some(SessionEvent::DownloadCancelled { suggested_filename }) => {
                info!(file = %suggested_filename, "cancelled unsolicited download");
            }
            None => {
                debug!("browser event stream ended");
                self.events = None;
            }
        }
    }

    pub async fn navigate(&mut self, url: &str) -> Result<(), PageQueryError> {
        self.ensure_live()?;
        info!(url, "navigating");
        self.state = SessionState::Loading;
        self.executor.navigate(url).await
    }

    pub async fn evaluate(&mut self, query: &PageQuery) -> Result<Value, PageQueryError> {
        self.ensure_live()?;
        self.executor.evaluate(query).await
    }

    pub async fn current_url(&mut self) -> Result<String, PageQueryError> {
        let value = self.evaluate(&PageQuery::CurrentUrl).await?;
        let url = value
            .as_str()
            .ok_or_else(|| PageQueryError::MalformedResult(format!("current url: {value}")))?
            .to_string();
        self.last_url = Some(url.clone());
        Ok(url)
    }

    pub async fn snapshot(
        &mut self,
        target: &FrameTarget,
        selector: &str,
    ) -> Result<Vec<DomSnapshot>, PageQueryError> {
        let value = self
            .evaluate(&PageQuery::Snapshot {
                target: target.clone(),
                selector: selector.to_string(),
            })
            .await?;
        decode_snapshots(value)
    }

    pub async fn click(&mut self, target: &FrameTarget, handle: &str) -> Result<(), PageQueryError> {
        let query = PageQuery::Click {
            target: target.clone(),
            handle: handle.to_string(),
        };
        self.run_action(query, handle).await
    }

    pub async fn select_radio(
        &mut self,
        target: &FrameTarget,
        handle: &str,
    ) -> Result<(), PageQueryError> {
        let query = PageQuery::SelectRadio {
            target: target.clone(),
            handle: handle.to_string(),
        };
        self.run_action(query, handle).await
    }

    /// Sets the element value and fires `input` and `change`.
    pub async fn fill_text(
        &mut self,
        target: &FrameTarget,
        handle: &str,
        text: &str,
    ) -> Result<(), PageQueryError> {
        let query = PageQuery::FillText {
            target: target.clone(),
            handle: handle.to_string(),
            text: text.to_string(),
        };
        self.run_action(query, handle).await
    }

    /// Removes matching overlays from the top document and every frame;
    /// returns how many nodes were removed.
    pub async fn remove_spinners(&mut self, selectors: &[&str]) -> Result<u64, PageQueryError> {
        let value = self
            .evaluate(&PageQuery::RemoveSpinners {
                selectors: selectors.iter().map(|selector| selector.to_string()).collect(),
            })
            .await?;
        Ok(value.as_u64().unwrap_or_default())
    }

    pub async fn set_window_visible(&mut self, visible: bool) -> Result<(), PageQueryError> {
        self.ensure_live()?;
        info!(visible, "updating window visibility");
        self.executor.set_window_visible(visible).await
    }

    pub async fn set_automated_flow(&mut self, enabled: bool) -> Result<(), PageQueryError> {
        self.ensure_live()?;
        self.executor.set_automated_flow(enabled).await
    }

    pub async fn shutdown(&mut self) -> Result<(), PageQueryError> {
        match self.state {
            SessionState::Created => {
                self.state = SessionState::Destroyed;
                return Ok(());
            }
            SessionState::Destroyed => return Ok(()),
            SessionState::Loading | SessionState::Ready => {}
        }
        self.state = SessionState::Destroyed;
        self.events = None;
        let result = self.executor.shutdown_session().await;
        match &result {
            Ok(()) => info!("browser session shut down"),
            Err(error) => warn!(error = %error, "browser session shutdown failed"),
        }
        result
    }

    /// Kills the browser without waiting for an orderly close. Also reaps a
    /// browser whose `shutdown` was cut short.
    pub fn abandon(&mut self) {
        if self.state != SessionState::Created {
            self.executor.abandon_session();
            warn!("browser session abandoned");
        }
        self.state = SessionState::Destroyed;
        self.events = None;
    }

    async fn run_action(&mut self, query: PageQuery, handle: &str) -> Result<(), PageQueryError> {
        let value = self.evaluate(&query).await?;
        if value.as_bool() == Some(true) {
            debug!(action = query.name(), handle, "page action applied");
            Ok(())
        } else {
            Err(PageQueryError::StaleHandle(handle.to_string()))
        }
    }

    fn ensure_live(&self) -> Result<(), PageQueryError> {
        match self.state {
            SessionState::Created => Err(PageQueryError::SessionGone(
                "session has not been started".to_string(),
            )),
            SessionState::Destroyed => Err(PageQueryError::SessionGone(
                "session was shut down".to_string(),
            )),
            SessionState::Loading | SessionState::Ready => Ok(()),
        }
    }
}

impl<E: PageExecutor> Drop for BrowserSession<E> {
    fn drop(&mut self) {
        if matches!(self.state, SessionState::Loading | SessionState::Ready) {
            self.executor.abandon_session();
        }
    }
}
