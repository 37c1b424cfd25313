use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Selects which document(s) of the active page a query runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FrameTarget {
    /// The first frame whose URL contains `url_fragment`, falling back to the
    /// top-level document when no such frame is attached.
    PreferEmbedded { url_fragment: String },
    /// The top-level document first, then every attached frame.
    AllFrames,
}

impl FrameTarget {
    pub fn prefer_embedded(url_fragment: impl Into<String>) -> Self {
        Self::PreferEmbedded {
            url_fragment: url_fragment.into(),
        }
    }
}

/// A single query or action evaluated by the driver inside the page.
///
/// Element actions address elements by the handle assigned in the most recent
/// [`PageQuery::Snapshot`] of the same document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum PageQuery {
    CurrentUrl,
    Snapshot {
        target: FrameTarget,
        selector: String,
    },
    Click {
        target: FrameTarget,
        handle: String,
    },
    SelectRadio {
        target: FrameTarget,
        handle: String,
    },
    FillText {
        target: FrameTarget,
        handle: String,
        text: String,
    },
    RemoveSpinners {
        selectors: Vec<String>,
    },
}

impl PageQuery {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CurrentUrl => "current_url",
            Self::Snapshot { .. } => "snapshot",
            Self::Click { .. } => "click",
            Self::SelectRadio { .. } => "select_radio",
            Self::FillText { .. } => "fill_text",
            Self::RemoveSpinners { .. } => "remove_spinners",
        }
    }
}

/// Failures surfaced by the page query layer.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PageQueryError {
    #[error("page is mid-navigation: {0}")]
    Navigating(String),
    #[error("in-page evaluation failed: {0}")]
    Evaluation(String),
    #[error("element handle '{0}' is no longer attached")]
    StaleHandle(String),
    #[error("malformed query result: {0}")]
    MalformedResult(String),
    #[error("browser request timed out after {0} ms")]
    Timeout(u64),
    #[error("page was closed")]
    PageClosed,
    #[error("browser session is gone: {0}")]
    SessionGone(String),
}

impl PageQueryError {
    /// Transient errors are absorbed by polling; everything else ends the run.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::SessionGone(_))
    }

    /// Maps the driver's error `kind` tag onto a typed error.
    pub fn from_driver_kind(kind: Option<&str>, message: String) -> Self {
        match kind.map(str::trim) {
            Some("navigating") => Self::Navigating(message),
            Some("stale_handle") => Self::StaleHandle(message),
            Some("page_closed") => Self::PageClosed,
            Some("session") => Self::SessionGone(message),
            _ => Self::Evaluation(message),
        }
    }
}
