//! Browser plumbing for the OCI console flow.
//!
//! Wraps a long-lived Playwright driver process behind the [`PageExecutor`]
//! trait, models the console DOM as serializable snapshots, and provides the
//! ordered element finders and the retry/poll engine the provisioning machine
//! is built on.

pub mod dom_snapshot;
pub mod driver_script;
pub mod element_finder;
pub mod page_query;
pub mod playwright_driver;
pub mod poll_engine;
pub mod session_lifecycle;

pub use dom_snapshot::{decode_snapshots, parse_dom_snapshot, DomElement, DomSnapshot};
pub use element_finder::{ElementFinder, FinderMatch, FinderStrategy};
pub use page_query::{FrameTarget, PageQuery, PageQueryError};
pub use playwright_driver::{DriverLaunchConfig, PlaywrightDriver};
pub use poll_engine::{poll_until, AttemptBound, Backoff, PollError, PollPolicy};
pub use session_lifecycle::{BrowserSession, PageExecutor, SessionEvent, SessionState};
