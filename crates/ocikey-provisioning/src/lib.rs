//! The OCI API-key provisioning state machine.
//!
//! Drives one browser session from interactive sign-in to a written
//! `[DEFAULT]` credential file: login detection, profile discovery, key upload,
//! fingerprint verification, tenancy discovery and persistence. Every phase
//! polls the console DOM through ordered element finders and never advances
//! until the expected value is confirmed.

pub mod config;
pub mod console_finders;
pub mod context;
pub mod error;
pub mod key_source;
pub mod login;
pub mod machine;
pub mod phase;
pub mod watchdog;

pub use config::{ConsoleEndpoints, PhaseTimings, ProvisioningConfig, RunMode};
pub use context::{ContextError, ContextField, ProvisioningContext};
pub use error::{ProvisioningError, ProvisioningOutcome};
pub use key_source::{KeyPairGenerator, RsaKeyPairGenerator};
pub use login::region_from_login_url;
pub use machine::ProvisioningMachine;
pub use phase::{Phase, PhaseTracker};
pub use watchdog::run_with_watchdog;
