use std::path::PathBuf;

use ocikey_browser_automation::{PageQueryError, PollError};
use ocikey_credential::CredentialError;
use thiserror::Error;

use crate::context::ContextError;
use crate::phase::Phase;

/// Fatal provisioning failures. Every variant ends the run with exit code 1.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("{phase}: '{label}' not satisfied after {attempts} attempts (last: {last_diagnostic})")]
    ExhaustedRetries {
        phase: Phase,
        label: String,
        attempts: usize,
        last_diagnostic: String,
    },
    #[error("fingerprint mismatch: generated {expected}, console shows {displayed}")]
    FingerprintMismatch { expected: String, displayed: String },
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error("browser session failure: {0}")]
    Session(#[from] PageQueryError),
    #[error("provisioning context: {0}")]
    Context(#[from] ContextError),
    #[error("failed to persist credential file: {0}")]
    Persist(String),
    #[error("out-of-order phase transition {from} -> {to}")]
    OutOfOrderTransition { from: Phase, to: Phase },
    #[error("run exceeded the {0} s watchdog")]
    WatchdogExpired(u64),
}

impl ProvisioningError {
    pub fn from_poll(phase: Phase, error: PollError) -> Self {
        match error {
            PollError::Exhausted {
                label,
                attempts,
                last_diagnostic,
            } => Self::ExhaustedRetries {
                phase,
                label,
                attempts,
                last_diagnostic,
            },
            PollError::Fatal { source, .. } => Self::Session(source),
        }
    }

    pub fn exit_code(&self) -> i32 {
        1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningOutcome {
    Completed { credential_path: PathBuf },
    /// The window was closed before sign-in completed.
    UserAborted,
}

impl ProvisioningOutcome {
    pub fn exit_code(&self) -> i32 {
        0
    }
}
