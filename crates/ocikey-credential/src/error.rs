use std::path::PathBuf;

use thiserror::Error;

/// Enumerates failures of the credential primitive.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),
    #[error("key file {path} could not be used: {detail}")]
    KeyFile { path: PathBuf, detail: String },
}
