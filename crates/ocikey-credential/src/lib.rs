//! Credential primitive for OCI API-key provisioning.
//!
//! Generates the RSA key pair uploaded to the console, computes the MD5
//! fingerprint the console displays, formats keys in the PEM layout the SDKs
//! expect, and renders the final `[DEFAULT]` credential file.

pub mod credential_file;
pub mod error;
pub mod fingerprint;
pub mod key_files;
pub mod key_pair;
pub mod pem_format;

pub use credential_file::{write_credential_file, CredentialRecord};
pub use error::CredentialError;
pub use fingerprint::{
    compute_fingerprint, fingerprints_match, is_canonical_fingerprint, normalize_fingerprint,
};
pub use key_files::{KeyFiles, PRIVATE_KEY_FILE_NAME, PUBLIC_KEY_FILE_NAME};
pub use key_pair::{derive_public_key_from_private, generate_key_pair, KeyPair};
pub use pem_format::PRIVATE_KEY_PROVENANCE_MARKER;
