//! MD5 key fingerprints in the `aa:bb:...:ff` form the console displays.

use std::sync::OnceLock;

use md5::{Digest, Md5};
use regex::Regex;
use rsa::pkcs8::EncodePublicKey;

use crate::error::CredentialError;
use crate::pem_format::decode_public_key_pem;

/// Computes the console fingerprint of a PEM-encoded SPKI public key: MD5 over
/// the DER encoding, rendered as 16 lowercase hex pairs joined by `:`.
pub fn compute_fingerprint(public_key_pem: &str) -> Result<String, CredentialError> {
    let public_key = decode_public_key_pem(public_key_pem)?;
    let canonical_der = public_key.to_public_key_der().map_err(|error| {
        CredentialError::InvalidKeyFormat(format!("public key re-encoding failed: {error}"))
    })?;
    Ok(fingerprint_from_der(canonical_der.as_bytes()))
}

pub fn fingerprint_from_der(der: &[u8]) -> String {
    format_fingerprint(&Md5::digest(der))
}

pub fn format_fingerprint(digest: &[u8]) -> String {
    digest
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Removes every whitespace character. Console widgets sometimes wrap or pad
/// the displayed value.
pub fn normalize_fingerprint(raw: &str) -> String {
    raw.chars().filter(|ch| !ch.is_whitespace()).collect()
}

/// Whitespace-insensitive, case-sensitive equality.
pub fn fingerprints_match(expected: &str, displayed: &str) -> bool {
    normalize_fingerprint(expected) == normalize_fingerprint(displayed)
}

pub fn is_canonical_fingerprint(value: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^(?:[0-9a-f]{2}:){15}[0-9a-f]{2}$").ok())
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(value))
}
