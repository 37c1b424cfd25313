use std::path::Path;

use anyhow::{Context, Result};
use ocikey_core::write_text_atomic;

/// The terminal artifact: one `[DEFAULT]` profile for OCI SDKs and the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub user: String,
    pub fingerprint: String,
    pub key_file: String,
    pub tenancy: String,
    pub region: String,
}

impl CredentialRecord {
    pub fn render(&self) -> String {
        format!(
            "[DEFAULT]\nuser={}\nfingerprint={}\nkey_file={}\ntenancy={}\nregion={}\n",
            self.user, self.fingerprint, self.key_file, self.tenancy, self.region
        )
    }
}

/// Writes the rendered record in a single atomic replace.
pub fn write_credential_file(path: &Path, record: &CredentialRecord) -> Result<()> {
    write_text_atomic(path, &record.render())
        .with_context(|| format!("failed to write credential file {}", path.display()))
}
