use std::path::{Path, PathBuf};

use ocikey_core::{write_text_atomic, write_text_atomic_with_mode};
use tracing::info;

use crate::error::CredentialError;
use crate::fingerprint::compute_fingerprint;
use crate::key_pair::{derive_public_key_from_private, KeyPair};

pub const PRIVATE_KEY_FILE_NAME: &str = "private.pem";
pub const PUBLIC_KEY_FILE_NAME: &str = "public.pem";

const PRIVATE_KEY_FILE_MODE: u32 = 0o600;

/// Location of the `private.pem` / `public.pem` pair for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFiles {
    dir: PathBuf,
}

impl KeyFiles {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.dir.join(PRIVATE_KEY_FILE_NAME)
    }

    pub fn public_key_path(&self) -> PathBuf {
        self.dir.join(PUBLIC_KEY_FILE_NAME)
    }

    /// Writes both PEM files, replacing any previous pair.
    pub fn write(&self, key_pair: &KeyPair) -> Result<(), CredentialError> {
        let private_path = self.private_key_path();
        write_text_atomic_with_mode(
            &private_path,
            &key_pair.private_key_pem,
            Some(PRIVATE_KEY_FILE_MODE),
        )
        .map_err(|error| key_file_error(&private_path, &error))?;

        let public_path = self.public_key_path();
        write_text_atomic(&public_path, &key_pair.public_key_pem)
            .map_err(|error| key_file_error(&public_path, &error))?;

        info!(
            private_key = %private_path.display(),
            public_key = %public_path.display(),
            fingerprint = %key_pair.fingerprint,
            "wrote api key pair"
        );
        Ok(())
    }

    /// Regenerates `public.pem` from the existing `private.pem` and returns the
    /// fingerprint of the recovered key.
    pub fn recover_public_key(&self) -> Result<String, CredentialError> {
        let private_path = self.private_key_path();
        let private_key_pem = std::fs::read_to_string(&private_path).map_err(|error| {
            CredentialError::KeyFile {
                path: private_path.clone(),
                detail: error.to_string(),
            }
        })?;
        let public_key_pem = derive_public_key_from_private(&private_key_pem)?;
        let fingerprint = compute_fingerprint(&public_key_pem)?;

        let public_path = self.public_key_path();
        write_text_atomic(&public_path, &public_key_pem)
            .map_err(|error| key_file_error(&public_path, &error))?;
        info!(
            public_key = %public_path.display(),
            fingerprint = %fingerprint,
            "recovered public key from private key"
        );
        Ok(fingerprint)
    }
}

fn key_file_error(path: &Path, error: &anyhow::Error) -> CredentialError {
    CredentialError::KeyFile {
        path: path.to_path_buf(),
        detail: format!("{error:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use tempfile::tempdir;

    use super::KeyFiles;
    use crate::error::CredentialError;
    use crate::key_pair::{generate_key_pair, KeyPair};

    fn shared_key_pair() -> &'static KeyPair {
        static KEY_PAIR: OnceLock<KeyPair> = OnceLock::new();
        KEY_PAIR.get_or_init(|| generate_key_pair().expect("generate key pair"))
    }

    #[test]
    fn functional_write_persists_both_pem_files() {
        let temp = tempdir().expect("tempdir");
        let files = KeyFiles::new(temp.path());
        files.write(shared_key_pair()).expect("write");

        let private = std::fs::read_to_string(files.private_key_path()).expect("private");
        let public = std::fs::read_to_string(files.public_key_path()).expect("public");
        assert_eq!(private, shared_key_pair().private_key_pem);
        assert_eq!(public, shared_key_pair().public_key_pem);
    }

    #[test]
    fn integration_recover_rebuilds_missing_public_key() {
        let temp = tempdir().expect("tempdir");
        let files = KeyFiles::new(temp.path());
        files.write(shared_key_pair()).expect("write");
        std::fs::remove_file(files.public_key_path()).expect("remove public");

        let fingerprint = files.recover_public_key().expect("recover");
        assert_eq!(fingerprint, shared_key_pair().fingerprint);
        let public = std::fs::read_to_string(files.public_key_path()).expect("public");
        assert_eq!(public, shared_key_pair().public_key_pem);
    }

    #[test]
    fn regression_recover_reports_missing_private_key() {
        let temp = tempdir().expect("tempdir");
        let error = KeyFiles::new(temp.path())
            .recover_public_key()
            .expect_err("missing private key");
        assert!(matches!(error, CredentialError::KeyFile { .. }));
    }

    #[test]
    fn regression_recover_rejects_malformed_private_key() {
        let temp = tempdir().expect("tempdir");
        let files = KeyFiles::new(temp.path());
        std::fs::write(files.private_key_path(), "garbage").expect("write garbage");
        let error = files.recover_public_key().expect_err("malformed key");
        assert!(matches!(error, CredentialError::InvalidKeyFormat(_)));
        assert!(!files.public_key_path().exists());
    }
}
