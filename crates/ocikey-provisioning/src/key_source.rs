use ocikey_credential::{generate_key_pair, CredentialError, KeyPair};

/// Supplies the key pair uploaded during `KeyUpload`. Generation runs on the
/// blocking thread pool.
pub trait KeyPairGenerator: Send + Sync {
    fn generate(&self) -> Result<KeyPair, CredentialError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RsaKeyPairGenerator;

impl KeyPairGenerator for RsaKeyPairGenerator {
    fn generate(&self) -> Result<KeyPair, CredentialError> {
        generate_key_pair()
    }
}
