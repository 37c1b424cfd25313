#![no_main]

use libfuzzer_sys::fuzz_target;
use ocikey_credential::{compute_fingerprint, derive_public_key_from_private, is_canonical_fingerprint};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(public_key_pem) = derive_public_key_from_private(&raw) {
        assert!(public_key_pem.starts_with("-----BEGIN PUBLIC KEY-----\n"));
        let fingerprint = compute_fingerprint(&public_key_pem).expect("derived key fingerprints");
        assert!(is_canonical_fingerprint(&fingerprint));
    }
});
