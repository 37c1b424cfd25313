#![no_main]

use libfuzzer_sys::fuzz_target;
use ocikey_provisioning::region_from_login_url;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Some(region) = region_from_login_url(&raw, "cloud.oracle.com") {
        assert!(!region.is_empty());
        assert_eq!(region, region.trim());
    }
});
