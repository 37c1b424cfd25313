#![no_main]

use libfuzzer_sys::fuzz_target;
use ocikey_browser_automation::parse_dom_snapshot;
use ocikey_provisioning::console_finders::{
    element_value, CONFIRM_ADD_BUTTON, FINGERPRINT_FIELD, PASTE_KEY_RADIO, PUBLIC_KEY_TEXTAREA,
    TENANCY_OCID, USER_OCID,
};

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    let Ok(snapshot) = parse_dom_snapshot(&raw) else {
        return;
    };
    for finder in [
        USER_OCID,
        PASTE_KEY_RADIO,
        PUBLIC_KEY_TEXTAREA,
        CONFIRM_ADD_BUTTON,
        FINGERPRINT_FIELD,
        TENANCY_OCID,
    ] {
        if let Some(found) = finder.find(&snapshot) {
            assert!(snapshot
                .elements
                .iter()
                .any(|element| element.handle == found.element.handle));
            let value = element_value(found.element);
            assert_eq!(value, value.trim());
        }
    }
});
