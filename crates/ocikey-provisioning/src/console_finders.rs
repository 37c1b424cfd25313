//! Element finders for the identity console pages.
//!
//! Each chain runs from the most specific heuristic (attributes) through label
//! association and generated class names down to structural fallbacks.

use std::sync::OnceLock;

use ocikey_browser_automation::{DomElement, DomSnapshot, ElementFinder, FinderStrategy};
use regex::Regex;

use crate::context::{TENANCY_OCID_PREFIX, USER_OCID_PREFIX};

pub const USER_OCID_TEST_ID: &str = "jet-meta-label-1-text-container";

pub const USER_OCID: ElementFinder = ElementFinder {
    name: "user_ocid",
    snapshot_selector: "bdi, span",
    strategies: &[
        FinderStrategy {
            name: "meta_label_bdi",
            brittle: false,
            locate: user_ocid_in_meta_label,
        },
        FinderStrategy {
            name: "any_ocid_text",
            brittle: false,
            locate: user_ocid_anywhere,
        },
    ],
};

pub const ADD_API_KEY_BUTTON: ElementFinder = ElementFinder {
    name: "add_api_key_button",
    snapshot_selector: "button",
    strategies: &[
        FinderStrategy {
            name: "aria_label",
            brittle: false,
            locate: add_api_key_by_aria_label,
        },
        FinderStrategy {
            name: "button_text",
            brittle: false,
            locate: add_api_key_by_text,
        },
    ],
};

pub const PASTE_KEY_RADIO: ElementFinder = ElementFinder {
    name: "paste_public_key_radio",
    snapshot_selector: "input[type=\"radio\"]",
    strategies: &[
        FinderStrategy {
            name: "value_text",
            brittle: false,
            locate: paste_radio_by_value,
        },
        FinderStrategy {
            name: "label_text",
            brittle: false,
            locate: paste_radio_by_label,
        },
        // The paste option has been the third radio of the upload dialog.
        FinderStrategy {
            name: "third_radio",
            brittle: true,
            locate: paste_radio_by_position,
        },
    ],
};

pub const PUBLIC_KEY_TEXTAREA: ElementFinder = ElementFinder {
    name: "public_key_textarea",
    snapshot_selector: "textarea",
    strategies: &[
        FinderStrategy {
            name: "aria_label",
            brittle: false,
            locate: textarea_by_aria_label,
        },
        FinderStrategy {
            name: "label_for",
            brittle: false,
            locate: textarea_by_label,
        },
        FinderStrategy {
            name: "class_fragment",
            brittle: false,
            locate: textarea_by_class,
        },
        FinderStrategy {
            name: "first_textarea",
            brittle: true,
            locate: first_textarea,
        },
    ],
};

pub const CONFIRM_ADD_BUTTON: ElementFinder = ElementFinder {
    name: "confirm_add_button",
    snapshot_selector: "button",
    strategies: &[
        FinderStrategy {
            name: "aria_label",
            brittle: false,
            locate: confirm_by_aria_label,
        },
        FinderStrategy {
            name: "type_button",
            brittle: false,
            locate: confirm_by_type,
        },
        FinderStrategy {
            name: "base_button_class",
            brittle: false,
            locate: confirm_by_class,
        },
    ],
};

pub const FINGERPRINT_FIELD: ElementFinder = ElementFinder {
    name: "fingerprint_field",
    snapshot_selector: "div[role=\"textbox\"], div[aria-labelledby]",
    strategies: &[
        FinderStrategy {
            name: "readonly_textbox_class",
            brittle: false,
            locate: fingerprint_by_class,
        },
        FinderStrategy {
            name: "fingerprint_label",
            brittle: false,
            locate: fingerprint_by_label,
        },
        FinderStrategy {
            name: "fingerprint_pattern",
            brittle: false,
            locate: fingerprint_by_pattern,
        },
    ],
};

pub const TENANCY_OCID: ElementFinder = ElementFinder {
    name: "tenancy_ocid",
    snapshot_selector: "textarea[aria-hidden=\"true\"], div[data-test-id*=\"ocid\"]",
    strategies: &[
        FinderStrategy {
            name: "hidden_textarea",
            brittle: false,
            locate: tenancy_in_hidden_textarea,
        },
        FinderStrategy {
            name: "ocid_container",
            brittle: false,
            locate: tenancy_in_ocid_container,
        },
    ],
};

/// Text the finders above expose for the located element.
pub fn element_value(element: &DomElement) -> String {
    element.value_or_text().trim().to_string()
}

fn user_ocid_in_meta_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.by_tag("bdi").find(|element| {
        element.within_test_id(USER_OCID_TEST_ID) && element.text.starts_with(USER_OCID_PREFIX)
    })
}

fn user_ocid_anywhere(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.elements.iter().find(|element| {
        (element.is_tag("bdi") || element.is_tag("span"))
            && element.text.starts_with(&format!("{USER_OCID_PREFIX}."))
    })
}

fn add_api_key_by_aria_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .by_tag("button")
        .find(|element| element.attribute_is("aria-label", "Add API key"))
}

fn add_api_key_by_text(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .by_tag("button")
        .find(|element| element.text == "Add API key" && !element.disabled)
}

fn paste_radio_by_value(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .radios()
        .find(|element| element.attribute_is("value", "text"))
}

fn paste_radio_by_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.radios().find(|element| {
        element
            .label_text
            .as_deref()
            .is_some_and(|label| label.contains("Paste") || label.contains("public key"))
    })
}

fn paste_radio_by_position(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.radios().nth(2)
}

fn textarea_by_aria_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .by_tag("textarea")
        .find(|element| element.attribute_is("aria-label", "Public key"))
}

fn textarea_by_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    let label = snapshot
        .labels()
        .find(|label| label.text.contains("Public key") || label.text.contains("Paste public key"))?;
    snapshot.labelled_target(label)
}

fn textarea_by_class(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .by_tag("textarea")
        .find(|element| element.class_contains("TextFieldInputStyles_textFieldInputBase__"))
}

fn first_textarea(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.by_tag("textarea").next()
}

fn is_clickable_add(element: &DomElement) -> bool {
    element.is_tag("button") && element.text == "Add" && !element.disabled && element.visible
}

fn confirm_by_aria_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .elements
        .iter()
        .find(|element| element.attribute_is("aria-label", "Add") && is_clickable_add(element))
}

fn confirm_by_type(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot
        .elements
        .iter()
        .find(|element| element.attribute_is("type", "button") && is_clickable_add(element))
}

fn confirm_by_class(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.elements.iter().find(|element| {
        element.attribute("class").is_some_and(|class| {
            class
                .split_whitespace()
                .any(|token| token == "BaseButtonStyles_styles_base__jvi3ds0")
        }) && is_clickable_add(element)
    })
}

fn fingerprint_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)([0-9a-f]{2}:){15}[0-9a-f]{2}").ok())
        .as_ref()
}

fn is_textbox(element: &DomElement) -> bool {
    element.is_tag("div") && element.attribute_is("role", "textbox")
}

fn has_value(element: &DomElement) -> bool {
    !element.value_or_text().trim().is_empty()
}

fn fingerprint_by_class(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.elements.iter().find(|element| {
        is_textbox(element)
            && element.class_contains("ReadonlyTextFieldInputStyles_readOnlyTextFieldInputBase")
            && has_value(element)
    })
}

fn fingerprint_by_label(snapshot: &DomSnapshot) -> Option<&DomElement> {
    let label = snapshot
        .labels()
        .find(|label| label.text == "Fingerprint")?;
    let label_id = label.id()?;
    snapshot.elements.iter().find(|element| {
        element.is_tag("div")
            && element.attribute_is("aria-labelledby", label_id)
            && has_value(element)
    })
}

fn fingerprint_by_pattern(snapshot: &DomSnapshot) -> Option<&DomElement> {
    let pattern = fingerprint_pattern()?;
    snapshot
        .elements
        .iter()
        .find(|element| is_textbox(element) && pattern.is_match(&element.text))
}

fn tenancy_in_hidden_textarea(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.by_tag("textarea").find(|element| {
        element.attribute_is("aria-hidden", "true")
            && element_value(element).starts_with(TENANCY_OCID_PREFIX)
    })
}

fn tenancy_in_ocid_container(snapshot: &DomSnapshot) -> Option<&DomElement> {
    snapshot.by_tag("div").find(|element| {
        element
            .attribute("data-test-id")
            .is_some_and(|test_id| test_id.contains("ocid"))
            && element.text.starts_with(TENANCY_OCID_PREFIX)
    })
}
