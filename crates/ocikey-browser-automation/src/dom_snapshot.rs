use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::page_query::PageQueryError;

/// Serialized view of the candidate elements of one document.
///
/// `<label>` elements are always included so label-association strategies can
/// run without a second round trip.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomSnapshot {
    #[serde(default)]
    pub frame_url: String,
    #[serde(default)]
    pub elements: Vec<DomElement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomElement {
    pub handle: String,
    pub tag: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    /// Trimmed `textContent`.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: Option<String>,
    /// Trimmed text of the enclosing `<label>` or of `label[for=id]`.
    #[serde(default)]
    pub label_text: Option<String>,
    /// `data-test-id` values of the ancestors, nearest first.
    #[serde(default)]
    pub ancestor_test_ids: Vec<String>,
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub checked: bool,
}

impl DomElement {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn attribute_is(&self, name: &str, expected: &str) -> bool {
        self.attribute(name) == Some(expected)
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").filter(|id| !id.is_empty())
    }

    pub fn class_contains(&self, fragment: &str) -> bool {
        self.attribute("class")
            .is_some_and(|class| class.contains(fragment))
    }

    pub fn is_tag(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    pub fn is_radio(&self) -> bool {
        self.is_tag("input") && self.attribute_is("type", "radio")
    }

    pub fn within_test_id(&self, test_id: &str) -> bool {
        self.ancestor_test_ids.iter().any(|id| id == test_id)
    }

    /// Value for form controls, text content otherwise.
    pub fn value_or_text(&self) -> &str {
        match self.value.as_deref() {
            Some(value) if !value.trim().is_empty() => value,
            _ => &self.text,
        }
    }
}

impl DomSnapshot {
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DomElement> + 'a {
        self.elements.iter().filter(move |element| element.is_tag(tag))
    }

    pub fn labels(&self) -> impl Iterator<Item = &DomElement> {
        self.by_tag("label")
    }

    pub fn radios(&self) -> impl Iterator<Item = &DomElement> {
        self.elements.iter().filter(|element| element.is_radio())
    }

    pub fn element_by_id(&self, id: &str) -> Option<&DomElement> {
        self.elements.iter().find(|element| element.id() == Some(id))
    }

    /// The element a `<label for=...>` points at, if it was captured.
    pub fn labelled_target(&self, label: &DomElement) -> Option<&DomElement> {
        label
            .attribute("for")
            .filter(|target| !target.is_empty())
            .and_then(|target| self.element_by_id(target))
    }
}

/// Decodes the driver's snapshot reply: one entry per evaluated document.
pub fn decode_snapshots(value: Value) -> Result<Vec<DomSnapshot>, PageQueryError> {
    serde_json::from_value(value)
        .map_err(|error| PageQueryError::MalformedResult(format!("dom snapshot: {error}")))
}

pub fn parse_dom_snapshot(raw: &str) -> Result<DomSnapshot, PageQueryError> {
    serde_json::from_str(raw)
        .map_err(|error| PageQueryError::MalformedResult(format!("dom snapshot: {error}")))
}
