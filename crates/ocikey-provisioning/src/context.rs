use std::fmt;

use ocikey_credential::is_canonical_fingerprint;
use thiserror::Error;

pub const USER_OCID_PREFIX: &str = "ocid1.user";
pub const TENANCY_OCID_PREFIX: &str = "ocid1.tenancy";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextField {
    Region,
    UserOcid,
    TenancyOcid,
    Fingerprint,
}

impl fmt::Display for ContextField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Region => "region",
            Self::UserOcid => "user_ocid",
            Self::TenancyOcid => "tenancy_ocid",
            Self::Fingerprint => "fingerprint",
        })
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("{0} was already recorded for this run")]
    AlreadySet(ContextField),
    #[error("rejected {field} value '{value}': {reason}")]
    Invalid {
        field: ContextField,
        value: String,
        reason: &'static str,
    },
    #[error("{0} is missing")]
    Missing(ContextField),
}

/// Cross-phase state of one run. Every field is write-once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningContext {
    login_detected: bool,
    region: Option<String>,
    user_ocid: Option<String>,
    tenancy_ocid: Option<String>,
    fingerprint: Option<String>,
}

/// Borrowed view of a context whose fields are all present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteContext<'a> {
    pub region: &'a str,
    pub user_ocid: &'a str,
    pub tenancy_ocid: &'a str,
    pub fingerprint: &'a str,
}

impl ProvisioningContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// One-shot latch: returns `true` only for the first call.
    pub fn latch_login(&mut self) -> bool {
        if self.login_detected {
            return false;
        }
        self.login_detected = true;
        true
    }

    pub fn login_detected(&self) -> bool {
        self.login_detected
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn user_ocid(&self) -> Option<&str> {
        self.user_ocid.as_deref()
    }

    pub fn tenancy_ocid(&self) -> Option<&str> {
        self.tenancy_ocid.as_deref()
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn set_region(&mut self, region: &str) -> Result<(), ContextError> {
        let region = region.trim();
        if region.is_empty() {
            return Err(invalid(ContextField::Region, region, "region is empty"));
        }
        write_once(&mut self.region, ContextField::Region, region)
    }

    pub fn set_user_ocid(&mut self, ocid: &str) -> Result<(), ContextError> {
        if !ocid.starts_with(USER_OCID_PREFIX) {
            return Err(invalid(
                ContextField::UserOcid,
                ocid,
                "expected an ocid1.user identifier",
            ));
        }
        write_once(&mut self.user_ocid, ContextField::UserOcid, ocid)
    }

    pub fn set_tenancy_ocid(&mut self, ocid: &str) -> Result<(), ContextError> {
        if !ocid.starts_with(TENANCY_OCID_PREFIX) {
            return Err(invalid(
                ContextField::TenancyOcid,
                ocid,
                "expected an ocid1.tenancy identifier",
            ));
        }
        write_once(&mut self.tenancy_ocid, ContextField::TenancyOcid, ocid)
    }

    pub fn set_fingerprint(&mut self, fingerprint: &str) -> Result<(), ContextError> {
        if !is_canonical_fingerprint(fingerprint) {
            return Err(invalid(
                ContextField::Fingerprint,
                fingerprint,
                "expected 16 lowercase hex pairs joined by ':'",
            ));
        }
        write_once(&mut self.fingerprint, ContextField::Fingerprint, fingerprint)
    }

    pub fn require_complete(&self) -> Result<CompleteContext<'_>, ContextError> {
        Ok(CompleteContext {
            region: self.region().ok_or(ContextError::Missing(ContextField::Region))?,
            user_ocid: self
                .user_ocid()
                .ok_or(ContextError::Missing(ContextField::UserOcid))?,
            tenancy_ocid: self
                .tenancy_ocid()
                .ok_or(ContextError::Missing(ContextField::TenancyOcid))?,
            fingerprint: self
                .fingerprint()
                .ok_or(ContextError::Missing(ContextField::Fingerprint))?,
        })
    }
}

fn write_once(
    slot: &mut Option<String>,
    field: ContextField,
    value: &str,
) -> Result<(), ContextError> {
    if slot.is_some() {
        return Err(ContextError::AlreadySet(field));
    }
    *slot = Some(value.to_string());
    Ok(())
}

fn invalid(field: ContextField, value: &str, reason: &'static str) -> ContextError {
    ContextError::Invalid {
        field,
        value: value.to_string(),
        reason,
    }
}
