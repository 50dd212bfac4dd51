//! The authoritative side of verification.
//!
//! A [`LicenseAuthority`] answers one question for a code and a machine:
//! may this machine use this code right now. Every answer carries a
//! [`ReasonCode`]; only [`ReasonCode::Ok`] is ever `allowed`.

use crate::device::HardwareFingerprint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a verification ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Verified.
    Ok,
    /// The store could not be reached.
    ConnectionError,
    /// No record for this code.
    CodeNotFound,
    /// The code has been banned.
    Banned,
    /// The code is bound to a different machine.
    DeviceMismatch,
    /// Past the expiry date plus grace.
    Expired,
    /// This machine has no usable fingerprint.
    UnknownDevice,
    /// The binding write failed.
    BindFailed,
    /// The store answered with an error.
    ServerError,
    /// The caller stopped waiting.
    Timeout,
    /// Verified, but the local cache could not be written.
    CacheWriteFailed,
}

impl ReasonCode {
    /// Human-readable message for the UI.
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::ConnectionError => "Unable to reach the verification server",
            Self::CodeNotFound => "Activation code does not exist",
            Self::Banned => "This activation code has been banned",
            Self::DeviceMismatch => "Activation failed: this code is bound to another device",
            Self::Expired => "Activation code has expired",
            Self::UnknownDevice => "Unable to identify device hardware",
            Self::BindFailed => "Device binding failed, please retry",
            Self::ServerError => "Verification server error",
            Self::Timeout => "Verification timed out",
            Self::CacheWriteFailed => "Failed to write license file",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of one remote verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verification {
    /// Authoritative expiry, when the record was found.
    pub expire_date: Option<NaiveDate>,
    /// Whether access is granted.
    pub allowed: bool,
    /// Outcome.
    pub reason: ReasonCode,
}

impl Verification {
    /// Access granted until `expire_date` plus grace.
    #[must_use]
    pub fn granted(expire_date: NaiveDate) -> Self {
        Self {
            expire_date: Some(expire_date),
            allowed: true,
            reason: ReasonCode::Ok,
        }
    }

    /// Access refused before an expiry date was known.
    #[must_use]
    pub fn denied(reason: ReasonCode) -> Self {
        Self {
            expire_date: None,
            allowed: false,
            reason,
        }
    }

    /// Access refused for a record whose expiry date is known.
    #[must_use]
    pub fn denied_at(reason: ReasonCode, expire_date: NaiveDate) -> Self {
        Self {
            expire_date: Some(expire_date),
            allowed: false,
            reason,
        }
    }
}

/// Queries and binds the authoritative license record.
///
/// `verify` blocks on I/O. Callers on an event loop must run it on a
/// blocking thread (see [`crate::LicenseService`]).
pub trait LicenseAuthority: Send + Sync {
    /// Checks `code` for this machine, binding it on first use.
    fn verify(&self, code: &str, fingerprint: &HardwareFingerprint) -> Verification;
}

/// Shortens a code for log output.
pub(crate) fn redact(code: &str) -> String {
    let visible: String = code.chars().take(3).collect();
    format!("{visible}***")
}
