//! License records, the local snapshot, and the grace-window arithmetic
//! shared by every expiry comparison.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Grace period in seconds (24 hours past the recorded expiry date).
pub const GRACE_PERIOD_SECS: i64 = 24 * 60 * 60;

/// How long a cached verification is trusted without going online.
pub const CACHE_FRESHNESS_SECS: i64 = 24 * 60 * 60;

/// Returns the last instant at which a license expiring on `expire_date`
/// is still usable: midnight UTC of that date plus the grace period.
#[must_use]
pub fn expiry_deadline(expire_date: NaiveDate) -> DateTime<Utc> {
    expire_date.and_time(NaiveTime::MIN).and_utc() + Duration::seconds(GRACE_PERIOD_SECS)
}

/// Returns true while `now` is at or before the grace deadline.
#[must_use]
pub fn is_within_grace(expire_date: NaiveDate, now: DateTime<Utc>) -> bool {
    now <= expiry_deadline(expire_date)
}

/// Whole days left until the grace deadline, never negative.
#[must_use]
pub fn remaining_days(expire_date: NaiveDate, now: DateTime<Utc>) -> i64 {
    (expiry_deadline(expire_date) - now).num_days().max(0)
}

/// The authoritative license row held by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseRecord {
    /// Activation code (primary key).
    pub code: String,
    /// Last day of the entitlement.
    pub expire_date: NaiveDate,
    /// Banned codes are refused regardless of expiry.
    pub is_banned: bool,
    /// Fingerprint this code is bound to. Once set it never changes.
    pub device_id: Option<String>,
}

impl LicenseRecord {
    /// Creates an unbound, unbanned record.
    #[must_use]
    pub fn new(code: impl Into<String>, expire_date: NaiveDate) -> Self {
        Self {
            code: code.into(),
            expire_date,
            is_banned: false,
            device_id: None,
        }
    }

    /// Returns true once a device has been bound.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.device_id.as_deref().is_some_and(|d| !d.is_empty())
    }
}

/// What the client remembers about its last successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalLicenseSnapshot {
    /// Activation code that was verified.
    pub code: String,
    /// Authoritative expiry date at the time of verification.
    pub expire_date: NaiveDate,
    /// When the store last confirmed this license.
    pub last_check: DateTime<Utc>,
}

impl LocalLicenseSnapshot {
    /// Creates a snapshot stamped at `last_check`.
    #[must_use]
    pub fn new(code: impl Into<String>, expire_date: NaiveDate, last_check: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            expire_date,
            last_check,
        }
    }

    /// Returns true if the entitlement is past its grace deadline.
    #[must_use]
    pub fn is_hard_expired(&self, now: DateTime<Utc>) -> bool {
        !is_within_grace(self.expire_date, now)
    }

    /// Returns true if the last online check is recent enough to trust.
    ///
    /// A `last_check` in the future (clock rolled back) counts as fresh.
    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.last_check < Duration::seconds(CACHE_FRESHNESS_SECS)
    }
}
