//! The activation decision engine.
//!
//! ```text
//!                 load()
//!   ┌──────────── Absent/Corrupt ──────────────► NoLicense
//!   │
//!   │  Found ──► past expiry + grace? ─ yes ───► Expired
//!   │                │ no
//!   │                ▼
//!   │          checked < 24h ago? ─── yes ─────► CachedValid
//!   │                │ no (CachedStale)
//!   │                ▼
//!   │          verify online ─ allowed ────────► VerifiedOnline (cache rewritten)
//!   │                        └ denied ─────────► Rejected (cache untouched)
//! ```
//!
//! The hard expiry check runs before the freshness check, so a freshly
//! refreshed cache never outlives its recorded expiry. A stale cache that
//! cannot be re-verified is rejected; there is no fallback to the cache.

use crate::authority::{redact, LicenseAuthority, ReasonCode, Verification};
use crate::cache::{CacheRead, LocalCache};
use crate::clock::{Clock, SystemClock};
use crate::config::LicenseConfig;
use crate::device::HardwareFingerprint;
use crate::error::LicenseResult;
use crate::record::{remaining_days, LocalLicenseSnapshot};
use crate::store::SqliteAuthority;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

const DISPLAY_DATE: &str = "%Y-%m-%d";

/// Where a license check ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LicenseState {
    /// No usable cache; the user has to activate.
    NoLicense,
    /// Recent cache trusted without going online.
    CachedValid,
    /// Cache too old; an online re-check is in progress.
    CachedStale,
    /// Confirmed by the store just now.
    VerifiedOnline,
    /// Past the recorded expiry plus grace.
    Expired,
    /// The store refused, or could not be asked.
    Rejected,
}

/// Result of a license check or activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseOutcome {
    /// Final state.
    pub state: LicenseState,
    /// Whether the application may be used.
    pub allowed: bool,
    /// Remote reason, when the store was involved.
    pub reason: Option<ReasonCode>,
    /// Text for the UI.
    pub message: String,
    /// Whole days left, when allowed.
    pub remaining_days: Option<i64>,
    /// Expiry date the decision was based on.
    pub expire_date: Option<NaiveDate>,
}

impl LicenseOutcome {
    pub(crate) fn denied(
        state: LicenseState,
        reason: Option<ReasonCode>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            state,
            allowed: false,
            reason,
            message: message.into(),
            remaining_days: None,
            expire_date: None,
        }
    }
}

/// Decides, once, whether a call may still write the cache.
///
/// The blocking side commits right before saving; a caller that stops
/// waiting cancels. Whichever happens first wins, so a call reported as
/// timed out never leaves a cache behind.
#[derive(Debug, Default)]
pub(crate) struct CommitGate {
    state: Mutex<GateState>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum GateState {
    #[default]
    Open,
    Committed,
    Cancelled,
}

impl CommitGate {
    /// Returns false if the call was already cancelled.
    pub(crate) fn try_commit(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            GateState::Open | GateState::Committed => {
                *state = GateState::Committed;
                true
            }
            GateState::Cancelled => false,
        }
    }

    /// Returns false if the call already committed.
    pub(crate) fn cancel(&self) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match *state {
            GateState::Open | GateState::Cancelled => {
                *state = GateState::Cancelled;
                true
            }
            GateState::Committed => false,
        }
    }
}

/// Decides whether this machine is licensed.
pub struct ActivationOrchestrator {
    authority: Arc<dyn LicenseAuthority>,
    cache: LocalCache,
    clock: Arc<dyn Clock>,
    fingerprint: HardwareFingerprint,
}

impl ActivationOrchestrator {
    /// Wires an orchestrator from its collaborators.
    #[must_use]
    pub fn new(
        authority: Arc<dyn LicenseAuthority>,
        cache: LocalCache,
        clock: Arc<dyn Clock>,
        fingerprint: HardwareFingerprint,
    ) -> Self {
        Self {
            authority,
            cache,
            clock,
            fingerprint,
        }
    }

    /// Builds the production orchestrator: SQLite store, system clock,
    /// this machine's fingerprint.
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let authority = Arc::new(SqliteAuthority::from_config(config, Arc::clone(&clock)));
        let cache = LocalCache::from_config(config)?;
        let fingerprint = HardwareFingerprint::collect();
        if fingerprint.is_unknown() {
            warn!("no hardware address found; online verification will be refused");
        }
        Ok(Self::new(authority, cache, clock, fingerprint))
    }

    /// This machine's fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> &HardwareFingerprint {
        &self.fingerprint
    }

    /// Checks the saved license at startup.
    pub fn startup_check(&self) -> LicenseOutcome {
        self.startup_check_gated(&CommitGate::default())
    }

    pub(crate) fn startup_check_gated(&self, gate: &CommitGate) -> LicenseOutcome {
        let snapshot = match self.cache.load() {
            CacheRead::Found(snapshot) => snapshot,
            CacheRead::Absent => {
                return LicenseOutcome::denied(
                    LicenseState::NoLicense,
                    None,
                    "Enter an activation code to activate",
                );
            }
            CacheRead::Corrupt(_) => {
                return LicenseOutcome::denied(
                    LicenseState::NoLicense,
                    None,
                    "License file is damaged, please activate again",
                );
            }
        };

        let now = self.clock.now();

        if snapshot.is_hard_expired(now) {
            info!(expire_date = %snapshot.expire_date, "cached license has expired");
            return LicenseOutcome {
                expire_date: Some(snapshot.expire_date),
                ..LicenseOutcome::denied(LicenseState::Expired, None, "License has expired")
            };
        }

        if snapshot.is_fresh(now) {
            let days = remaining_days(snapshot.expire_date, now);
            debug!(state = ?LicenseState::CachedValid, days, "trusting cached license");
            return LicenseOutcome {
                state: LicenseState::CachedValid,
                allowed: true,
                reason: None,
                message: format!(
                    "Activated (offline cache), valid until {} ({days} days left)",
                    snapshot.expire_date.format(DISPLAY_DATE)
                ),
                remaining_days: Some(days),
                expire_date: Some(snapshot.expire_date),
            };
        }

        debug!(state = ?LicenseState::CachedStale, "cache is stale, verifying online");
        let verification = self.verify_remote(&snapshot.code);
        let expire_date = match (verification.allowed, verification.expire_date) {
            (true, Some(date)) => date,
            _ => {
                let reason = if verification.allowed {
                    ReasonCode::ServerError
                } else {
                    verification.reason
                };
                info!(?reason, "online re-verification failed");
                return LicenseOutcome {
                    expire_date: verification.expire_date,
                    ..LicenseOutcome::denied(
                        LicenseState::Rejected,
                        Some(reason),
                        format!("Online verification failed: {}", reason.message()),
                    )
                };
            }
        };

        let now = self.clock.now();
        let refreshed = LocalLicenseSnapshot::new(snapshot.code, expire_date, now);
        if !gate.try_commit() {
            debug!("caller gave up; license cache not refreshed");
        } else if let Err(e) = self.cache.save(&refreshed) {
            warn!(error = %e, "verified online but could not refresh the license cache");
        }

        let days = remaining_days(expire_date, now);
        LicenseOutcome {
            state: LicenseState::VerifiedOnline,
            allowed: true,
            reason: Some(ReasonCode::Ok),
            message: format!(
                "Activated (verified online), valid until {} ({days} days left)",
                expire_date.format(DISPLAY_DATE)
            ),
            remaining_days: Some(days),
            expire_date: Some(expire_date),
        }
    }

    /// Activates `code` on this machine. Always goes online; never reads
    /// the cache. On failure an existing cache is left as it was.
    ///
    /// A timed-out activation may still have bound the code to this
    /// machine; activating again here succeeds.
    pub fn manual_activate(&self, code: &str) -> LicenseOutcome {
        self.manual_activate_gated(code, &CommitGate::default())
    }

    pub(crate) fn manual_activate_gated(&self, code: &str, gate: &CommitGate) -> LicenseOutcome {
        let code = code.trim();
        let verification = self.verify_remote(code);

        let expire_date = match (verification.allowed, verification.expire_date) {
            (true, Some(date)) => date,
            _ => {
                let reason = if verification.allowed {
                    ReasonCode::ServerError
                } else {
                    verification.reason
                };
                info!(code = %redact(code), ?reason, "activation refused");
                return LicenseOutcome {
                    expire_date: verification.expire_date,
                    ..LicenseOutcome::denied(LicenseState::Rejected, Some(reason), reason.message())
                };
            }
        };

        if !gate.try_commit() {
            info!(code = %redact(code), "caller gave up; activation not cached");
            let reason = ReasonCode::Timeout;
            return LicenseOutcome {
                expire_date: Some(expire_date),
                ..LicenseOutcome::denied(LicenseState::Rejected, Some(reason), reason.message())
            };
        }

        let now = self.clock.now();
        if let Err(e) = self
            .cache
            .save(&LocalLicenseSnapshot::new(code, expire_date, now))
        {
            warn!(error = %e, "activation succeeded but the license cache could not be written");
            let reason = ReasonCode::CacheWriteFailed;
            return LicenseOutcome {
                expire_date: Some(expire_date),
                ..LicenseOutcome::denied(LicenseState::Rejected, Some(reason), reason.message())
            };
        }

        info!(code = %redact(code), %expire_date, "activation succeeded");
        LicenseOutcome {
            state: LicenseState::VerifiedOnline,
            allowed: true,
            reason: Some(ReasonCode::Ok),
            message: format!(
                "Activation successful! Valid until: {}",
                expire_date.format(DISPLAY_DATE)
            ),
            remaining_days: Some(remaining_days(expire_date, now)),
            expire_date: Some(expire_date),
        }
    }

    fn verify_remote(&self, code: &str) -> Verification {
        if self.fingerprint.is_unknown() {
            return Verification::denied(ReasonCode::UnknownDevice);
        }
        self.authority.verify(code, &self.fingerprint)
    }
}
