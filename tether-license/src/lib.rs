//! Licensing and activation for Tether.
//!
//! This crate handles:
//! - Binding an activation code to one machine's hardware fingerprint
//! - Time-bounded entitlements with a 24-hour grace window
//! - An encrypted local cache trusted for 24 hours between online checks
//! - Re-verification against the authoritative store once the cache is stale
//!
//! # Design Principles
//!
//! - **Fail closed**: a stale cache that cannot be re-verified is rejected
//! - **Hard expiry dominates**: no cache freshness extends past expiry + grace
//! - **Bind once**: a code's device binding is a single conditional write and
//!   is never changed afterwards
//! - **Injected time**: every trust decision reads a [`Clock`]
//!
//! # Known limitation
//!
//! Expiry and freshness use the local wall clock. Rolling the clock back is
//! not detected.

mod authority;
mod cache;
mod clock;
mod config;
mod device;
mod error;
mod orchestrator;
mod record;
mod service;
mod store;
mod vault;

pub use authority::{LicenseAuthority, ReasonCode, Verification};
pub use cache::{CacheRead, LocalCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CredentialConfig, LicenseConfig, CACHE_FILE_NAME, DEFAULT_APP_NAME};
pub use device::{HardwareFingerprint, UNKNOWN_DEVICE};
pub use error::{LicenseError, LicenseResult};
pub use orchestrator::{ActivationOrchestrator, LicenseOutcome, LicenseState};
pub use record::{
    expiry_deadline, is_within_grace, remaining_days, LicenseRecord, LocalLicenseSnapshot,
    CACHE_FRESHNESS_SECS, GRACE_PERIOD_SECS,
};
pub use service::{ActivateResponse, CheckResponse, LicenseService};
pub use store::{LicenseStore, SqliteAuthority, LICENSE_SCHEMA};
pub use vault::CredentialVault;
