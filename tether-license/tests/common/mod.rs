//! Shared test helpers for license tests.

#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tether_crypto::CacheKey;
use tether_license::{
    ActivationOrchestrator, Clock, CredentialConfig, CredentialVault, HardwareFingerprint,
    LicenseAuthority, LicenseRecord, LicenseStore, LocalCache, ManualClock, SqliteAuthority,
    Verification,
};

pub const FP_A: &str = "AA:BB:CC:DD:EE:FF";
pub const FP_B: &str = "11:22:33:44:55:66";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

/// A scratch directory holding a license store and a cache file, plus a
/// manual clock shared by everything built from it.
pub struct TestEnv {
    pub dir: TempDir,
    pub clock: Arc<ManualClock>,
    pub key: CacheKey,
}

impl TestEnv {
    pub fn new(now: DateTime<Utc>) -> Self {
        let env = Self {
            dir: tempfile::tempdir().unwrap(),
            clock: Arc::new(ManualClock::new(now)),
            key: CacheKey::random(),
        };
        // Creates the database file and schema.
        env.store();
        env
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("licenses.sqlite")
    }

    pub fn cache_path(&self) -> PathBuf {
        self.dir.path().join("profile").join("license.dat")
    }

    pub fn store(&self) -> LicenseStore {
        LicenseStore::open(self.db_path().to_str().unwrap()).unwrap()
    }

    pub fn insert(&self, code: &str, expire_date: NaiveDate) {
        self.store()
            .insert(&LicenseRecord::new(code, expire_date))
            .unwrap();
    }

    pub fn vault_for(dsn: &str) -> CredentialVault {
        CredentialVault::new(&CredentialConfig::conceal(dsn, b"test-obfuscation-key"))
    }

    pub fn authority(&self) -> SqliteAuthority {
        SqliteAuthority::new(
            Self::vault_for(self.db_path().to_str().unwrap()),
            self.clock.clone(),
            Duration::from_secs(5),
        )
    }

    pub fn cache(&self) -> LocalCache {
        LocalCache::new(self.cache_path(), self.key.clone())
    }

    pub fn orchestrator_with(
        &self,
        authority: Arc<dyn LicenseAuthority>,
        fingerprint: &str,
    ) -> ActivationOrchestrator {
        ActivationOrchestrator::new(
            authority,
            self.cache(),
            self.clock.clone(),
            HardwareFingerprint::from_raw(fingerprint),
        )
    }

    pub fn orchestrator(&self, fingerprint: &str) -> ActivationOrchestrator {
        self.orchestrator_with(Arc::new(self.authority()), fingerprint)
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Wraps an authority and counts how often it is asked.
pub struct CountingAuthority<A> {
    inner: A,
    calls: Arc<AtomicUsize>,
}

impl<A> CountingAuthority<A> {
    pub fn new(inner: A) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

impl<A: LicenseAuthority> LicenseAuthority for CountingAuthority<A> {
    fn verify(&self, code: &str, fingerprint: &HardwareFingerprint) -> Verification {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.verify(code, fingerprint)
    }
}

/// Always answers with the same verification.
pub struct FixedAuthority(pub Verification);

impl LicenseAuthority for FixedAuthority {
    fn verify(&self, _code: &str, _fingerprint: &HardwareFingerprint) -> Verification {
        self.0.clone()
    }
}
