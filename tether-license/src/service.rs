//! Async front of the orchestrator for UI event loops.
//!
//! Every call runs on tokio's blocking pool, so a slow store never stalls
//! the caller's thread. A single async mutex is held for the full length of
//! each blocking call, including after the caller has given up waiting, so
//! results complete one at a time and in order.
//!
//! A call that times out never writes the cache. If the blocking side has
//! already started writing when the deadline passes, the caller waits for
//! that write and gets the real result instead of a timeout.

use crate::authority::ReasonCode;
use crate::config::LicenseConfig;
use crate::device::HardwareFingerprint;
use crate::error::LicenseResult;
use crate::orchestrator::{ActivationOrchestrator, CommitGate, LicenseOutcome, LicenseState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{timeout_at, Instant};
use tracing::warn;

/// `checkLicense` reply for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Whether features may be unlocked.
    pub valid: bool,
    /// Text to show.
    pub msg: String,
    /// Whole days left, when valid.
    #[serde(rename = "remainingDays", default, skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<i64>,
}

impl From<&LicenseOutcome> for CheckResponse {
    fn from(outcome: &LicenseOutcome) -> Self {
        Self {
            valid: outcome.allowed,
            msg: outcome.message.clone(),
            remaining_days: outcome.remaining_days,
        }
    }
}

/// `activate` reply for the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivateResponse {
    /// Whether activation succeeded.
    pub success: bool,
    /// Text to show.
    pub msg: String,
    /// Whole days left, on success.
    #[serde(rename = "remainingDays", default, skip_serializing_if = "Option::is_none")]
    pub remaining_days: Option<i64>,
}

impl From<&LicenseOutcome> for ActivateResponse {
    fn from(outcome: &LicenseOutcome) -> Self {
        Self {
            success: outcome.allowed,
            msg: outcome.message.clone(),
            remaining_days: outcome.remaining_days,
        }
    }
}

/// Runs license checks off the caller's thread with a bounded wait.
pub struct LicenseService {
    orchestrator: Arc<ActivationOrchestrator>,
    gate: Arc<Mutex<()>>,
    timeout: Duration,
}

impl LicenseService {
    /// Wraps `orchestrator`; callers wait at most `timeout` per call.
    #[must_use]
    pub fn new(orchestrator: ActivationOrchestrator, timeout: Duration) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            gate: Arc::new(Mutex::new(())),
            timeout,
        }
    }

    /// Builds the production service described by `config`.
    pub fn from_config(config: &LicenseConfig) -> LicenseResult<Self> {
        Ok(Self::new(
            ActivationOrchestrator::from_config(config)?,
            config.verify_timeout(),
        ))
    }

    /// Fingerprint this service binds codes to.
    #[must_use]
    pub fn fingerprint(&self) -> &HardwareFingerprint {
        self.orchestrator.fingerprint()
    }

    /// Startup license check.
    pub async fn check_license(&self) -> LicenseOutcome {
        self.run(|orchestrator, commit| orchestrator.startup_check_gated(commit))
            .await
    }

    /// Manual activation with `code`.
    pub async fn activate(&self, code: String) -> LicenseOutcome {
        self.run(move |orchestrator, commit| {
            orchestrator.manual_activate_gated(&code, commit)
        })
        .await
    }

    async fn run<F>(&self, op: F) -> LicenseOutcome
    where
        F: FnOnce(&ActivationOrchestrator, &CommitGate) -> LicenseOutcome + Send + 'static,
    {
        let deadline = Instant::now() + self.timeout;

        let Ok(guard) = timeout_at(deadline, Arc::clone(&self.gate).lock_owned()).await else {
            return self.timed_out();
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let commit = Arc::new(CommitGate::default());
        let mut task = tokio::task::spawn_blocking({
            let commit = Arc::clone(&commit);
            move || {
                let _guard = guard;
                op(&orchestrator, &commit)
            }
        });

        let joined = match timeout_at(deadline, &mut task).await {
            Ok(joined) => joined,
            // Already writing the cache; its result is the real one.
            Err(_) if !commit.cancel() => task.await,
            Err(_) => return self.timed_out(),
        };

        joined.unwrap_or_else(|e| {
            warn!(error = %e, "license task failed");
            let reason = ReasonCode::ServerError;
            LicenseOutcome::denied(LicenseState::Rejected, Some(reason), reason.message())
        })
    }

    fn timed_out(&self) -> LicenseOutcome {
        warn!(timeout = ?self.timeout, "license check timed out");
        let reason = ReasonCode::Timeout;
        LicenseOutcome::denied(LicenseState::Rejected, Some(reason), reason.message())
    }
}
