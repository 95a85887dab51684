//! Activation gating
//!
//! Arming requires the watcher capability and the admin capability to be
//! granted at the same instant. The gate checks them in a fixed order
//! (watcher first) and never polls or retries: callers request
//! remediation for the first missing capability and call
//! [`ActivationGate::try_arm`] again when control returns to them.

use crate::error::{Error, Result};
use crate::store::ConfigStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Platform capability required for arming
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityKind {
    /// Registration of the unlock-attempt watcher
    Watcher,
    /// Device administrator rights
    Admin,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapabilityKind::Watcher => write!(f, "watcher"),
            CapabilityKind::Admin => write!(f, "admin"),
        }
    }
}

/// External manager of one platform capability
///
/// `request_grant` is fire-and-forget: it opens a platform surface and the
/// result is only observed through a later `is_granted`.
pub trait CapabilityManager: Send + Sync {
    /// Whether the capability is currently granted
    fn is_granted(&self) -> bool;

    /// Ask the platform to grant the capability
    fn request_grant(&self) -> Result<()>;

    /// Give the capability back; may be refused by the platform
    fn revoke(&self) -> Result<()>;
}

/// Derived gate state, computed on demand
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationState {
    /// Armed flag as stored
    pub armed: bool,
    /// Watcher capability granted
    pub watcher_granted: bool,
    /// Admin capability granted
    pub admin_granted: bool,
}

impl ActivationState {
    /// First capability that is not granted, watcher before admin
    pub fn first_missing(&self) -> Option<CapabilityKind> {
        if !self.watcher_granted {
            Some(CapabilityKind::Watcher)
        } else if !self.admin_granted {
            Some(CapabilityKind::Admin)
        } else {
            None
        }
    }
}

/// Result of [`ActivationGate::try_arm`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    /// Armed flag is set
    Armed,
    /// Arming refused; remediate this capability
    MissingCapability(CapabilityKind),
}

impl ArmOutcome {
    /// Convert to a `Result` for callers that propagate with `?`
    pub fn into_result(self) -> Result<()> {
        match self {
            ArmOutcome::Armed => Ok(()),
            ArmOutcome::MissingCapability(kind) => Err(Error::MissingCapability(kind)),
        }
    }
}

/// Armed status as observed when the settings surface resumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmStatus {
    /// Not armed
    Disarmed,
    /// Armed with both capabilities still granted
    Armed,
    /// Armed, but a capability was revoked out of band
    Degraded {
        /// First capability no longer granted
        missing: CapabilityKind,
    },
}

/// Arming state machine over the armed flag and two capabilities
pub struct ActivationGate {
    store: Arc<ConfigStore>,
    watcher: Arc<dyn CapabilityManager>,
    admin: Arc<dyn CapabilityManager>,
}

impl ActivationGate {
    /// Create a gate over `store`'s armed flag
    pub fn new(
        store: Arc<ConfigStore>,
        watcher: Arc<dyn CapabilityManager>,
        admin: Arc<dyn CapabilityManager>,
    ) -> Self {
        Self {
            store,
            watcher,
            admin,
        }
    }

    /// Snapshot the current state
    pub fn state(&self) -> ActivationState {
        ActivationState {
            armed: self.store.is_armed(),
            watcher_granted: self.watcher.is_granted(),
            admin_granted: self.admin.is_granted(),
        }
    }

    /// Arm if both capabilities are granted
    pub fn try_arm(&self) -> Result<ArmOutcome> {
        let state = self.state();
        if state.armed {
            tracing::debug!("Already armed");
            return Ok(ArmOutcome::Armed);
        }
        if let Some(missing) = state.first_missing() {
            tracing::info!(capability = %missing, "Arming refused, capability missing");
            return Ok(ArmOutcome::MissingCapability(missing));
        }

        self.store.set_armed(true)?;
        tracing::info!("Armed");
        Ok(ArmOutcome::Armed)
    }

    /// Clear the armed flag and give back the admin capability
    ///
    /// Revocation is requested even when the flag write fails. A refused
    /// revocation is logged and swallowed; only a failure to write the
    /// flag is returned.
    pub fn disarm(&self) -> Result<()> {
        let written = self.store.set_armed(false);
        match &written {
            Ok(()) => tracing::info!("Disarmed"),
            Err(e) => tracing::error!("Failed to clear armed flag: {}", e),
        }

        if let Err(e) = self.admin.revoke() {
            tracing::warn!("Admin capability revocation failed: {}", e);
        }
        written
    }

    /// Ask the platform to grant `kind`
    pub fn request_remediation(&self, kind: CapabilityKind) -> Result<()> {
        tracing::info!(capability = %kind, "Requesting capability grant");
        match kind {
            CapabilityKind::Watcher => self.watcher.request_grant(),
            CapabilityKind::Admin => self.admin.request_grant(),
        }
    }

    /// Current armed status
    pub fn status(&self) -> ArmStatus {
        let state = self.state();
        if !state.armed {
            return ArmStatus::Disarmed;
        }
        match state.first_missing() {
            Some(missing) => {
                tracing::warn!(capability = %missing, "Armed but capability no longer granted");
                ArmStatus::Degraded { missing }
            }
            None => ArmStatus::Armed,
        }
    }
}

/// In-memory capability manager for tests and hosts without the platform
#[derive(Debug, Default)]
pub struct MockCapability {
    granted: AtomicBool,
    fail_revoke: AtomicBool,
    fail_request: AtomicBool,
    grant_on_request: AtomicBool,
    grant_requests: AtomicUsize,
    revocations: AtomicUsize,
}

impl MockCapability {
    /// Create a manager with the given grant state
    pub fn new(granted: bool) -> Self {
        let mock = Self::default();
        mock.granted.store(granted, Ordering::SeqCst);
        mock
    }

    /// Change the grant state, as if the user acted out of band
    pub fn set_granted(&self, granted: bool) {
        self.granted.store(granted, Ordering::SeqCst);
    }

    /// Make `revoke` fail, as a platform refusing revocation would
    pub fn set_fail_revoke(&self, fail: bool) {
        self.fail_revoke.store(fail, Ordering::SeqCst);
    }

    /// Make `request_grant` fail, as a missing platform settings screen would
    pub fn set_fail_request(&self, fail: bool) {
        self.fail_request.store(fail, Ordering::SeqCst);
    }

    /// Make `request_grant` grant immediately
    pub fn set_grant_on_request(&self, grant: bool) {
        self.grant_on_request.store(grant, Ordering::SeqCst);
    }

    /// Number of `request_grant` calls
    pub fn grant_requests(&self) -> usize {
        self.grant_requests.load(Ordering::SeqCst)
    }

    /// Number of `revoke` calls, failed ones included
    pub fn revocations(&self) -> usize {
        self.revocations.load(Ordering::SeqCst)
    }
}

impl CapabilityManager for MockCapability {
    fn is_granted(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    fn request_grant(&self) -> Result<()> {
        self.grant_requests.fetch_add(1, Ordering::SeqCst);
        if self.fail_request.load(Ordering::SeqCst) {
            return Err(Error::Capability("settings screen unavailable".to_string()));
        }
        if self.grant_on_request.load(Ordering::SeqCst) {
            self.granted.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn revoke(&self) -> Result<()> {
        self.revocations.fetch_add(1, Ordering::SeqCst);
        if self.fail_revoke.load(Ordering::SeqCst) {
            return Err(Error::Capability("revocation refused".to_string()));
        }
        self.granted.store(false, Ordering::SeqCst);
        Ok(())
    }
}
