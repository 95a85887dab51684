//! Settings surface orchestration
//!
//! A [`SettingsSession`] lives for one visit of the settings surface:
//!
//! 1. [`SettingsSession::open`] runs the credential challenge, then binds the
//!    two stores and bootstraps the replication link
//! 2. [`SettingsSession::on_start`] subscribes the link and reports a
//!    degraded armed state
//! 3. Edits and the toggle write to the Encrypted store and are mirrored
//!    synchronously
//! 4. [`SettingsSession::on_stop`] (or drop) unsubscribes the link

use crate::activation::{ActivationGate, ArmOutcome, ArmStatus, CapabilityKind, CapabilityManager};
use crate::credential::{CredentialGate, GrantBasis};
use crate::error::Result;
use crate::events::SubscriptionId;
use crate::replication::ReplicationLink;
use crate::schema::KeyguardType;
use crate::store::ConfigStore;
use duress_params::PlatformInfo;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Collaborators of a settings session
pub struct SessionDeps {
    /// Platform the process runs on
    pub platform: PlatformInfo,
    /// Encrypted store, the single source of truth
    pub prefs: Arc<ConfigStore>,
    /// BootAccessible store read by the watcher before unlock
    pub mirror: Arc<ConfigStore>,
    /// Watcher capability manager
    pub watcher: Arc<dyn CapabilityManager>,
    /// Admin capability manager
    pub admin: Arc<dyn CapabilityManager>,
}

/// Non-blocking notice for the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionWarning {
    /// Armed, but the watcher cannot act until `missing` is granted again
    ServiceUnavailable {
        /// First capability no longer granted
        missing: CapabilityKind,
    },
}

/// What the surface should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceAction {
    /// Keep showing the settings
    Continue,
    /// Close the settings surface
    Close,
}

/// Result of flipping the toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Now armed
    Armed,
    /// Now disarmed
    Disarmed,
    /// Arming refused; the toggle must show off and a grant was requested
    Reverted {
        /// Capability whose grant was requested
        missing: CapabilityKind,
    },
}

/// Values needed to render the settings surface
#[derive(Clone, PartialEq, Eq)]
pub struct SettingsSnapshot {
    /// Armed flag
    pub armed: bool,
    /// Trigger password or its length
    pub password_or_len: String,
    /// Embedded SIM wipe option
    pub wipe_embedded_sim: bool,
    /// Whether the embedded SIM option is shown at all
    pub wipe_embedded_sim_visible: bool,
    /// Keyguard variant
    pub keyguard_type: KeyguardType,
    /// Whether the prominent disclosure is still pending
    pub show_prominent_disclosure: bool,
}

impl fmt::Debug for SettingsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SettingsSnapshot")
            .field("armed", &self.armed)
            .field("password_or_len", &"__REDACTED__")
            .field("wipe_embedded_sim", &self.wipe_embedded_sim)
            .field("wipe_embedded_sim_visible", &self.wipe_embedded_sim_visible)
            .field("keyguard_type", &self.keyguard_type)
            .field("show_prominent_disclosure", &self.show_prominent_disclosure)
            .finish()
    }
}

/// One visit of the settings surface
pub struct SettingsSession {
    platform: PlatformInfo,
    prefs: Arc<ConfigStore>,
    link: Arc<ReplicationLink>,
    gate: ActivationGate,
    subscription: Option<SubscriptionId>,
}

impl SettingsSession {
    /// Challenge the user, then bind the stores
    ///
    /// A denied challenge returns [`crate::Error::CredentialDenied`]; the
    /// surface must close.
    pub async fn open(credential: &CredentialGate, deps: SessionDeps) -> Result<Self> {
        let basis = credential.challenge().await.into_result()?;
        Self::granted(basis, deps)
    }

    /// Like [`SettingsSession::open`], treating `cancel` as a denial
    pub async fn open_until<F>(
        credential: &CredentialGate,
        deps: SessionDeps,
        cancel: F,
    ) -> Result<Self>
    where
        F: Future<Output = ()>,
    {
        let basis = credential.challenge_until(cancel).await.into_result()?;
        Self::granted(basis, deps)
    }

    fn granted(basis: GrantBasis, deps: SessionDeps) -> Result<Self> {
        tracing::info!(?basis, "Settings access granted");
        Self::bind(deps)
    }

    /// Bind the stores without a challenge and bootstrap replication
    ///
    /// A failed bootstrap is logged; the Encrypted store stays usable.
    pub fn bind(deps: SessionDeps) -> Result<Self> {
        let link = Arc::new(ReplicationLink::new(&deps.prefs, &deps.mirror)?);

        match link.bootstrap() {
            Ok(report) if !report.is_complete() => {
                for (key, reason) in &report.failed {
                    tracing::warn!(key = %key, "Bootstrap replication failed: {}", reason);
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Bootstrap replication failed: {}", e),
        }

        let gate = ActivationGate::new(Arc::clone(&deps.prefs), deps.watcher, deps.admin);
        Ok(Self {
            platform: deps.platform,
            prefs: deps.prefs,
            link,
            gate,
            subscription: None,
        })
    }

    /// Surface became visible
    ///
    /// Subscribes the replication link and re-checks capabilities.
    pub fn on_start(&mut self) -> Option<SessionWarning> {
        if self.subscription.is_none() {
            let listener = Arc::clone(&self.link);
            self.subscription = Some(self.prefs.subscribe(listener));
        }

        match self.gate.status() {
            ArmStatus::Degraded { missing } => Some(SessionWarning::ServiceUnavailable { missing }),
            ArmStatus::Armed | ArmStatus::Disarmed => None,
        }
    }

    /// Surface went to the background
    pub fn on_stop(&mut self) {
        if let Some(id) = self.subscription.take() {
            self.prefs.unsubscribe(id);
            tracing::debug!("Replication link unsubscribed");
        }
    }

    /// Whether the replication link is subscribed
    pub fn is_active(&self) -> bool {
        self.subscription.is_some()
    }

    /// Current values
    pub fn snapshot(&self) -> SettingsSnapshot {
        SettingsSnapshot {
            armed: self.prefs.is_armed(),
            password_or_len: self.prefs.password_or_len(),
            wipe_embedded_sim: self.prefs.is_wipe_embedded_sim(),
            wipe_embedded_sim_visible: self.platform.supports_embedded_sim_wipe(),
            keyguard_type: self.prefs.keyguard_type(),
            show_prominent_disclosure: self.prefs.is_show_prominent_disclosure(),
        }
    }

    /// Whether the prominent disclosure must be shown first
    pub fn needs_prominent_disclosure(&self) -> bool {
        self.prefs.is_show_prominent_disclosure()
    }

    /// User accepted the prominent disclosure
    pub fn accept_disclosure(&self) -> Result<SurfaceAction> {
        self.prefs.set_show_prominent_disclosure(false)?;
        Ok(SurfaceAction::Continue)
    }

    /// User declined the prominent disclosure
    pub fn decline_disclosure(&self) -> SurfaceAction {
        SurfaceAction::Close
    }

    /// Set the trigger password or its length; surrounding whitespace is dropped
    pub fn set_password_or_len(&self, input: &str) -> Result<()> {
        self.prefs.set_password_or_len(input.trim())
    }

    /// Set the embedded SIM wipe option
    pub fn set_wipe_embedded_sim(&self, wipe: bool) -> Result<()> {
        self.prefs.set_wipe_embedded_sim(wipe)
    }

    /// Set the keyguard variant
    pub fn set_keyguard_type(&self, keyguard: KeyguardType) -> Result<()> {
        self.prefs.set_keyguard_type(keyguard)
    }

    /// Flip the toggle
    ///
    /// Turning it on requests a grant for the first missing capability and
    /// reports [`ToggleOutcome::Reverted`]. Call again once control returns.
    pub fn toggle(&self, on: bool) -> Result<ToggleOutcome> {
        if !on {
            self.gate.disarm()?;
            return Ok(ToggleOutcome::Disarmed);
        }

        match self.gate.try_arm()? {
            ArmOutcome::Armed => Ok(ToggleOutcome::Armed),
            ArmOutcome::MissingCapability(missing) => {
                // Grant requests are fire-and-forget; the refusal still stands
                if let Err(e) = self.gate.request_remediation(missing) {
                    tracing::warn!(capability = %missing, "Capability grant request failed: {}", e);
                }
                Ok(ToggleOutcome::Reverted { missing })
            }
        }
    }

    /// Activation gate of this session
    pub fn gate(&self) -> &ActivationGate {
        &self.gate
    }
}

impl Drop for SettingsSession {
    fn drop(&mut self) {
        self.on_stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::MockCapability;
    use duress_storage::{MemoryBackend, TierKind};

    struct Fixture {
        prefs: Arc<ConfigStore>,
        mirror: Arc<ConfigStore>,
        watcher: Arc<MockCapability>,
        admin: Arc<MockCapability>,
    }

    impl Fixture {
        fn new(granted: bool) -> Self {
            Self {
                prefs: Arc::new(ConfigStore::new(
                    TierKind::Encrypted,
                    Arc::new(MemoryBackend::new()),
                )),
                mirror: Arc::new(ConfigStore::new(
                    TierKind::BootAccessible,
                    Arc::new(MemoryBackend::new()),
                )),
                watcher: Arc::new(MockCapability::new(granted)),
                admin: Arc::new(MockCapability::new(granted)),
            }
        }

        fn deps(&self, sdk_level: u32) -> SessionDeps {
            SessionDeps {
                platform: PlatformInfo::new(sdk_level, true),
                prefs: self.prefs.clone(),
                mirror: self.mirror.clone(),
                watcher: self.watcher.clone(),
                admin: self.admin.clone(),
            }
        }
    }

    #[test]
    fn test_start_stop_manages_subscription() {
        let fx = Fixture::new(true);
        let mut session = SettingsSession::bind(fx.deps(30)).unwrap();
        assert!(!session.is_active());

        assert_eq!(session.on_start(), None);
        session.on_start();
        assert_eq!(fx.prefs.listener_count(), 1);

        session.on_stop();
        assert_eq!(fx.prefs.listener_count(), 0);

        session.on_start();
        drop(session);
        assert_eq!(fx.prefs.listener_count(), 0);
    }

    #[test]
    fn test_toggle_reverts_and_requests_grant() {
        let fx = Fixture::new(false);
        let mut session = SettingsSession::bind(fx.deps(30)).unwrap();
        session.on_start();

        assert_eq!(
            session.toggle(true).unwrap(),
            ToggleOutcome::Reverted {
                missing: CapabilityKind::Watcher
            }
        );
        assert_eq!(fx.watcher.grant_requests(), 1);
        assert_eq!(fx.admin.grant_requests(), 0);
        assert!(!session.snapshot().armed);

        fx.watcher.set_granted(true);
        fx.admin.set_granted(true);
        assert_eq!(session.toggle(true).unwrap(), ToggleOutcome::Armed);
        assert!(fx.mirror.is_armed());

        assert_eq!(session.toggle(false).unwrap(), ToggleOutcome::Disarmed);
        assert!(!fx.mirror.is_armed());
    }

    #[test]
    fn test_toggle_reverts_when_grant_request_fails() {
        let fx = Fixture::new(false);
        fx.watcher.set_fail_request(true);
        let session = SettingsSession::bind(fx.deps(30)).unwrap();

        assert_eq!(
            session.toggle(true).unwrap(),
            ToggleOutcome::Reverted {
                missing: CapabilityKind::Watcher
            }
        );
        assert_eq!(fx.watcher.grant_requests(), 1);
        assert!(!fx.prefs.is_armed());
    }

    #[test]
    fn test_degraded_warning_on_start() {
        let fx = Fixture::new(true);
        fx.prefs.set_armed(true).unwrap();
        fx.admin.set_granted(false);

        let mut session = SettingsSession::bind(fx.deps(30)).unwrap();
        assert_eq!(
            session.on_start(),
            Some(SessionWarning::ServiceUnavailable {
                missing: CapabilityKind::Admin
            })
        );
    }

    #[test]
    fn test_edits_and_snapshot() {
        let fx = Fixture::new(true);
        let mut session = SettingsSession::bind(fx.deps(27)).unwrap();
        session.on_start();

        session.set_password_or_len("  4  ").unwrap();
        session.set_keyguard_type(KeyguardType::B).unwrap();

        let snapshot = session.snapshot();
        assert_eq!(snapshot.password_or_len, "4");
        assert_eq!(snapshot.keyguard_type, KeyguardType::B);
        assert!(!snapshot.wipe_embedded_sim_visible);
        assert!(!format!("{:?}", snapshot).contains("\"4\""));
        assert_eq!(fx.mirror.password_or_len(), "4");
    }

    #[test]
    fn test_disclosure_flow() {
        let fx = Fixture::new(true);
        let mut session = SettingsSession::bind(fx.deps(30)).unwrap();
        session.on_start();

        assert!(session.needs_prominent_disclosure());
        assert_eq!(session.decline_disclosure(), SurfaceAction::Close);
        assert!(session.needs_prominent_disclosure());

        assert_eq!(session.accept_disclosure().unwrap(), SurfaceAction::Continue);
        assert!(!session.needs_prominent_disclosure());
        assert!(!fx.mirror.is_show_prominent_disclosure());
    }

    #[test]
    fn test_bind_rejects_swapped_tiers() {
        let fx = Fixture::new(true);
        let mut deps = fx.deps(30);
        std::mem::swap(&mut deps.prefs, &mut deps.mirror);
        assert!(matches!(
            SettingsSession::bind(deps),
            Err(crate::Error::Misconfigured(_))
        ));
    }
}
