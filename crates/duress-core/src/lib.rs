//! Settings core of the duress panic toggle
//!
//! This crate implements the configuration schema, the two-tier config
//! store with one-directional replication, and the gates that decide
//! whether the settings surface opens and whether the toggle may arm.
//!
//! Control flow of one settings visit:
//!
//! 1. [`CredentialGate`] challenges the user (a device with nothing
//!    enrolled is let through)
//! 2. [`SettingsSession`] binds the Encrypted and BootAccessible stores and
//!    bootstraps the [`ReplicationLink`]
//! 3. Edits go to the Encrypted [`ConfigStore`]; every write is mirrored
//!    to the BootAccessible tier before `set` returns
//! 4. Turning the toggle on consults the [`ActivationGate`]

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activation;
pub mod credential;
pub mod error;
pub mod events;
pub mod logging;
pub mod replication;
pub mod schema;
pub mod session;
pub mod store;

pub use activation::{
    ActivationGate, ActivationState, ArmOutcome, ArmStatus, CapabilityKind, CapabilityManager,
    MockCapability,
};
pub use credential::{
    Access, Authenticator, Availability, ChallengeOutcome, ChallengeProvider, CredentialGate,
    DenialCode, GrantBasis, MockBehavior, MockChallengeProvider, PromptConfig,
};
pub use error::{Error, ErrorCategory, Result};
pub use events::{ChangeBus, ChangeEvent, ChangeListener, SubscriptionId};
pub use logging::{init_logging, LogFormat};
pub use replication::{ReplicationLink, ReplicationReport};
pub use schema::{Field, KeyguardType, LegacyAlias, ReadSource};
pub use session::{
    SessionDeps, SessionWarning, SettingsSession, SettingsSnapshot, SurfaceAction, ToggleOutcome,
};
pub use store::ConfigStore;

pub use duress_params::{PlatformInfo, StoragePaths};
pub use duress_storage::{TierKind, Value, ValueKind};
