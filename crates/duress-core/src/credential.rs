//! Credential challenge gating the settings surface
//!
//! One challenge per surface visit. A device with nothing enrolled (or no
//! challenge API at all) is let through: the challenge hardens access to
//! the settings, it is not their only protection. A denial or a
//! cancellation ends the visit.

use crate::error::{Error, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Authenticator class accepted by the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Authenticator {
    /// Class 3 biometric
    StrongBiometric,
    /// PIN, pattern or password
    DeviceCredential,
}

/// Challenge prompt configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Prompt title
    pub title: String,
    /// Require an explicit confirmation tap after a passive match
    pub require_confirmation: bool,
    /// Accepted authenticators
    pub allowed_authenticators: Vec<Authenticator>,
}

impl PromptConfig {
    /// Prompt used before showing the settings surface
    pub fn settings(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            require_confirmation: false,
            allowed_authenticators: vec![
                Authenticator::StrongBiometric,
                Authenticator::DeviceCredential,
            ],
        }
    }
}

/// Whether the device can run the challenge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Ready
    Available,
    /// Hardware present, nothing enrolled
    NoneEnrolled,
    /// No suitable hardware
    NoHardware,
    /// Platform API absent
    Unsupported,
}

/// Why a challenge was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialCode {
    /// User dismissed the prompt
    UserCanceled,
    /// User pressed the negative button
    NegativeButton,
    /// Too many attempts, temporary
    Lockout,
    /// Too many attempts, until credential unlock
    LockoutPermanent,
    /// Prompt timed out
    Timeout,
    /// Any other platform error code
    Platform(i32),
}

impl fmt::Display for DenialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialCode::UserCanceled => write!(f, "canceled by user"),
            DenialCode::NegativeButton => write!(f, "negative button"),
            DenialCode::Lockout => write!(f, "lockout"),
            DenialCode::LockoutPermanent => write!(f, "permanent lockout"),
            DenialCode::Timeout => write!(f, "timeout"),
            DenialCode::Platform(code) => write!(f, "platform error {}", code),
        }
    }
}

/// Raw provider result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeOutcome {
    /// Credential matched
    Granted,
    /// Explicit failure or cancellation
    Denied(DenialCode),
    /// Nothing to challenge with
    Unavailable,
}

/// Platform credential challenge
#[async_trait]
pub trait ChallengeProvider: Send + Sync {
    /// Whether any of `authenticators` can be used right now
    fn availability(&self, authenticators: &[Authenticator]) -> Availability;

    /// Show the prompt and wait for the user
    ///
    /// An `Err` means the prompt could not be shown at all.
    async fn authenticate(&self, prompt: &PromptConfig) -> Result<ChallengeOutcome>;
}

/// Why access was granted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantBasis {
    /// The user passed the challenge
    Authenticated,
    /// Nothing enrolled or no challenge API
    ChallengeUnavailable,
    /// The provider failed before prompting
    ChallengeFailedToStart,
}

/// Gate decision for one surface visit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Show the settings surface
    Granted(GrantBasis),
    /// Close the settings surface
    Denied(DenialCode),
}

impl Access {
    /// Whether the surface may open
    pub fn is_granted(&self) -> bool {
        matches!(self, Access::Granted(_))
    }

    /// Convert to a `Result`; denial becomes [`Error::CredentialDenied`]
    pub fn into_result(self) -> Result<GrantBasis> {
        match self {
            Access::Granted(basis) => Ok(basis),
            Access::Denied(code) => Err(Error::CredentialDenied(code)),
        }
    }
}

/// One-shot challenge in front of the settings surface
pub struct CredentialGate {
    provider: Arc<dyn ChallengeProvider>,
    prompt: PromptConfig,
}

impl CredentialGate {
    /// Create a gate using `prompt`
    pub fn new(provider: Arc<dyn ChallengeProvider>, prompt: PromptConfig) -> Self {
        Self { provider, prompt }
    }

    /// Prompt in use
    pub fn prompt(&self) -> &PromptConfig {
        &self.prompt
    }

    /// Run the challenge
    pub async fn challenge(&self) -> Access {
        let availability = self
            .provider
            .availability(&self.prompt.allowed_authenticators);
        if availability != Availability::Available {
            tracing::info!(?availability, "Credential challenge unavailable, skipping");
            return Access::Granted(GrantBasis::ChallengeUnavailable);
        }

        match self.provider.authenticate(&self.prompt).await {
            Ok(ChallengeOutcome::Granted) => {
                tracing::info!("Credential challenge passed");
                Access::Granted(GrantBasis::Authenticated)
            }
            Ok(ChallengeOutcome::Denied(code)) => {
                tracing::info!(%code, "Credential challenge denied");
                Access::Denied(code)
            }
            Ok(ChallengeOutcome::Unavailable) => {
                tracing::info!("Credential challenge unavailable, skipping");
                Access::Granted(GrantBasis::ChallengeUnavailable)
            }
            Err(e) => {
                // A provider that cannot prompt is treated like one with nothing enrolled
                tracing::warn!("Credential challenge failed to start, skipping: {}", e);
                Access::Granted(GrantBasis::ChallengeFailedToStart)
            }
        }
    }

    /// Run the challenge until `cancel` resolves
    ///
    /// Cancellation is a denial.
    pub async fn challenge_until<F>(&self, cancel: F) -> Access
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            access = self.challenge() => access,
            _ = cancel => {
                tracing::info!("Credential challenge cancelled");
                Access::Denied(DenialCode::UserCanceled)
            }
        }
    }
}

/// Scripted provider behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockBehavior {
    /// Resolve with this outcome
    Outcome(ChallengeOutcome),
    /// Fail before prompting
    FailToStart,
    /// Never resolve
    NeverCompletes,
}

/// Challenge provider for tests and hosts without a platform prompt
pub struct MockChallengeProvider {
    availability: Availability,
    behavior: MockBehavior,
    prompts: AtomicUsize,
    last_prompt: Mutex<Option<PromptConfig>>,
}

impl MockChallengeProvider {
    /// Create a provider with fixed availability and behavior
    pub fn new(availability: Availability, behavior: MockBehavior) -> Self {
        Self {
            availability,
            behavior,
            prompts: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
        }
    }

    /// Available provider resolving with `outcome`
    pub fn with_outcome(outcome: ChallengeOutcome) -> Self {
        Self::new(Availability::Available, MockBehavior::Outcome(outcome))
    }

    /// Number of prompts shown
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Last prompt shown
    pub fn last_prompt(&self) -> Option<PromptConfig> {
        self.last_prompt.lock().clone()
    }
}

#[async_trait]
impl ChallengeProvider for MockChallengeProvider {
    fn availability(&self, _authenticators: &[Authenticator]) -> Availability {
        self.availability
    }

    async fn authenticate(&self, prompt: &PromptConfig) -> Result<ChallengeOutcome> {
        if self.behavior == MockBehavior::FailToStart {
            return Err(Error::Challenge("prompt could not be shown".to_string()));
        }
        self.prompts.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock() = Some(prompt.clone());

        match self.behavior {
            MockBehavior::Outcome(outcome) => Ok(outcome),
            _ => std::future::pending().await,
        }
    }
}
