//! Error types for the settings core
//!
//! Only [`Error::MissingCapability`] and [`Error::CredentialDenied`] are
//! decisions for the UI layer to react to. Everything else is either a
//! programming error or absorbed internally.

use crate::activation::CapabilityKind;
use crate::credential::DenialCode;
use crate::schema::Field;
use duress_storage::ValueKind;
use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Settings core errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Value tag does not match the field's declared type
    #[error("Invalid type for field {field}: expected {expected}, got {actual}")]
    InvalidFieldType {
        /// Field being written
        field: Field,
        /// Declared type
        expected: ValueKind,
        /// Supplied type
        actual: ValueKind,
    },

    /// Value has the declared tag but lies outside the field's domain
    #[error("Value out of range for field {field}")]
    OutOfRange {
        /// Field being written
        field: Field,
    },

    /// Mirroring to the boot-accessible tier failed
    #[error("Replication error: {0}")]
    Replication(String),

    /// Arming refused until the capability is granted
    #[error("Missing capability: {0}")]
    MissingCapability(CapabilityKind),

    /// Credential challenge denied or cancelled
    #[error("Credential denied: {0}")]
    CredentialDenied(DenialCode),

    /// Capability manager failure
    #[error("Capability error: {0}")]
    Capability(String),

    /// Challenge provider failure
    #[error("Challenge error: {0}")]
    Challenge(String),

    /// Components wired together incorrectly
    #[error("Misconfigured: {0}")]
    Misconfigured(String),

    /// Storage error
    #[error(transparent)]
    Storage(#[from] duress_storage::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if the UI layer is expected to react to this error
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Error::MissingCapability(_) | Error::CredentialDenied(_)
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::InvalidFieldType { .. } | Error::OutOfRange { .. } => ErrorCategory::Schema,
            Error::Replication(_) => ErrorCategory::Replication,
            Error::MissingCapability(_) | Error::Capability(_) => ErrorCategory::Activation,
            Error::CredentialDenied(_) | Error::Challenge(_) => ErrorCategory::Credential,
            Error::Storage(_) => ErrorCategory::Storage,
            Error::Misconfigured(_) | Error::Other(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Field type errors
    Schema,
    /// Tier mirroring errors
    Replication,
    /// Capability and arming errors
    Activation,
    /// Credential challenge errors
    Credential,
    /// Storage errors
    Storage,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Schema => write!(f, "Schema"),
            ErrorCategory::Replication => write!(f, "Replication"),
            ErrorCategory::Activation => write!(f, "Activation"),
            ErrorCategory::Credential => write!(f, "Credential"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_facing_detection() {
        assert!(Error::MissingCapability(CapabilityKind::Watcher).is_user_facing());
        assert!(Error::CredentialDenied(DenialCode::UserCanceled).is_user_facing());
        assert!(!Error::Replication("disk full".to_string()).is_user_facing());
        assert!(!Error::InvalidFieldType {
            field: Field::Armed,
            expected: ValueKind::Bool,
            actual: ValueKind::Int,
        }
        .is_user_facing());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::MissingCapability(CapabilityKind::Admin).category(),
            ErrorCategory::Activation
        );
        assert_eq!(
            Error::Replication("test".to_string()).category(),
            ErrorCategory::Replication
        );
        assert_eq!(
            Error::Storage(duress_storage::Error::Storage("test".to_string())).category(),
            ErrorCategory::Storage
        );
    }

    #[test]
    fn test_messages_name_the_field() {
        let err = Error::InvalidFieldType {
            field: Field::PasswordOrLength,
            expected: ValueKind::Str,
            actual: ValueKind::Int,
        };
        assert_eq!(
            err.to_string(),
            "Invalid type for field password_or_len: expected string, got int"
        );
        assert_eq!(ErrorCategory::Credential.to_string(), "Credential");
    }

    #[test]
    fn test_storage_message_not_prefixed_twice() {
        let err = Error::from(duress_storage::Error::Storage("read-only".to_string()));
        assert_eq!(err.to_string(), "Storage error: read-only");
        assert_eq!(
            Error::OutOfRange {
                field: Field::KeyguardType
            }
            .to_string(),
            "Value out of range for field keyguard_type"
        );
        assert!(!Error::Misconfigured("wiring".to_string()).is_user_facing());
        assert_eq!(
            Error::Misconfigured("wiring".to_string()).category(),
            ErrorCategory::Internal
        );
    }
}
