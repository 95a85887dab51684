//! Platform parameters and storage locations for the duress settings core
//!
//! This crate provides the platform version constants the settings core
//! branches on, the [`PlatformInfo`] snapshot handed over by the host, and
//! the resolution of the two storage directories backing the configuration
//! tiers.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod paths;
pub mod platform;

pub use paths::{StoragePaths, BOOT_DB_FILE, ENCRYPTED_DB_FILE, KEYSET_FILE};
pub use platform::{PlatformInfo, SDK_DIRECT_BOOT, SDK_EMBEDDED_SIM_WIPE};

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Storage path configuration could not be parsed
    #[error("Invalid storage configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// No usable storage directory could be determined
    #[error("No storage directory available: {0}")]
    NoStorageDir(String),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
