//! Tiered key-value storage for the duress settings core
//!
//! Each configuration tier is a small typed key-value table behind the
//! [`TierBackend`] capability interface. Two tiers exist at runtime:
//!
//! - **Encrypted**: SQLCipher page encryption, key sealed by the platform keystore
//! - **BootAccessible**: plain SQLite in device-protected storage, readable
//!   before the user unlocks
//!
//! Values are tagged booleans, integers or strings. Rows written by other
//! app versions with any other tag are surfaced as
//! [`StoredValue::Unrecognized`] and never decoded.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod database;
pub mod error;
pub mod keystore;
pub mod migrations;
pub mod security;
pub mod tier;
pub mod value;

pub use backend::{Entry, MemoryBackend, TierBackend};
pub use database::SqliteTier;
pub use error::{Error, Result};
pub use keystore::{load_or_create_tier_key, MockKeystore, PlatformKeystore, TIER_KEY_ALIAS};
pub use security::TierKey;
pub use tier::{open_tier, TierKind};
pub use value::{StoredValue, Value, ValueKind};
