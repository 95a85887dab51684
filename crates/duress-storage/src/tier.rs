//! Tier selection and opening

use crate::database::SqliteTier;
use crate::keystore::{load_or_create_tier_key, PlatformKeystore};
use crate::Result;
use duress_params::{PlatformInfo, StoragePaths};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trust tier of a configuration store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TierKind {
    /// Encryption-at-rest tier, authoritative once the user unlocks
    Encrypted,
    /// Plaintext tier in device-protected storage, readable at boot
    BootAccessible,
}

impl TierKind {
    /// Pick the tier a process should read given the platform state
    pub fn select(platform: &PlatformInfo) -> Self {
        if platform.encrypted_storage_available() {
            TierKind::Encrypted
        } else {
            TierKind::BootAccessible
        }
    }

    /// Short name used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            TierKind::Encrypted => "encrypted",
            TierKind::BootAccessible => "boot_accessible",
        }
    }
}

impl fmt::Display for TierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Open the database of `kind` under `paths`
///
/// The keystore is only consulted for the encrypted tier.
pub fn open_tier(
    kind: TierKind,
    paths: &StoragePaths,
    keystore: &dyn PlatformKeystore,
) -> Result<SqliteTier> {
    paths.ensure_dirs()?;
    match kind {
        TierKind::Encrypted => {
            let key = load_or_create_tier_key(keystore, &paths.keyset())?;
            SqliteTier::open_encrypted(paths.encrypted_db(), &key)
        }
        TierKind::BootAccessible => SqliteTier::open_plain(paths.boot_db()),
    }
}
