//! Tier key material
//!
//! The encrypted tier is keyed by a random 256-bit key. The key only lives
//! in memory inside [`Zeroizing`] buffers; on disk it exists solely in
//! sealed form (see [`crate::keystore`]).

use crate::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

/// Key length in bytes
pub const TIER_KEY_LEN: usize = 32;

/// Raw key for the encrypted tier
#[derive(Clone)]
pub struct TierKey {
    key: Zeroizing<[u8; TIER_KEY_LEN]>,
}

impl TierKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        let mut key = [0u8; TIER_KEY_LEN];
        OsRng.fill_bytes(&mut key);

        Self {
            key: Zeroizing::new(key),
        }
    }

    /// Create from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != TIER_KEY_LEN {
            return Err(Error::Encryption("Invalid key length".to_string()));
        }

        let mut key = [0u8; TIER_KEY_LEN];
        key.copy_from_slice(bytes);

        Ok(Self {
            key: Zeroizing::new(key),
        })
    }

    /// Get key bytes
    pub fn as_bytes(&self) -> &[u8; TIER_KEY_LEN] {
        &self.key
    }

    /// Raw-key literal for `PRAGMA key` (skips SQLCipher's passphrase KDF)
    pub(crate) fn pragma_literal(&self) -> Zeroizing<String> {
        Zeroizing::new(format!("\"x'{}'\"", hex::encode(self.key.as_slice())))
    }
}

impl std::fmt::Debug for TierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TierKey(__REDACTED__)")
    }
}
