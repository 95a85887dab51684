//! Platform keystore integration for tier key sealing
//!
//! The encrypted tier's key is wrapped by a key that never leaves the
//! platform keystore (Android Keystore, Keychain, ...). Only the sealed
//! blob is written next to the database, as the keyset file.
//!
//! Keyset file format: `[version(1)][sealed key(variable)]`

use crate::security::TierKey;
use crate::{Error, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::path::Path;
use zeroize::Zeroizing;

/// Keystore alias of the wrapping key for the encrypted tier
pub const TIER_KEY_ALIAS: &str = "duress_tier_master_key";

const KEYSET_VERSION: u8 = 1;
const NONCE_LEN: usize = 12;

/// Platform keystore abstraction
///
/// Implementations bridge to native code. Wrapping keys are created on
/// first use of an alias and never exported.
pub trait PlatformKeystore: Send + Sync {
    /// Encrypt `plaintext` under the wrapping key `alias`
    fn seal(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt a blob produced by [`PlatformKeystore::seal`]
    fn unseal(&self, alias: &str, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>>;
}

/// Load the tier key from `keyset_path`, creating and sealing a fresh one
/// if the file does not exist yet
pub fn load_or_create_tier_key(
    keystore: &dyn PlatformKeystore,
    keyset_path: &Path,
) -> Result<TierKey> {
    if keyset_path.exists() {
        let data = std::fs::read(keyset_path)?;
        let Some((&version, sealed)) = data.split_first() else {
            return Err(Error::Keystore("Keyset file is empty".to_string()));
        };
        if version != KEYSET_VERSION {
            return Err(Error::Keystore(format!(
                "Unsupported keyset version: {}",
                version
            )));
        }
        let raw = keystore.unseal(TIER_KEY_ALIAS, sealed)?;
        tracing::debug!("Tier key unsealed from keyset");
        return TierKey::from_bytes(&raw);
    }

    let key = TierKey::generate();
    let sealed = keystore.seal(TIER_KEY_ALIAS, key.as_bytes())?;

    let mut data = Vec::with_capacity(1 + sealed.len());
    data.push(KEYSET_VERSION);
    data.extend_from_slice(&sealed);

    if let Some(parent) = keyset_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(keyset_path, &data)?;

    tracing::info!("Generated and sealed new tier key");
    Ok(key)
}

/// In-process keystore for testing and platforms without native integration
///
/// Wrapping keys live only as long as this value, so keysets sealed by one
/// instance cannot be opened by another.
#[derive(Default)]
pub struct MockKeystore {
    keys: RwLock<HashMap<String, Zeroizing<[u8; 32]>>>,
}

impl MockKeystore {
    /// Create an empty keystore
    pub fn new() -> Self {
        Self::default()
    }

    fn cipher(&self, alias: &str, create: bool) -> Result<ChaCha20Poly1305> {
        if let Some(key) = self.keys.read().get(alias) {
            return Ok(ChaCha20Poly1305::new(Key::from_slice(key.as_slice())));
        }
        if !create {
            return Err(Error::Keystore(format!("Unknown key alias: {}", alias)));
        }

        let mut keys = self.keys.write();
        let key = keys.entry(alias.to_string()).or_insert_with(|| {
            let mut bytes = [0u8; 32];
            OsRng.fill_bytes(&mut bytes);
            Zeroizing::new(bytes)
        });
        Ok(ChaCha20Poly1305::new(Key::from_slice(key.as_slice())))
    }
}

impl PlatformKeystore for MockKeystore {
    fn seal(&self, alias: &str, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = self.cipher(alias, true)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| Error::Keystore(e.to_string()))?;

        // Format: [nonce(12)][ciphertext(variable)]
        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn unseal(&self, alias: &str, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if sealed.len() < NONCE_LEN {
            return Err(Error::Keystore("Invalid sealed key length".to_string()));
        }
        let cipher = self.cipher(alias, false)?;
        let (nonce, ciphertext) = sealed.split_at(NONCE_LEN);

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map(Zeroizing::new)
            .map_err(|e| Error::Keystore(e.to_string()))
    }
}
