//! Storage directory resolution
//!
//! Precedence: host-supplied JSON > environment overrides > platform defaults.

use crate::platform::PlatformInfo;
use crate::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Database file of the encrypted tier
pub const ENCRYPTED_DB_FILE: &str = "sec_shared_prefs.db";

/// Sealed key material of the encrypted tier
pub const KEYSET_FILE: &str = "sec_shared_prefs.keyset";

/// Database file of the boot-accessible tier
pub const BOOT_DB_FILE: &str = "shared_prefs.db";

const DATA_DIR_ENV: &str = "DURESS_DATA_DIR";
const BOOT_DIR_ENV: &str = "DURESS_BOOT_DIR";

/// Directories backing the two configuration tiers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePaths {
    /// Credential-encrypted app data directory
    pub data_dir: PathBuf,
    /// Device-protected directory, readable before the user unlocks
    pub boot_dir: PathBuf,
}

impl StoragePaths {
    /// Build from explicit directories
    pub fn new(data_dir: impl Into<PathBuf>, boot_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            boot_dir: boot_dir.into(),
        }
    }

    /// Parse the JSON handed over by the host
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Resolve from the process environment and platform defaults
    pub fn resolve(platform: &PlatformInfo) -> Result<Self> {
        Self::resolve_with(platform, |key| std::env::var(key).ok())
    }

    /// Resolve using a custom environment lookup
    pub fn resolve_with(
        platform: &PlatformInfo,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let data_dir = match env(DATA_DIR_ENV).filter(|v| !v.trim().is_empty()) {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("com", "Ryosoftware", "Duress")
                .map(|dirs| dirs.data_local_dir().to_path_buf())
                .ok_or_else(|| Error::NoStorageDir("no home directory".to_string()))?,
        };

        // Without direct boot there is only one storage area.
        let boot_dir = if platform.supports_direct_boot() {
            match env(BOOT_DIR_ENV).filter(|v| !v.trim().is_empty()) {
                Some(dir) => PathBuf::from(dir),
                None => data_dir.join("device_protected"),
            }
        } else {
            data_dir.clone()
        };

        tracing::debug!(
            data_dir = %data_dir.display(),
            boot_dir = %boot_dir.display(),
            "resolved storage paths"
        );

        Ok(Self { data_dir, boot_dir })
    }

    /// Encrypted tier database
    pub fn encrypted_db(&self) -> PathBuf {
        self.data_dir.join(ENCRYPTED_DB_FILE)
    }

    /// Sealed key of the encrypted tier
    pub fn keyset(&self) -> PathBuf {
        self.data_dir.join(KEYSET_FILE)
    }

    /// Boot-accessible tier database
    pub fn boot_db(&self) -> PathBuf {
        self.boot_dir.join(BOOT_DB_FILE)
    }

    /// Create both directories if missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        create_dir(&self.data_dir)?;
        create_dir(&self.boot_dir)
    }
}

fn create_dir(dir: &Path) -> std::io::Result<()> {
    if !dir.exists() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
