//! Platform version gates

use serde::{Deserialize, Serialize};

/// First SDK level with device-protected (direct boot) storage.
pub const SDK_DIRECT_BOOT: u32 = 24;

/// First SDK level that can wipe an embedded SIM.
pub const SDK_EMBEDDED_SIM_WIPE: u32 = 28;

/// Snapshot of the platform state relevant to tier selection
///
/// Supplied by the host at process start. The unlock state is only sampled
/// once: a store opened while the user was locked keeps its tier even after
/// the user unlocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// OS SDK level
    pub sdk_level: u32,
    /// Whether credential-encrypted storage is unlocked
    pub user_unlocked: bool,
}

impl PlatformInfo {
    /// Create a platform snapshot
    pub const fn new(sdk_level: u32, user_unlocked: bool) -> Self {
        Self {
            sdk_level,
            user_unlocked,
        }
    }

    /// Whether the OS has a separate boot-accessible storage area
    pub fn supports_direct_boot(&self) -> bool {
        self.sdk_level >= SDK_DIRECT_BOOT
    }

    /// Whether the embedded SIM wipe option applies on this OS
    pub fn supports_embedded_sim_wipe(&self) -> bool {
        self.sdk_level >= SDK_EMBEDDED_SIM_WIPE
    }

    /// Whether the encrypted tier is readable right now
    ///
    /// Without direct boot support there is no locked phase in which the
    /// app runs, so the encrypted tier is always considered readable.
    pub fn encrypted_storage_available(&self) -> bool {
        !self.supports_direct_boot() || self.user_unlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_boot_gate() {
        assert!(!PlatformInfo::new(23, true).supports_direct_boot());
        assert!(PlatformInfo::new(24, true).supports_direct_boot());
    }

    #[test]
    fn test_encrypted_storage_available() {
        // Locked, but the OS predates direct boot
        assert!(PlatformInfo::new(23, false).encrypted_storage_available());
        assert!(PlatformInfo::new(30, true).encrypted_storage_available());
        assert!(!PlatformInfo::new(30, false).encrypted_storage_available());
    }

    #[test]
    fn test_embedded_sim_gate() {
        assert!(!PlatformInfo::new(27, true).supports_embedded_sim_wipe());
        assert!(PlatformInfo::new(28, true).supports_embedded_sim_wipe());
    }
}
