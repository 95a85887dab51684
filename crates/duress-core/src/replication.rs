//! One-directional mirroring from the Encrypted tier to the BootAccessible tier
//!
//! The link holds the two tier backends, never the stores, so a store can
//! own a subscription to its link without a reference cycle. Failures are
//! best-effort: the source write that triggered mirroring has already
//! committed and is never rolled back.

use crate::error::{Error, Result};
use crate::events::{ChangeEvent, ChangeListener};
use crate::store::ConfigStore;
use duress_storage::{StoredValue, TierBackend, TierKind, Value};
use std::sync::Arc;

/// Outcome of one replication pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplicationReport {
    /// Keys written to the destination
    pub copied: Vec<String>,
    /// Keys whose stored type is not recognized
    pub skipped: Vec<String>,
    /// Keys that could not be read or written, with the reason
    pub failed: Vec<(String, String)>,
}

impl ReplicationReport {
    /// Whether every recognized key was mirrored
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    fn merge(&mut self, other: ReplicationReport) {
        self.copied.extend(other.copied);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
    }
}

/// Mirror from an Encrypted-tier store to a BootAccessible-tier store
pub struct ReplicationLink {
    source: Arc<dyn TierBackend>,
    destination: Arc<dyn TierBackend>,
}

impl ReplicationLink {
    /// Create a link from `source` to `destination`
    ///
    /// Fails unless `source` is the Encrypted tier and `destination` the
    /// BootAccessible tier.
    pub fn new(source: &ConfigStore, destination: &ConfigStore) -> Result<Self> {
        if source.tier() != TierKind::Encrypted || destination.tier() != TierKind::BootAccessible
        {
            return Err(Error::Misconfigured(format!(
                "Refusing to replicate {} -> {}",
                source.tier(),
                destination.tier()
            )));
        }
        Ok(Self {
            source: source.backend(),
            destination: destination.backend(),
        })
    }

    /// Copy every recognized key from source to destination
    ///
    /// Per-key failures are collected in the report. Only a failure to
    /// list the source is an error.
    pub fn bootstrap(&self) -> Result<ReplicationReport> {
        let entries = self
            .source
            .enumerate()
            .map_err(|e| Error::Replication(format!("Failed to enumerate source: {}", e)))?;

        let mut report = ReplicationReport::default();
        for entry in entries {
            report.merge(self.copy_stored(&entry.key, entry.value));
        }

        tracing::info!(
            copied = report.copied.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Replication bootstrap finished"
        );
        Ok(report)
    }

    /// Mirror the change described by `event`
    pub fn on_change(&self, event: &ChangeEvent) -> Result<ReplicationReport> {
        match event {
            ChangeEvent::All => self.bootstrap(),
            ChangeEvent::Field(field) => {
                let key = field.key();
                match self.source.get_raw(key) {
                    Ok(Some(stored)) => Ok(self.copy_stored(key, stored)),
                    // Deletions are not propagated
                    Ok(None) => Ok(ReplicationReport::default()),
                    Err(e) => Ok(ReplicationReport {
                        failed: vec![(key.to_string(), e.to_string())],
                        ..Default::default()
                    }),
                }
            }
        }
    }

    fn copy_stored(&self, key: &str, stored: StoredValue) -> ReplicationReport {
        let mut report = ReplicationReport::default();
        match stored {
            StoredValue::Known(value) => match self.copy_value(key, &value) {
                Ok(()) => report.copied.push(key.to_string()),
                Err(e) => report.failed.push((key.to_string(), e.to_string())),
            },
            StoredValue::Unrecognized { kind } => {
                tracing::debug!(key, %kind, "Skipping unrecognized value");
                report.skipped.push(key.to_string());
            }
        }
        report
    }

    fn copy_value(&self, key: &str, value: &Value) -> duress_storage::Result<()> {
        self.destination.set_raw(key, value)?;
        tracing::debug!(key, "Mirrored to boot-accessible tier");
        Ok(())
    }
}

impl ChangeListener for ReplicationLink {
    fn notify(&self, event: &ChangeEvent) {
        match self.on_change(event) {
            Ok(report) => {
                for (key, reason) in &report.failed {
                    tracing::warn!(key = %key, "Replication failed: {}", reason);
                }
            }
            Err(e) => tracing::warn!("Replication failed: {}", e),
        }
    }
}
