//! Configuration store of one tier
//!
//! Reads walk the field's read chain (current key, legacy alias, default)
//! and never fail. Writes go to the current key only, are durable when
//! `set` returns, and are announced on the store's [`ChangeBus`] before
//! `set` returns.

use crate::error::{Error, Result};
use crate::events::{ChangeBus, ChangeEvent, ChangeListener, SubscriptionId};
use crate::schema::{Field, KeyguardType, ReadSource};
use duress_params::{PlatformInfo, StoragePaths};
use duress_storage::{open_tier, PlatformKeystore, StoredValue, TierBackend, TierKind, Value};
use std::sync::Arc;

/// Typed key-value store bound to one tier for its whole lifetime
pub struct ConfigStore {
    tier: TierKind,
    backend: Arc<dyn TierBackend>,
    bus: ChangeBus,
}

impl ConfigStore {
    /// Wrap an already opened backend
    pub fn new(tier: TierKind, backend: Arc<dyn TierBackend>) -> Self {
        Self {
            tier,
            backend,
            bus: ChangeBus::new(),
        }
    }

    /// Open the on-disk tier of `kind`
    pub fn open(
        kind: TierKind,
        paths: &StoragePaths,
        keystore: &dyn PlatformKeystore,
    ) -> Result<Self> {
        let tier = open_tier(kind, paths, keystore)?;
        tracing::info!(tier = %kind, path = %tier.path().display(), "Config store opened");
        Ok(Self::new(kind, Arc::new(tier)))
    }

    /// Open the tier the current process may use
    pub fn open_for_platform(
        platform: &PlatformInfo,
        paths: &StoragePaths,
        keystore: &dyn PlatformKeystore,
    ) -> Result<Self> {
        Self::open(TierKind::select(platform), paths, keystore)
    }

    /// Tier this store is bound to
    pub fn tier(&self) -> TierKind {
        self.tier
    }

    pub(crate) fn backend(&self) -> Arc<dyn TierBackend> {
        Arc::clone(&self.backend)
    }

    /// Read `field`
    pub fn get(&self, field: Field) -> Value {
        for source in field.read_chain() {
            match source {
                ReadSource::Current(key) => match self.backend.get_raw(key) {
                    Ok(Some(StoredValue::Known(value))) if value.kind() == field.kind() => {
                        return value
                    }
                    Ok(Some(StoredValue::Known(value))) => {
                        tracing::warn!(
                            tier = %self.tier,
                            key,
                            stored = %value.kind(),
                            "Stored value has wrong type, ignoring"
                        );
                    }
                    Ok(Some(StoredValue::Unrecognized { kind })) => {
                        tracing::warn!(tier = %self.tier, key, %kind, "Unrecognized stored value, ignoring");
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(tier = %self.tier, key, "Read failed: {}", e);
                    }
                },
                ReadSource::Legacy(alias) => match self.backend.get_raw(alias.key) {
                    Ok(Some(StoredValue::Known(value))) => {
                        if let Some(converted) = alias.convert(field, value) {
                            tracing::debug!(tier = %self.tier, key = alias.key, "Read legacy alias");
                            return converted;
                        }
                        tracing::warn!(tier = %self.tier, key = alias.key, "Legacy value has wrong type, ignoring");
                    }
                    Ok(Some(StoredValue::Unrecognized { .. })) | Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(tier = %self.tier, key = alias.key, "Read failed: {}", e);
                    }
                },
                ReadSource::Default => return field.default_value(),
            }
        }
        field.default_value()
    }

    /// Write `field`
    pub fn set(&self, field: Field, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        check_kind(field, &value)?;

        self.backend.set_raw(field.key(), &value)?;
        tracing::debug!(tier = %self.tier, key = field.key(), "Field written");

        self.bus.publish(&ChangeEvent::Field(field));
        Ok(())
    }

    /// Write several fields in one atomic step
    ///
    /// Listeners receive a single [`ChangeEvent::All`].
    pub fn apply(&self, batch: &[(Field, Value)]) -> Result<()> {
        for (field, value) in batch {
            check_kind(*field, value)?;
        }
        let entries: Vec<(String, Value)> = batch
            .iter()
            .map(|(field, value)| (field.key().to_string(), value.clone()))
            .collect();

        self.backend.set_many(&entries)?;
        tracing::debug!(tier = %self.tier, count = entries.len(), "Batch written");

        self.bus.publish(&ChangeEvent::All);
        Ok(())
    }

    /// Register a change listener
    pub fn subscribe(&self, listener: Arc<dyn ChangeListener>) -> SubscriptionId {
        self.bus.subscribe(listener)
    }

    /// Remove a change listener
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.bus.unsubscribe(id)
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.bus.len()
    }

    /// Armed flag
    pub fn is_armed(&self) -> bool {
        self.get(Field::Armed).as_bool().unwrap_or(false)
    }

    /// Trigger password or its length
    pub fn password_or_len(&self) -> String {
        match self.get(Field::PasswordOrLength) {
            Value::Str(s) => s,
            _ => String::new(),
        }
    }

    /// Embedded SIM wipe option
    pub fn is_wipe_embedded_sim(&self) -> bool {
        self.get(Field::WipeEmbeddedSim).as_bool().unwrap_or(false)
    }

    /// Keyguard variant
    pub fn keyguard_type(&self) -> KeyguardType {
        self.get(Field::KeyguardType)
            .as_int()
            .map(KeyguardType::from_i64)
            .unwrap_or(KeyguardType::A)
    }

    /// Whether the prominent disclosure is still pending
    pub fn is_show_prominent_disclosure(&self) -> bool {
        self.get(Field::ShowProminentDisclosure)
            .as_bool()
            .unwrap_or(true)
    }

    /// Set the armed flag
    pub fn set_armed(&self, armed: bool) -> Result<()> {
        self.set(Field::Armed, armed)
    }

    /// Set the trigger password or its length
    pub fn set_password_or_len(&self, value: impl Into<String>) -> Result<()> {
        self.set(Field::PasswordOrLength, Value::Str(value.into()))
    }

    /// Set the embedded SIM wipe option
    pub fn set_wipe_embedded_sim(&self, wipe: bool) -> Result<()> {
        self.set(Field::WipeEmbeddedSim, wipe)
    }

    /// Set the keyguard variant
    pub fn set_keyguard_type(&self, keyguard: KeyguardType) -> Result<()> {
        self.set(Field::KeyguardType, keyguard)
    }

    /// Set whether the prominent disclosure is still pending
    pub fn set_show_prominent_disclosure(&self, show: bool) -> Result<()> {
        self.set(Field::ShowProminentDisclosure, show)
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("tier", &self.tier)
            .field("listeners", &self.bus.len())
            .finish()
    }
}

fn check_kind(field: Field, value: &Value) -> Result<()> {
    if value.kind() != field.kind() {
        tracing::error!(
            key = field.key(),
            expected = %field.kind(),
            actual = %value.kind(),
            "Rejected write with wrong value type"
        );
        return Err(Error::InvalidFieldType {
            field,
            expected: field.kind(),
            actual: value.kind(),
        });
    }
    if !field.in_domain(value) {
        tracing::error!(key = field.key(), "Rejected write outside field domain");
        return Err(Error::OutOfRange { field });
    }
    Ok(())
}
