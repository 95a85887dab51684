//! Configuration schema
//!
//! The fixed set of fields, their persisted keys, value types, defaults,
//! and the legacy keys older installs may still carry. Legacy keys are only
//! ever read.

use duress_storage::{Value, ValueKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A logical configuration field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// Whether the watcher may act on a failed unlock
    Armed,
    /// Trigger password, or its length as a decimal string
    PasswordOrLength,
    /// Also wipe the embedded SIM
    WipeEmbeddedSim,
    /// Which keyguard variant the watcher expects
    KeyguardType,
    /// Whether the prominent disclosure dialog is still pending
    ShowProminentDisclosure,
}

impl Field {
    /// Every field, in schema order
    pub const ALL: [Field; 5] = [
        Field::Armed,
        Field::PasswordOrLength,
        Field::WipeEmbeddedSim,
        Field::KeyguardType,
        Field::ShowProminentDisclosure,
    ];

    /// Persisted key
    pub fn key(&self) -> &'static str {
        match self {
            Field::Armed => "enabled",
            Field::PasswordOrLength => "password_or_len",
            Field::WipeEmbeddedSim => "wipe_embedded_sim",
            Field::KeyguardType => "keyguard_type",
            Field::ShowProminentDisclosure => "show_prominent_disclosure",
        }
    }

    /// Look up a field by persisted key (legacy keys do not match)
    pub fn from_key(key: &str) -> Option<Field> {
        Field::ALL.into_iter().find(|f| f.key() == key)
    }

    /// Declared value type
    pub fn kind(&self) -> ValueKind {
        match self {
            Field::Armed | Field::WipeEmbeddedSim | Field::ShowProminentDisclosure => {
                ValueKind::Bool
            }
            Field::PasswordOrLength => ValueKind::Str,
            Field::KeyguardType => ValueKind::Int,
        }
    }

    /// Whether `value` lies in the field's domain
    ///
    /// Only meaningful for values of the declared type.
    pub fn in_domain(&self, value: &Value) -> bool {
        match (self, value) {
            (Field::KeyguardType, Value::Int(i)) => KeyguardType::try_from_i64(*i).is_some(),
            _ => true,
        }
    }

    /// Value returned when neither the field nor its legacy alias is stored
    pub fn default_value(&self) -> Value {
        match self {
            Field::Armed => Value::Bool(false),
            Field::PasswordOrLength => Value::Str(String::new()),
            Field::WipeEmbeddedSim => Value::Bool(false),
            Field::KeyguardType => Value::Int(KeyguardType::A.as_i64()),
            Field::ShowProminentDisclosure => Value::Bool(true),
        }
    }

    /// Older key this field used to be stored under
    pub fn legacy_alias(&self) -> Option<LegacyAlias> {
        match self {
            Field::Armed => Some(LegacyAlias {
                key: "service_enabled",
                kind: ValueKind::Bool,
            }),
            Field::PasswordOrLength => Some(LegacyAlias {
                key: "password_len",
                kind: ValueKind::Int,
            }),
            _ => None,
        }
    }

    /// Ordered read sources: current key, then legacy alias, then default
    pub fn read_chain(&self) -> Vec<ReadSource> {
        let mut chain = vec![ReadSource::Current(self.key())];
        if let Some(alias) = self.legacy_alias() {
            chain.push(ReadSource::Legacy(alias));
        }
        chain.push(ReadSource::Default);
        chain
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A legacy key and the type it was written with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LegacyAlias {
    /// Persisted legacy key
    pub key: &'static str,
    /// Type the legacy key was written with
    pub kind: ValueKind,
}

impl LegacyAlias {
    /// Convert a value read from the legacy key into `field`'s type
    ///
    /// Returns `None` when the stored value does not have the alias type
    /// or no conversion exists.
    pub fn convert(&self, field: Field, value: Value) -> Option<Value> {
        if value.kind() != self.kind {
            return None;
        }
        match (value, field.kind()) {
            (v, kind) if v.kind() == kind => Some(v),
            (Value::Int(i), ValueKind::Str) => Some(Value::Str(i.to_string())),
            _ => None,
        }
    }
}

/// One step of a field's read chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// The field's own key in the current tier
    Current(&'static str),
    /// The legacy alias in the current tier
    Legacy(LegacyAlias),
    /// The schema default
    Default,
}

/// Keyguard variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyguardType {
    /// Variant A (stored as 0)
    A,
    /// Variant B (stored as 1)
    B,
}

impl KeyguardType {
    /// Stored integer
    pub fn as_i64(&self) -> i64 {
        match self {
            KeyguardType::A => 0,
            KeyguardType::B => 1,
        }
    }

    /// Decode an integer, rejecting anything but 0 and 1
    pub fn try_from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(KeyguardType::A),
            1 => Some(KeyguardType::B),
            _ => None,
        }
    }

    /// Decode a stored integer; anything but 1 reads as `A`
    pub fn from_i64(value: i64) -> Self {
        match value {
            1 => KeyguardType::B,
            _ => KeyguardType::A,
        }
    }
}

impl From<KeyguardType> for Value {
    fn from(value: KeyguardType) -> Self {
        Value::Int(value.as_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_declared_kind() {
        for field in Field::ALL {
            assert_eq!(field.default_value().kind(), field.kind(), "{field}");
        }
    }

    #[test]
    fn test_keys_unique_and_resolvable() {
        for field in Field::ALL {
            assert_eq!(Field::from_key(field.key()), Some(field));
        }
        assert_eq!(Field::from_key("service_enabled"), None);
        assert_eq!(Field::from_key("password_len"), None);
    }

    #[test]
    fn test_read_chain_order() {
        let chain = Field::Armed.read_chain();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0], ReadSource::Current("enabled"));
        assert!(matches!(chain[1], ReadSource::Legacy(a) if a.key == "service_enabled"));
        assert_eq!(chain[2], ReadSource::Default);

        assert_eq!(
            Field::WipeEmbeddedSim.read_chain(),
            vec![ReadSource::Current("wipe_embedded_sim"), ReadSource::Default]
        );
    }

    #[test]
    fn test_legacy_int_converts_to_decimal_string() {
        let alias = Field::PasswordOrLength.legacy_alias().unwrap();
        assert_eq!(
            alias.convert(Field::PasswordOrLength, Value::Int(3)),
            Some(Value::Str("3".to_string()))
        );
        // Wrong stored type for the alias
        assert_eq!(
            alias.convert(Field::PasswordOrLength, Value::Str("3".into())),
            None
        );
    }

    #[test]
    fn test_legacy_bool_passes_through() {
        let alias = Field::Armed.legacy_alias().unwrap();
        assert_eq!(
            alias.convert(Field::Armed, Value::Bool(true)),
            Some(Value::Bool(true))
        );
        assert_eq!(alias.convert(Field::Armed, Value::Int(1)), None);
    }

    #[test]
    fn test_keyguard_decoding() {
        assert_eq!(KeyguardType::from_i64(0), KeyguardType::A);
        assert_eq!(KeyguardType::from_i64(1), KeyguardType::B);
        assert_eq!(KeyguardType::from_i64(7), KeyguardType::A);
        assert_eq!(Value::from(KeyguardType::B), Value::Int(1));
        assert_eq!(KeyguardType::try_from_i64(7), None);
    }

    #[test]
    fn test_keyguard_domain() {
        assert!(Field::KeyguardType.in_domain(&Value::Int(0)));
        assert!(Field::KeyguardType.in_domain(&Value::Int(1)));
        assert!(!Field::KeyguardType.in_domain(&Value::Int(7)));
        assert!(!Field::KeyguardType.in_domain(&Value::Int(-1)));
        assert!(Field::Armed.in_domain(&Value::Bool(true)));
    }
}
