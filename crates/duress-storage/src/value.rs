//! Tagged values

use serde::{Deserialize, Serialize};
use std::fmt;

/// Type tag of a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueKind {
    /// Boolean
    Bool,
    /// 64-bit signed integer
    Int,
    /// UTF-8 string
    Str,
}

impl ValueKind {
    /// Tag persisted in the `kind` column
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::Int => "int",
            ValueKind::Str => "string",
        }
    }

    /// Parse a persisted tag
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "bool" => Some(ValueKind::Bool),
            "int" => Some(ValueKind::Int),
            "string" => Some(ValueKind::Str),
            _ => None,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configuration value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Boolean value
    Bool(bool),
    /// Integer value
    Int(i64),
    /// String value
    Str(String),
}

impl Value {
    /// Type tag of this value
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Str(_) => ValueKind::Str,
        }
    }

    /// Boolean payload, if this is a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// String payload, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

/// A value as found in a tier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredValue {
    /// One of the recognized tags
    Known(Value),
    /// A row whose tag (or payload) this build does not understand
    Unrecognized {
        /// Tag found in storage
        kind: String,
    },
}

impl StoredValue {
    /// The decoded value, if recognized
    pub fn known(&self) -> Option<&Value> {
        match self {
            StoredValue::Known(v) => Some(v),
            StoredValue::Unrecognized { .. } => None,
        }
    }

    /// Consume into the decoded value, if recognized
    pub fn into_known(self) -> Option<Value> {
        match self {
            StoredValue::Known(v) => Some(v),
            StoredValue::Unrecognized { .. } => None,
        }
    }
}

impl From<Value> for StoredValue {
    fn from(value: Value) -> Self {
        StoredValue::Known(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        for kind in [ValueKind::Bool, ValueKind::Int, ValueKind::Str] {
            assert_eq!(ValueKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(ValueKind::parse("float"), None);
        assert_eq!(ValueKind::parse("string_set"), None);
    }

    #[test]
    fn test_accessors_check_tag() {
        let v = Value::from(3i64);
        assert_eq!(v.kind(), ValueKind::Int);
        assert_eq!(v.as_int(), Some(3));
        assert_eq!(v.as_bool(), None);
        assert_eq!(v.as_str(), None);
    }

    #[test]
    fn test_unrecognized_is_not_known() {
        let stored = StoredValue::Unrecognized {
            kind: "float".to_string(),
        };
        assert!(stored.known().is_none());
        assert_eq!(StoredValue::from(Value::Bool(true)).into_known(), Some(Value::Bool(true)));
    }
}
