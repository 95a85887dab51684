//! Property-based tests for duress-core
//!
//! Uses proptest to verify the read-chain and replication invariants
//! across randomized tier contents

use duress_core::{ChangeEvent, ConfigStore, Field, ReplicationLink, TierKind, Value};
use duress_storage::{MemoryBackend, StoredValue, TierBackend};
use proptest::prelude::*;
use std::sync::Arc;

// ============================================================================
// Strategies
// ============================================================================

fn field_strategy() -> impl Strategy<Value = Field> {
    prop::sample::select(Field::ALL.to_vec())
}

/// A value of the field's declared type
fn value_for(field: Field) -> BoxedStrategy<Value> {
    match field.kind() {
        duress_core::ValueKind::Bool => any::<bool>().prop_map(Value::Bool).boxed(),
        duress_core::ValueKind::Int => (0i64..=1).prop_map(Value::Int).boxed(),
        duress_core::ValueKind::Str => prop::string::string_regex("[a-zA-Z0-9]{0,16}")
            .unwrap()
            .prop_map(Value::Str)
            .boxed(),
    }
}

/// Random Encrypted-tier contents: some fields, plus arbitrary extra keys
fn tier_contents() -> impl Strategy<Value = Vec<(String, Value)>> {
    let fields = prop::collection::vec(
        field_strategy().prop_flat_map(|f| value_for(f).prop_map(move |v| (f.key().to_string(), v))),
        0..5,
    );
    let extras = prop::collection::vec(
        (
            "[a-z_]{1,12}",
            prop_oneof![
                any::<bool>().prop_map(Value::Bool),
                any::<i64>().prop_map(Value::Int),
                "[ -~]{0,20}".prop_map(Value::Str),
            ],
        ),
        0..4,
    );
    (fields, extras).prop_map(|(mut f, e)| {
        f.extend(e);
        f
    })
}

fn stores(source: Vec<(String, Value)>) -> (ConfigStore, ConfigStore, Arc<MemoryBackend>, Arc<MemoryBackend>) {
    let src = Arc::new(MemoryBackend::with_values(source));
    let dst = Arc::new(MemoryBackend::new());
    (
        ConfigStore::new(TierKind::Encrypted, src.clone()),
        ConfigStore::new(TierKind::BootAccessible, dst.clone()),
        src,
        dst,
    )
}

// ============================================================================
// Read Chain Properties
// ============================================================================

proptest! {
    /// Property: an unset field with a legacy alias reads the converted alias
    #[test]
    fn prop_legacy_alias_converted(armed in any::<bool>(), len in 0i64..10_000) {
        let backend = Arc::new(MemoryBackend::with_values(vec![
            ("service_enabled", Value::Bool(armed)),
            ("password_len", Value::Int(len)),
        ]));
        let store = ConfigStore::new(TierKind::Encrypted, backend);

        prop_assert_eq!(store.get(Field::Armed), Value::Bool(armed));
        prop_assert_eq!(store.get(Field::PasswordOrLength), Value::Str(len.to_string()));
    }

    /// Property: a field stored nowhere reads its default
    #[test]
    fn prop_unset_reads_default(field in field_strategy()) {
        let store = ConfigStore::new(TierKind::Encrypted, Arc::new(MemoryBackend::new()));
        prop_assert_eq!(store.get(field), field.default_value());
    }

    /// Property: a written value reads back
    #[test]
    fn prop_set_then_get(
        (field, value) in field_strategy().prop_flat_map(|f| value_for(f).prop_map(move |v| (f, v)))
    ) {
        let store = ConfigStore::new(TierKind::Encrypted, Arc::new(MemoryBackend::new()));
        store.set(field, value.clone()).unwrap();
        prop_assert_eq!(store.get(field), value);
    }
}

// ============================================================================
// Replication Properties
// ============================================================================

proptest! {
    /// Property: after bootstrap every source key is mirrored exactly
    #[test]
    fn prop_bootstrap_complete(contents in tier_contents()) {
        let (source, mirror, src, dst) = stores(contents);
        let report = ReplicationLink::new(&source, &mirror).unwrap().bootstrap().unwrap();
        prop_assert!(report.is_complete());

        for entry in src.enumerate().unwrap() {
            prop_assert_eq!(dst.get_raw(&entry.key).unwrap(), Some(entry.value));
        }
        prop_assert_eq!(dst.len(), src.len());
    }

    /// Property: a subscribed link mirrors every write before `set` returns
    #[test]
    fn prop_incremental_mirroring(
        writes in prop::collection::vec(
            field_strategy().prop_flat_map(|f| value_for(f).prop_map(move |v| (f, v))),
            1..10,
        )
    ) {
        let (source, mirror, _, dst) = stores(Vec::new());
        let link = Arc::new(ReplicationLink::new(&source, &mirror).unwrap());
        source.subscribe(link);

        for (field, value) in writes {
            source.set(field, value.clone()).unwrap();
            prop_assert_eq!(
                dst.get_raw(field.key()).unwrap(),
                Some(StoredValue::Known(value))
            );
        }
    }

    /// Property: destination keys absent from the source are never removed
    #[test]
    fn prop_no_deletion_propagation(field in field_strategy(), extra in "[a-z]{1,8}_x") {
        let (source, mirror, _, dst) = stores(Vec::new());
        dst.set_raw(&extra, &Value::Bool(true)).unwrap();
        let link = ReplicationLink::new(&source, &mirror).unwrap();

        link.on_change(&ChangeEvent::Field(field)).unwrap();
        link.on_change(&ChangeEvent::All).unwrap();

        prop_assert_eq!(
            dst.get_raw(&extra).unwrap(),
            Some(StoredValue::Known(Value::Bool(true)))
        );
    }
}
