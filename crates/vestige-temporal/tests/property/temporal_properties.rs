//! Property tests for the version chain: contiguity, one version per
//! instant, and the head key.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use proptest::prelude::*;

use vestige_core::config::VersioningConfig;
use vestige_core::{now, Catalog, EntitySchema, Value, ValueKind, VersionKey, VersionRow};
use vestige_storage::StorageEngine;
use vestige_temporal::{Filter, VersionEngine};

fn engine() -> VersionEngine {
    let catalog = Catalog::new()
        .with(EntitySchema::versioned("item").attribute("name", ValueKind::Text))
        .unwrap();
    let storage = StorageEngine::open_in_memory(Default::default()).unwrap();
    let engine =
        VersionEngine::new(Arc::new(storage), catalog, VersioningConfig::default()).unwrap();
    engine.ensure_schema().unwrap();
    engine
}

/// Build a chain whose versions start at the given hour offsets after
/// `base`. Returns the identity and the version start times.
fn build_chain(
    engine: &VersionEngine,
    base: DateTime<Utc>,
    gaps: &[i64],
) -> (VersionKey, Vec<DateTime<Utc>>) {
    let mut row = engine
        .create_at("item", base, [("name", Value::from("v0"))])
        .unwrap();
    let identity = row.identity();
    let mut starts = vec![base];
    let mut at = base;
    for (i, gap) in gaps.iter().enumerate() {
        at += Duration::hours(*gap);
        let mut next = engine.clone_at(&mut row, at).unwrap();
        next.set("name", format!("v{}", i + 1));
        engine.save(&mut next).unwrap();
        starts.push(at);
        row = next;
    }
    (identity, starts)
}

fn history(engine: &VersionEngine, identity: VersionKey) -> Vec<VersionRow> {
    engine
        .query("item")
        .unbounded()
        .filter(Filter::eq("identity", identity))
        .order_by("valid_from")
        .fetch()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_versions_are_contiguous(gaps in prop::collection::vec(1i64..48, 0..8)) {
        let engine = engine();
        let total: i64 = gaps.iter().sum();
        let base = now() - Duration::hours(total + 1);
        let (identity, starts) = build_chain(&engine, base, &gaps);

        let versions = history(&engine, identity);
        prop_assert_eq!(versions.len(), starts.len());
        for pair in versions.windows(2) {
            prop_assert_eq!(pair[0].valid_until(), Some(pair[1].valid_from()));
            prop_assert_eq!(pair[0].born_at(), pair[1].born_at());
        }
        prop_assert_eq!(versions.iter().filter(|v| v.is_current()).count(), 1);
        let head = versions.last().unwrap();
        prop_assert_eq!(head.key(), identity);
        prop_assert!(versions[..versions.len() - 1].iter().all(|v| v.key() != identity));
    }

    #[test]
    fn prop_one_version_per_instant(
        gaps in prop::collection::vec(1i64..48, 1..6),
        probe in 0i64..400,
    ) {
        let engine = engine();
        let total: i64 = gaps.iter().sum();
        let base = now() - Duration::hours(total + 1);
        let (identity, starts) = build_chain(&engine, base, &gaps);

        let at = base - Duration::hours(4) + Duration::minutes(probe * 15);
        let matches = engine
            .query("item")
            .as_of(Some(at))
            .filter(Filter::eq("identity", identity))
            .fetch()
            .unwrap();
        let expected = starts.iter().rposition(|start| *start <= at);
        match expected {
            None => prop_assert!(matches.is_empty()),
            Some(index) => {
                prop_assert_eq!(matches.len(), 1);
                let name = format!("v{index}");
                prop_assert_eq!(matches[0].get("name"), Some(&Value::from(name.as_str())));
            }
        }
    }

    #[test]
    fn prop_as_of_now_equals_current(gaps in prop::collection::vec(1i64..48, 0..5)) {
        let engine = engine();
        let total: i64 = gaps.iter().sum();
        let base = now() - Duration::hours(total + 1);
        build_chain(&engine, base, &gaps);

        let current = engine.query("item").current().get().unwrap();
        let as_of_now = engine.query("item").as_of(Some(now())).get().unwrap();
        prop_assert_eq!(current.key(), as_of_now.key());
        prop_assert_eq!(current.attributes(), as_of_now.attributes());
    }
}
