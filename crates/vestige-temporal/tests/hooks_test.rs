//! Custom collector hooks selected through configuration.

mod common;

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};

use common::*;
use vestige_core::config::VersioningConfig;
use vestige_core::IVersionStorage;
use vestige_storage::StorageEngine;
use vestige_core::{VersionRow, VestigeError, VestigeResult};
use vestige_temporal::{CollectorRegistry, ICollectorHooks, VersionEngine};

#[derive(Default)]
struct Journal {
    events: Mutex<Vec<String>>,
    refuse: Option<String>,
}

impl Journal {
    fn record(&self, event: &str, row: &VersionRow) {
        let name = row.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        self.events
            .lock()
            .unwrap()
            .push(format!("{event}:{}:{name}", row.entity()));
    }
}

impl ICollectorHooks for Journal {
    fn pre_delete(&self, row: &VersionRow, _at: DateTime<Utc>) -> VestigeResult<()> {
        if self.refuse.as_deref() == Some(row.entity()) {
            return Err(VestigeError::InvalidState(format!("{} is archived", row.entity())));
        }
        self.record("pre", row);
        Ok(())
    }

    fn post_delete(&self, row: &VersionRow, _at: DateTime<Utc>) -> VestigeResult<()> {
        self.record("post", row);
        Ok(())
    }

    fn terminate(
        &self,
        engine: &VersionEngine,
        row: &mut VersionRow,
        at: DateTime<Utc>,
    ) -> VestigeResult<()> {
        self.record("terminate", row);
        DefaultTerminate.terminate(engine, row, at)
    }
}

struct DefaultTerminate;
impl ICollectorHooks for DefaultTerminate {}

fn journaled(journal: Arc<Journal>) -> VersionEngine {
    let registry = CollectorRegistry::default();
    registry.register("journal", move || journal.clone() as Arc<dyn ICollectorHooks>);
    engine_with(
        VersioningConfig {
            collector: "journal".to_string(),
            ..VersioningConfig::default()
        },
        registry,
    )
}

#[test]
fn hooks_run_around_every_terminated_row() {
    let journal = Arc::new(Journal::default());
    let engine = journaled(journal.clone());
    let rome = city(&engine, "Rome", days_ago(3));
    team(&engine, "Wolves", Some(&rome), days_ago(2));

    assert_eq!(engine.delete(&rome).unwrap(), 2);
    let events = journal.events.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            "pre:city:Rome",
            "pre:team:Wolves",
            "terminate:city:Rome",
            "terminate:team:Wolves",
            "post:city:Rome",
            "post:team:Wolves",
        ]
    );
}

#[test]
fn failing_hook_rolls_back_the_delete() {
    let journal = Arc::new(Journal {
        refuse: Some("team".to_string()),
        ..Journal::default()
    });
    let engine = journaled(journal);
    let rome = city(&engine, "Rome", days_ago(3));
    team(&engine, "Wolves", Some(&rome), days_ago(2));

    assert!(matches!(
        engine.delete(&rome),
        Err(VestigeError::InvalidState(_))
    ));
    assert_eq!(engine.query("city").current().count().unwrap(), 1);
    assert_eq!(engine.query("team").current().count().unwrap(), 1);
}

/// Lets another thread start writing, then fails the delete.
struct Interleaved {
    go: Mutex<Option<Sender<()>>>,
}

impl ICollectorHooks for Interleaved {
    fn pre_delete(&self, _row: &VersionRow, _at: DateTime<Utc>) -> VestigeResult<()> {
        if let Some(go) = self.go.lock().unwrap().take() {
            go.send(()).unwrap();
        }
        thread::sleep(Duration::from_millis(50));
        Err(VestigeError::InvalidState("delete refused".to_string()))
    }
}

#[test]
fn rolled_back_delete_keeps_writes_of_other_threads() {
    let storage = Arc::new(StorageEngine::open_in_memory(Default::default()).unwrap());
    let (go, wait) = mpsc::channel();
    let hooks: Arc<dyn ICollectorHooks> = Arc::new(Interleaved {
        go: Mutex::new(Some(go)),
    });
    let registry = CollectorRegistry::default();
    registry.register("interleaved", move || hooks.clone());
    let deleting = VersionEngine::with_collectors(
        storage.clone() as Arc<dyn IVersionStorage>,
        catalog(),
        VersioningConfig {
            collector: "interleaved".to_string(),
            ..VersioningConfig::default()
        },
        registry,
    )
    .unwrap();
    deleting.ensure_schema().unwrap();
    let rome = city(&deleting, "Rome", days_ago(3));

    let writer = {
        let storage = storage.clone();
        thread::spawn(move || {
            let engine = VersionEngine::new(
                storage as Arc<dyn IVersionStorage>,
                catalog(),
                VersioningConfig::default(),
            )
            .unwrap();
            wait.recv().unwrap();
            engine.create("city", named("Oslo")).map(|row| row.identity())
        })
    };

    assert!(matches!(
        deleting.delete(&rome),
        Err(VestigeError::InvalidState(_))
    ));
    let oslo = writer.join().unwrap().unwrap();

    let current = deleting.query("city").current().fetch().unwrap();
    assert_eq!(names(&current), vec!["Oslo", "Rome"]);
    assert!(current.iter().any(|row| row.identity() == oslo));
}

#[test]
fn unknown_collector_is_a_config_error() {
    let storage = vestige_storage::StorageEngine::open_in_memory(Default::default()).unwrap();
    let result = VersionEngine::new(
        Arc::new(storage),
        catalog(),
        VersioningConfig {
            collector: "missing".to_string(),
            ..VersioningConfig::default()
        },
    );
    assert!(matches!(result, Err(VestigeError::Config(_))));
}

#[test]
fn zero_batch_size_is_a_config_error() {
    let storage = vestige_storage::StorageEngine::open_in_memory(Default::default()).unwrap();
    let result = VersionEngine::new(
        Arc::new(storage),
        catalog(),
        VersioningConfig {
            relation_batch_size: 0,
            ..VersioningConfig::default()
        },
    );
    assert!(matches!(result, Err(VestigeError::Config(_))));
}
