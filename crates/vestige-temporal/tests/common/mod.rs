//! Shared fixtures: a small league catalog on an in-memory SQLite engine.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use vestige_core::config::{IdentifierMode, VersioningConfig};
use vestige_core::schema::DefaultValue;
use vestige_core::{
    now, Catalog, EntitySchema, ManyToMany, OnDelete, Reference, Value, ValueKind, VersionKey,
    VersionRow,
};
use vestige_storage::StorageEngine;
use vestige_temporal::{CollectorRegistry, VersionEngine};

/// Identity of the team that sponsors fall back to when theirs is deleted.
pub const FREE_AGENTS: &str = "9b2f6c1e-3d4a-4f5b-8c7d-1e2f3a4b5c6d";

pub fn catalog() -> Catalog {
    let free_agents = VersionKey::parse(FREE_AGENTS).unwrap();
    Catalog::new()
        .with(EntitySchema::versioned("city").attribute("name", ValueKind::Text))
        .unwrap()
        .with(
            EntitySchema::versioned("team")
                .attribute("name", ValueKind::Text)
                .reference(Reference::new("city", "city").optional().related_name("teams")),
        )
        .unwrap()
        .with(
            EntitySchema::versioned("player")
                .attribute("name", ValueKind::Text)
                .optional_attribute("number", ValueKind::Integer)
                .reference(
                    Reference::new("team", "team")
                        .optional()
                        .on_delete(OnDelete::SetNull)
                        .related_name("players"),
                ),
        )
        .unwrap()
        .with(
            EntitySchema::versioned("sponsor")
                .attribute("name", ValueKind::Text)
                .reference(
                    Reference::new("team", "team")
                        .on_delete(OnDelete::SetDefault(DefaultValue::constant(free_agents))),
                ),
        )
        .unwrap()
        .with(
            EntitySchema::versioned("fan")
                .attribute("name", ValueKind::Text)
                .reference(
                    Reference::new("team", "team")
                        .optional()
                        .on_delete(OnDelete::NoAction),
                ),
        )
        .unwrap()
        .with(
            EntitySchema::plain("ticket")
                .attribute("seat", ValueKind::Text)
                .reference(Reference::new("team", "team")),
        )
        .unwrap()
        .with(EntitySchema::versioned("library").attribute("name", ValueKind::Text))
        .unwrap()
        .with(
            EntitySchema::versioned("shelf")
                .attribute("label", ValueKind::Text)
                .reference(Reference::new("library", "library").related_name("shelves")),
        )
        .unwrap()
        .with(
            EntitySchema::versioned("book")
                .attribute("title", ValueKind::Text)
                .reference(Reference::new("library", "library").on_delete(OnDelete::Protect))
                .reference(Reference::new("shelf", "shelf").optional()),
        )
        .unwrap()
        .with(EntitySchema::versioned("student").attribute("name", ValueKind::Text))
        .unwrap()
        .with(
            EntitySchema::versioned("professor")
                .attribute("name", ValueKind::Text)
                .many_to_many(ManyToMany::new("students", "student").related_name("professors")),
        )
        .unwrap()
        .with(
            EntitySchema::versioned("person")
                .attribute("name", ValueKind::Text)
                .many_to_many(ManyToMany::new("friends", "person").symmetrical()),
        )
        .unwrap()
}

pub fn engine() -> VersionEngine {
    engine_with(VersioningConfig::default(), CollectorRegistry::default())
}

pub fn engine_with(config: VersioningConfig, collectors: CollectorRegistry) -> VersionEngine {
    let storage = StorageEngine::open_in_memory(config.identifier_mode).unwrap();
    let engine =
        VersionEngine::with_collectors(Arc::new(storage), catalog(), config, collectors).unwrap();
    engine.ensure_schema().unwrap();
    engine
}

pub fn uuid_engine() -> VersionEngine {
    engine_with(
        VersioningConfig {
            identifier_mode: IdentifierMode::Uuid,
            ..VersioningConfig::default()
        },
        CollectorRegistry::default(),
    )
}

/// `days` days before now, at microsecond precision.
pub fn days_ago(days: i64) -> DateTime<Utc> {
    now() - Duration::days(days)
}

pub fn named(name: &str) -> Vec<(&'static str, Value)> {
    vec![("name", Value::from(name))]
}

pub fn name_of(row: &VersionRow) -> &str {
    row.get("name").and_then(Value::as_str).unwrap_or_default()
}

pub fn names(rows: &[VersionRow]) -> Vec<String> {
    let mut names: Vec<String> = rows.iter().map(|r| name_of(r).to_string()).collect();
    names.sort();
    names
}

pub fn city(engine: &VersionEngine, name: &str, at: DateTime<Utc>) -> VersionRow {
    engine.create_at("city", at, named(name)).unwrap()
}

pub fn team(engine: &VersionEngine, name: &str, city: Option<&VersionRow>, at: DateTime<Utc>) -> VersionRow {
    let city = city.map(|c| Value::Key(c.identity())).unwrap_or(Value::Null);
    engine
        .create_at("team", at, [("name", Value::from(name)), ("city", city)])
        .unwrap()
}

pub fn player(engine: &VersionEngine, name: &str, team: Option<&VersionRow>, at: DateTime<Utc>) -> VersionRow {
    let team = team.map(|t| Value::Key(t.identity())).unwrap_or(Value::Null);
    engine
        .create_at("player", at, [("name", Value::from(name)), ("team", team)])
        .unwrap()
}
