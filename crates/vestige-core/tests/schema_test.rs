//! Catalog registration, validation, reverse lookups and generated DDL.

use vestige_core::schema::{Catalog, EntitySchema, ManyToMany, OnDelete, Reference};
use vestige_core::{ValueKind, VestigeError};

fn city() -> EntitySchema {
    EntitySchema::versioned("city").attribute("name", ValueKind::Text)
}

fn team() -> EntitySchema {
    EntitySchema::versioned("team")
        .attribute("name", ValueKind::Text)
        .reference(Reference::new("city", "city").related_name("teams"))
}

fn player() -> EntitySchema {
    EntitySchema::versioned("player")
        .attribute("name", ValueKind::Text)
        .reference(Reference::new("team", "team").optional().on_delete(OnDelete::SetNull))
}

#[test]
fn register_and_lookup() {
    let catalog = Catalog::new()
        .with(city())
        .unwrap()
        .with(team())
        .unwrap()
        .with(player())
        .unwrap();
    catalog.validate().unwrap();

    let team = catalog.entity("team").unwrap();
    assert!(team.is_versioned());
    assert_eq!(team.column_kind("city"), Some(ValueKind::Key));
    assert_eq!(team.column_kind("valid_until"), Some(ValueKind::Timestamp));
    assert_eq!(team.column_kind("missing"), None);
    assert!(matches!(
        catalog.entity("stadium"),
        Err(VestigeError::UnknownEntity(_))
    ));
}

#[test]
fn reverse_references_use_related_name_or_default() {
    let catalog = Catalog::new()
        .with(city())
        .unwrap()
        .with(team())
        .unwrap()
        .with(player())
        .unwrap();

    let teams = catalog.reverse_reference("city", "teams").unwrap();
    assert_eq!(teams.entity.name(), "team");
    assert_eq!(teams.reference.name, "city");

    let players = catalog.reverse_reference("team", "player_set").unwrap();
    assert_eq!(players.entity.name(), "player");
    assert!(catalog.reverse_reference("team", "teams").is_none());
}

#[test]
fn duplicate_entity_is_rejected() {
    let mut catalog = Catalog::new();
    catalog.register(city()).unwrap();
    assert!(matches!(
        catalog.register(city()),
        Err(VestigeError::InvalidArgument(_))
    ));
}

#[test]
fn field_colliding_with_bookkeeping_column_is_rejected() {
    let schema = EntitySchema::versioned("broken").attribute("valid_from", ValueKind::Text);
    assert!(Catalog::new().with(schema).is_err());
}

#[test]
fn required_set_null_reference_is_rejected() {
    let schema = EntitySchema::versioned("broken")
        .reference(Reference::new("city", "city").on_delete(OnDelete::SetNull));
    assert!(Catalog::new().with(schema).is_err());
}

#[test]
fn missing_reference_target_fails_validation() {
    let catalog = Catalog::new().with(team()).unwrap();
    assert!(matches!(
        catalog.validate(),
        Err(VestigeError::UnknownEntity(name)) if name == "city"
    ));
}

#[test]
fn many_to_many_registers_join_table() {
    let professor = EntitySchema::versioned("professor")
        .attribute("name", ValueKind::Text)
        .many_to_many(ManyToMany::new("students", "student").related_name("professors"));
    let student = EntitySchema::versioned("student").attribute("name", ValueKind::Text);
    let catalog = Catalog::new()
        .with(professor)
        .unwrap()
        .with(student)
        .unwrap();
    catalog.validate().unwrap();

    let through = catalog.entity("professor_students").unwrap();
    assert!(through.is_auto_created());
    assert_eq!(through.column_kind("professor_id"), Some(ValueKind::Key));
    assert_eq!(through.column_kind("student_id"), Some(ValueKind::Key));

    let forward = catalog.relation_end("professor", "students").unwrap();
    assert_eq!(forward.near_column, "professor_id");
    assert_eq!(forward.far_column, "student_id");
    assert_eq!(forward.far_entity, "student");

    let reverse = catalog.relation_end("student", "professors").unwrap();
    assert_eq!(reverse.near_column, "student_id");
    assert_eq!(reverse.far_entity, "professor");

    let joins = catalog.join_columns("student");
    assert_eq!(joins, vec![("professor_students".to_string(), "student_id".to_string())]);
}

#[test]
fn self_referential_relation_gets_directional_columns() {
    let person = EntitySchema::versioned("person")
        .attribute("name", ValueKind::Text)
        .many_to_many(ManyToMany::new("friends", "person").symmetrical());
    let catalog = Catalog::new().with(person).unwrap();
    catalog.validate().unwrap();

    let end = catalog.relation_end("person", "friends").unwrap();
    assert_eq!(end.near_column, "from_person_id");
    assert_eq!(end.far_column, "to_person_id");
    assert!(end.symmetrical);
    assert_eq!(catalog.relation_ends("person").len(), 1);
    assert_eq!(catalog.join_columns("person").len(), 2);
}

#[test]
fn symmetrical_requires_self_reference() {
    let schema = EntitySchema::versioned("professor")
        .many_to_many(ManyToMany::new("students", "student").symmetrical());
    assert!(Catalog::new().with(schema).is_err());
}

#[test]
fn generated_ddl_carries_current_only_indexes() {
    let schema = EntitySchema::versioned("team")
        .attribute("name", ValueKind::Text)
        .optional_attribute("motto", ValueKind::Text)
        .unique_when_current(["name"]);
    let table = schema.table_def();
    let names: Vec<&str> = table.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["id", "identity", "valid_from", "valid_until", "born_at", "name", "motto"]
    );
    assert!(table.columns[0].primary_key);
    assert!(table.columns[3].nullable);
    assert!(!table.columns[5].nullable);
    assert!(table.columns[6].nullable);

    let indexes = schema.index_defs();
    let identity = indexes
        .iter()
        .find(|i| i.name == "team_current_identity_uniq")
        .unwrap();
    assert!(identity.unique && identity.current_only);
    let name = indexes
        .iter()
        .find(|i| i.name == "team_name_current_uniq")
        .unwrap();
    assert!(name.unique && name.current_only);
}

#[test]
fn plain_entities_skip_versioning_indexes() {
    let schema = EntitySchema::plain("tag").attribute("label", ValueKind::Text);
    assert!(!schema.is_versioned());
    assert!(schema.index_defs().is_empty());
}
