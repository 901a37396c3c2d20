//! Cascading soft delete: policies, protection and join-table cleanup.

mod common;

use common::*;
use vestige_core::{QueryTime, Value, VersionRow, VestigeError};
use vestige_temporal::{Filter, VersionEngine};

fn library(engine: &VersionEngine, name: &str) -> VersionRow {
    engine.create_at("library", days_ago(5), named(name)).unwrap()
}

fn shelf(engine: &VersionEngine, label: &str, library: &VersionRow) -> VersionRow {
    engine
        .create_at(
            "shelf",
            days_ago(5),
            [("label", Value::from(label)), ("library", Value::Key(library.identity()))],
        )
        .unwrap()
}

fn book(
    engine: &VersionEngine,
    title: &str,
    library: &VersionRow,
    shelf: Option<&VersionRow>,
) -> VersionRow {
    let shelf = shelf.map(|s| Value::Key(s.identity())).unwrap_or(Value::Null);
    engine
        .create_at(
            "book",
            days_ago(5),
            [
                ("title", Value::from(title)),
                ("library", Value::Key(library.identity())),
                ("shelf", shelf),
            ],
        )
        .unwrap()
}

// ─── Soft delete ─────────────────────────────────────────────────────────────

#[test]
fn delete_terminates_instead_of_removing() {
    let engine = engine();
    let t0 = days_ago(3);
    let oslo = city(&engine, "Oslo", t0);
    let at = days_ago(1);
    assert_eq!(engine.delete_at(&oslo, at).unwrap(), 1);

    assert_eq!(engine.query("city").current().count().unwrap(), 0);
    let stored = engine.query("city").unbounded().get().unwrap();
    assert_eq!(stored.valid_until(), Some(at));
    assert_eq!(stored.key(), oslo.identity());
    assert!(engine.query("city").as_of(Some(t0)).exists().unwrap());
}

#[test]
fn delete_refuses_historical_or_already_deleted_rows() {
    let engine = engine();
    let mut row = city(&engine, "v1", days_ago(3));
    let head = engine.clone_at(&mut row, days_ago(2)).unwrap();
    assert!(matches!(
        engine.delete(&row),
        Err(VestigeError::AlreadyTerminated { .. })
    ));
    engine.delete(&head).unwrap();
    assert!(matches!(
        engine.delete(&head),
        Err(VestigeError::AlreadyTerminated { .. })
    ));
}

// ─── Policies ────────────────────────────────────────────────────────────────

#[test]
fn cascade_reaches_transitive_referrers() {
    let engine = engine();
    let t0 = days_ago(5);
    let rome = city(&engine, "Rome", t0);
    let wolves = team(&engine, "Wolves", Some(&rome), t0);
    team(&engine, "Eagles", Some(&rome), t0);
    engine
        .create("ticket", [("seat", Value::from("A1")), ("team", Value::Key(wolves.identity()))])
        .unwrap();

    // city, two teams, one ticket
    assert_eq!(engine.delete(&rome).unwrap(), 4);
    assert_eq!(engine.query("team").current().count().unwrap(), 0);
    assert_eq!(engine.query("team").unbounded().count().unwrap(), 2);
    // plain rows are removed outright
    assert_eq!(engine.query("ticket").count().unwrap(), 0);
}

#[test]
fn set_null_versions_the_referrer() {
    let engine = engine();
    let t0 = days_ago(5);
    let owls = team(&engine, "Owls", None, t0);
    let ann = player(&engine, "Ann", Some(&owls), t0);
    let at = days_ago(1);
    assert_eq!(engine.delete_at(&owls, at).unwrap(), 1);

    let now = engine.query("player").current().get().unwrap();
    assert_eq!(now.get("team"), Some(&Value::Null));
    assert_eq!(now.valid_from(), at);
    assert_eq!(now.key(), ann.identity());

    let before = engine
        .query("player")
        .as_of(Some(days_ago(2)))
        .get()
        .unwrap();
    assert_eq!(before.get("team"), Some(&Value::Key(owls.identity())));
    assert_eq!(name_of(&engine.resolve(&before, "team").unwrap().unwrap()), "Owls");
}

#[test]
fn set_default_points_at_the_fallback() {
    let engine = engine();
    let t0 = days_ago(5);
    let free_agents = engine
        .create_with_key(
            "team",
            FREE_AGENTS,
            [("name", Value::from("Free Agents")), ("city", Value::Null)],
        )
        .unwrap();
    let owls = team(&engine, "Owls", None, t0);
    engine
        .create_at(
            "sponsor",
            t0,
            [("name", Value::from("Acme")), ("team", Value::Key(owls.identity()))],
        )
        .unwrap();

    engine.delete(&owls).unwrap();
    let sponsor = engine.query("sponsor").current().get().unwrap();
    assert_eq!(sponsor.get("team"), Some(&Value::Key(free_agents.identity())));
    assert_eq!(engine.query("sponsor").unbounded().count().unwrap(), 2);
}

#[test]
fn no_action_leaves_referrers_dangling() {
    let engine = engine();
    let owls = team(&engine, "Owls", None, days_ago(5));
    engine
        .create_at(
            "fan",
            days_ago(4),
            [("name", Value::from("Fay")), ("team", Value::Key(owls.identity()))],
        )
        .unwrap();
    assert_eq!(engine.delete(&owls).unwrap(), 1);
    let fan = engine.query("fan").current().get().unwrap();
    assert_eq!(fan.get("team"), Some(&Value::Key(owls.identity())));
    assert_eq!(engine.query("fan").unbounded().count().unwrap(), 1);
}

// ─── Protection ──────────────────────────────────────────────────────────────

#[test]
fn protected_reference_blocks_the_whole_delete() {
    let engine = engine();
    let lib = library(&engine, "Central");
    let shelf = shelf(&engine, "A", &lib);
    book(&engine, "Dune", &lib, None);

    let err = engine.delete(&lib).unwrap_err();
    assert!(matches!(
        err,
        VestigeError::ProtectedReference { ref referrer, ref reference, .. }
            if referrer == "book" && reference == "library"
    ));
    // nothing was written, not even the cascade to the shelf
    assert_eq!(engine.query("library").current().count().unwrap(), 1);
    assert_eq!(engine.query("shelf").current().count().unwrap(), 1);
    let kept = engine.query("shelf").current().get().unwrap();
    assert_eq!(kept.identity(), shelf.identity());
}

#[test]
fn protection_by_a_row_in_the_cascade_is_ignored() {
    let engine = engine();
    let lib = library(&engine, "Central");
    let shelf = shelf(&engine, "A", &lib);
    book(&engine, "Dune", &lib, Some(&shelf));

    // library, shelf, and the book reached through the shelf
    assert_eq!(engine.delete(&lib).unwrap(), 3);
    assert_eq!(engine.query("book").current().count().unwrap(), 0);
}

// ─── Associations ────────────────────────────────────────────────────────────

#[test]
fn delete_terminates_associations_on_both_sides() {
    let engine = engine();
    let prof = engine.create_at("professor", days_ago(5), named("Turing")).unwrap();
    let ada = engine.create_at("student", days_ago(5), named("Ada")).unwrap();
    let bob = engine.create_at("student", days_ago(5), named("Bob")).unwrap();
    engine.add_at(&prof, "students", &[&ada, &bob], days_ago(4)).unwrap();

    engine.delete(&ada).unwrap();
    assert_eq!(names(&engine.related(&prof, "students").unwrap()), vec!["Bob"]);
    let before = prof.clone().with_query_time(QueryTime::AsOf(days_ago(1)));
    assert_eq!(names(&engine.related(&before, "students").unwrap()), vec!["Ada", "Bob"]);

    engine.delete(&prof).unwrap();
    let open = engine
        .query("professor_students")
        .current()
        .count()
        .unwrap();
    assert_eq!(open, 0);
    assert!(engine.related(&bob, "professors").unwrap().is_empty());
}

// ─── Query sets ──────────────────────────────────────────────────────────────

#[test]
fn query_delete_terminates_only_current_matches() {
    let engine = engine();
    let t0 = days_ago(5);
    let mut a = city(&engine, "Alpha", t0);
    engine.revise(&mut a, [("name", Value::from("Alpha 2"))]).unwrap();
    city(&engine, "Beta", t0);
    city(&engine, "Gamma", t0);

    let deleted = engine
        .query("city")
        .filter(Filter::lt("name", "Gamma"))
        .delete()
        .unwrap();
    assert_eq!(deleted, 2);
    assert_eq!(names(&engine.query("city").current().fetch().unwrap()), vec!["Gamma"]);
    assert_eq!(engine.query("city").unbounded().count().unwrap(), 4);
}

#[test]
fn plain_rows_are_deleted_directly() {
    let engine = engine();
    let owls = team(&engine, "Owls", None, days_ago(3));
    let ticket = engine
        .create("ticket", [("seat", Value::from("B2")), ("team", Value::Key(owls.identity()))])
        .unwrap();
    assert_eq!(engine.delete(&ticket).unwrap(), 1);
    assert_eq!(engine.query("ticket").count().unwrap(), 0);
    assert_eq!(engine.query("team").current().count().unwrap(), 1);
}
