//! Walking the version chain: next, previous, current and point lookups.

mod common;

use chrono::Duration;

use common::*;
use vestige_core::{QueryTime, Value, VersionRow, VestigeError};
use vestige_temporal::{RelationsAsOf, VersionEngine};

/// Three versions named v1, v2, v3 starting 6, 4 and 2 days ago.
fn chain(engine: &VersionEngine) -> Vec<VersionRow> {
    let mut first = city(engine, "v1", days_ago(6));
    let mut second = engine.clone_at(&mut first, days_ago(4)).unwrap();
    second.set("name", "v2");
    engine.save(&mut second).unwrap();
    let mut third = engine.clone_at(&mut second, days_ago(2)).unwrap();
    third.set("name", "v3");
    engine.save(&mut third).unwrap();
    vec![first, second, third]
}

#[test]
fn next_version_walks_forward() {
    let engine = engine();
    let versions = chain(&engine);

    let next = engine.next_version(&versions[0], RelationsAsOf::End).unwrap();
    assert_eq!(name_of(&next), "v2");
    assert_eq!(next.key(), versions[1].key());
    assert_eq!(
        next.query_time(),
        QueryTime::AsOf(versions[1].valid_until().unwrap() - Duration::microseconds(1))
    );

    let last = engine.next_version(&next, RelationsAsOf::Start).unwrap();
    assert_eq!(name_of(&last), "v3");
    assert_eq!(last.query_time(), QueryTime::AsOf(last.valid_from()));

    // the current version is its own next
    let same = engine.next_version(&last, RelationsAsOf::End).unwrap();
    assert_eq!(same.key(), last.key());
    assert_eq!(same.query_time(), QueryTime::Current);
}

#[test]
fn previous_version_walks_backward() {
    let engine = engine();
    let versions = chain(&engine);

    let prev = engine
        .previous_version(&versions[2], RelationsAsOf::Unbounded)
        .unwrap();
    assert_eq!(name_of(&prev), "v2");
    assert_eq!(prev.query_time(), QueryTime::Unbounded);

    let first = engine.previous_version(&prev, RelationsAsOf::End).unwrap();
    assert_eq!(name_of(&first), "v1");
    // the first version is its own previous
    let same = engine.previous_version(&first, RelationsAsOf::End).unwrap();
    assert_eq!(same.key(), first.key());
}

#[test]
fn explicit_relation_time_must_be_inside_the_version() {
    let engine = engine();
    let versions = chain(&engine);
    let inside = days_ago(3);
    let next = engine
        .next_version(&versions[0], RelationsAsOf::At(inside))
        .unwrap();
    assert_eq!(next.query_time(), QueryTime::AsOf(inside));

    assert!(matches!(
        engine.next_version(&versions[0], RelationsAsOf::At(days_ago(5))),
        Err(VestigeError::InvalidArgument(_))
    ));
}

#[test]
fn current_version_follows_the_identity() {
    let engine = engine();
    let versions = chain(&engine);

    let current = engine
        .current_version(&versions[0], RelationsAsOf::Unbounded, false)
        .unwrap()
        .unwrap();
    assert_eq!(name_of(&current), "v3");

    // a current row is returned as held unless storage is checked
    let mut held = versions[2].clone();
    held.set("name", "unsaved");
    let unchecked = engine
        .current_version(&held, RelationsAsOf::End, false)
        .unwrap()
        .unwrap();
    assert_eq!(name_of(&unchecked), "unsaved");
    let checked = engine
        .current_version(&held, RelationsAsOf::End, true)
        .unwrap()
        .unwrap();
    assert_eq!(name_of(&checked), "v3");

    engine.delete(&versions[2]).unwrap();
    assert!(engine
        .current_version(&versions[0], RelationsAsOf::End, false)
        .unwrap()
        .is_none());
}

#[test]
fn next_version_of_a_deleted_object_is_not_found() {
    let engine = engine();
    let row = city(&engine, "only", days_ago(3));
    engine.delete_at(&row, days_ago(1)).unwrap();
    let deleted = engine.query("city").unbounded().get().unwrap();
    assert!(matches!(
        engine.next_version(&deleted, RelationsAsOf::End),
        Err(VestigeError::ObjectNotFound { .. })
    ));
}

#[test]
fn version_at_finds_the_version_valid_at_an_instant() {
    let engine = engine();
    let versions = chain(&engine);
    let identity = versions[0].identity();

    let at = |days| {
        engine
            .version_at("city", identity, days_ago(days))
            .unwrap()
            .map(|row| name_of(&row).to_string())
    };
    assert_eq!(at(7), None);
    assert_eq!(at(5).as_deref(), Some("v1"));
    assert_eq!(at(3).as_deref(), Some("v2"));
    assert_eq!(at(1).as_deref(), Some("v3"));

    // the boundary belongs to the newer version
    let boundary = engine
        .version_at("city", identity, versions[1].valid_from())
        .unwrap()
        .unwrap();
    assert_eq!(boundary.key(), versions[1].key());

    let ticket_err = engine.version_at("ticket", identity, days_ago(1)).unwrap_err();
    assert!(matches!(ticket_err, VestigeError::InvalidState(_)));
}

#[test]
fn relations_follow_the_navigated_version() {
    let engine = engine();
    let t0 = days_ago(6);
    let owls = team(&engine, "Owls", None, t0);
    let hawks = team(&engine, "Hawks", None, t0);
    let mut ann = player(&engine, "Ann", Some(&owls), t0);
    engine
        .revise(&mut ann, [("team", Value::Key(hawks.identity()))])
        .unwrap();

    let first = engine.query("player").as_of(Some(days_ago(5))).get().unwrap();
    let team_then = engine.resolve(&first, "team").unwrap().unwrap();
    assert_eq!(name_of(&team_then), "Owls");

    let next = engine.next_version(&first, RelationsAsOf::End).unwrap();
    assert_eq!(name_of(&engine.resolve(&next, "team").unwrap().unwrap()), "Hawks");
}
