//! Time-travel queries: temporal predicates per hop, lookup paths,
//! deferred rows and prefetching.

mod common;

use chrono::Duration;

use common::*;
use vestige_core::{QueryTime, Value, VestigeError};
use vestige_temporal::Filter;

// ─── Query time ──────────────────────────────────────────────────────────────

#[test]
fn as_of_none_means_current() {
    let engine = engine();
    let mut row = city(&engine, "v1", days_ago(3));
    engine.revise(&mut row, [("name", Value::from("v2"))]).unwrap();

    let current = engine.query("city").as_of(None).fetch().unwrap();
    assert_eq!(names(&current), vec!["v2"]);
    assert_eq!(current[0].query_time(), QueryTime::Current);
    assert_eq!(engine.query("city").unbounded().count().unwrap(), 2);
}

#[test]
fn rows_carry_the_time_they_were_queried_at() {
    let engine = engine();
    let t0 = days_ago(3);
    city(&engine, "Oslo", t0);
    let row = engine.query("city").as_of(Some(t0)).get().unwrap();
    assert_eq!(row.query_time(), QueryTime::AsOf(t0));
}

// ─── Lookup paths ────────────────────────────────────────────────────────────

#[test]
fn forward_reference_hop_uses_the_same_time() {
    let engine = engine();
    let t0 = days_ago(10);
    let t1 = days_ago(5);
    let mut berlin = city(&engine, "Berlin", t0);
    team(&engine, "Bears", Some(&berlin), t0);

    let mut renamed = engine.clone_at(&mut berlin, t1).unwrap();
    renamed.set("name", "Berlin-Mitte");
    engine.save(&mut renamed).unwrap();

    let old = engine
        .query("team")
        .as_of(Some(t0))
        .filter(Filter::eq("city.name", "Berlin"))
        .fetch()
        .unwrap();
    assert_eq!(names(&old), vec!["Bears"]);

    let now = engine
        .query("team")
        .current()
        .filter(Filter::eq("city.name", "Berlin"))
        .count()
        .unwrap();
    assert_eq!(now, 0);
    let now = engine
        .query("team")
        .current()
        .filter(Filter::eq("city.name", "Berlin-Mitte"))
        .count()
        .unwrap();
    assert_eq!(now, 1);
}

#[test]
fn two_hop_path_joins_each_table_once() {
    let engine = engine();
    let t0 = days_ago(3);
    let paris = city(&engine, "Paris", t0);
    let rome = city(&engine, "Rome", t0);
    let lions = team(&engine, "Lions", Some(&paris), t0);
    let wolves = team(&engine, "Wolves", Some(&rome), t0);
    player(&engine, "Ann", Some(&lions), t0);
    player(&engine, "Bob", Some(&wolves), t0);
    player(&engine, "Cid", None, t0);

    let rows = engine
        .query("player")
        .current()
        .filter(Filter::or([
            Filter::eq("team.city.name", "Paris"),
            Filter::eq("team.name", "Wolves"),
        ]))
        .order_by("-name")
        .fetch()
        .unwrap();
    let ordered: Vec<&str> = rows.iter().map(name_of).collect();
    assert_eq!(ordered, vec!["Bob", "Ann"]);

    let teamless = engine
        .query("player")
        .current()
        .filter(Filter::is_null("team", true))
        .get()
        .unwrap();
    assert_eq!(name_of(&teamless), "Cid");
}

#[test]
fn reverse_reference_path_returns_each_row_once() {
    let engine = engine();
    let t0 = days_ago(3);
    let owls = team(&engine, "Owls", None, t0);
    team(&engine, "Hawks", None, t0);
    for name in ["Ann", "Amy", "Bob"] {
        player(&engine, name, Some(&owls), t0);
    }

    let query = engine
        .query("team")
        .current()
        .filter(Filter::gte("players.name", "A"))
        .filter(Filter::lt("players.name", "B"));
    assert_eq!(names(&query.fetch().unwrap()), vec!["Owls"]);
    assert_eq!(query.count().unwrap(), 1);
    assert!(query.exists().unwrap());
}

#[test]
fn refers_to_matches_any_version_of_the_target() {
    let engine = engine();
    let t0 = days_ago(4);
    let mut owls = team(&engine, "Owls", None, t0);
    player(&engine, "Ann", Some(&owls), t0);
    engine.clone_at(&mut owls, days_ago(2)).unwrap();
    assert!(owls.is_terminated());

    // the historical team row has a different key but the same identity
    let found = engine
        .query("player")
        .current()
        .filter(Filter::refers_to("team", &owls))
        .get()
        .unwrap();
    assert_eq!(name_of(&found), "Ann");

    let by_key = engine
        .query("player")
        .current()
        .filter(Filter::eq("team", owls.key()))
        .count()
        .unwrap();
    assert_eq!(by_key, 0);
}

#[test]
fn filters_compose_with_not_and_in() {
    let engine = engine();
    let t0 = days_ago(1);
    for name in ["Ada", "Bea", "Cy", "Dee"] {
        engine
            .create_at("player", t0, [("name", Value::from(name))])
            .unwrap();
    }
    let rows = engine
        .query("player")
        .current()
        .filter(Filter::and([
            Filter::is_in("name", ["Ada", "Bea", "Cy"]),
            Filter::not(Filter::eq("name", "Bea")),
        ]))
        .order_by("name")
        .fetch()
        .unwrap();
    let ordered: Vec<&str> = rows.iter().map(name_of).collect();
    assert_eq!(ordered, vec!["Ada", "Cy"]);

    let none = engine
        .query("player")
        .filter(Filter::is_in("name", Vec::<&str>::new()))
        .count()
        .unwrap();
    assert_eq!(none, 0);
}

#[test]
fn unknown_path_segment_is_reported() {
    let engine = engine();
    let err = engine
        .query("player")
        .filter(Filter::eq("team.stadium.name", "x"))
        .fetch()
        .unwrap_err();
    assert!(matches!(
        err,
        VestigeError::UnknownField { ref entity, ref field } if entity == "team" && field == "stadium"
    ));
}

// ─── Terminals ───────────────────────────────────────────────────────────────

#[test]
fn get_distinguishes_missing_and_ambiguous() {
    let engine = engine();
    assert!(matches!(
        engine.query("city").get(),
        Err(VestigeError::ObjectNotFound { .. })
    ));
    city(&engine, "A", days_ago(1));
    city(&engine, "B", days_ago(1));
    assert!(matches!(
        engine.query("city").get(),
        Err(VestigeError::AmbiguousVersion { .. })
    ));
}

#[test]
fn limit_caps_fetch_and_count() {
    let engine = engine();
    for i in 0..5 {
        city(&engine, &format!("c{i}"), days_ago(1));
    }
    let query = engine.query("city").order_by("name").limit(3);
    assert_eq!(query.fetch().unwrap().len(), 3);
    assert_eq!(query.count().unwrap(), 3);
    assert_eq!(name_of(&query.first().unwrap().unwrap()), "c0");
}

// ─── Deferred rows ───────────────────────────────────────────────────────────

#[test]
fn only_loads_deferred_rows_that_cannot_be_cloned() {
    let engine = engine();
    let owls = team(&engine, "Owls", None, days_ago(2));
    player(&engine, "Ann", Some(&owls), days_ago(1));

    let mut rows = engine.query("player").current().only(["name"]).fetch().unwrap();
    let row = &mut rows[0];
    assert!(row.is_deferred());
    assert_eq!(name_of(row), "Ann");
    assert!(row.get("team").is_none());
    assert!(matches!(
        engine.resolve(row, "team"),
        Err(VestigeError::InvalidState(_))
    ));
    assert!(matches!(
        engine.clone(row),
        Err(VestigeError::InvalidState(_))
    ));

    assert!(matches!(
        engine.query("player").only(["salary"]).fetch(),
        Err(VestigeError::UnknownField { .. })
    ));
}

// ─── Prefetch ────────────────────────────────────────────────────────────────

#[test]
fn select_related_prefetches_at_the_query_time() {
    let engine = engine();
    let t0 = days_ago(10);
    let t1 = days_ago(5);
    let mut owls = team(&engine, "Owls", None, t0);
    player(&engine, "Ann", Some(&owls), t0);
    let mut renamed = engine.clone_at(&mut owls, t1).unwrap();
    renamed.set("name", "Night Owls");
    engine.save(&mut renamed).unwrap();

    let ann = engine
        .query("player")
        .as_of(Some(t0 + Duration::days(1)))
        .select_related(["team"])
        .get()
        .unwrap();
    let cached = ann.cached_related("team").unwrap();
    assert_eq!(name_of(cached), "Owls");
    assert_eq!(name_of(&engine.resolve(&ann, "team").unwrap().unwrap()), "Owls");

    let ann_now = engine
        .query("player")
        .current()
        .select_related(["team"])
        .get()
        .unwrap();
    assert_eq!(name_of(ann_now.cached_related("team").unwrap()), "Night Owls");

    assert!(matches!(
        engine.query("player").select_related(["coach"]).fetch(),
        Err(VestigeError::UnknownField { .. })
    ));
}
