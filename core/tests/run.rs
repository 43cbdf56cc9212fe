//! End-to-end run tests.
//!
//! Tests cover: the full classify-then-measure run, incremental runs,
//! history carried between runs, persisted boundaries, per-region failure
//! isolation, the shipped data/ configuration, persisted member states,
//! page size against the store's row ceiling.

use chrono::NaiveDate;
use regionscope_core::{
    assignment::{AssignmentEngine, AssignmentMethod, LocationRecord},
    config::RegionConfig,
    engine::{RegionEngine, RunOptions},
    error::RegionError,
    geometry::{rectangle, BoundaryGeometry},
    store::{RegionStore, SiteKind},
};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()
}

fn day(month: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, d).unwrap()
}

fn located(lat: f64, lon: f64) -> LocationRecord {
    LocationRecord { latitude: Some(lat), longitude: Some(lon), ..Default::default() }
}

fn seed(store: &RegionStore) {
    store.insert_event(1, &located(30.27, -97.74), day(3, 1)).unwrap();
    store.insert_event(2, &located(34.05, -118.24), day(4, 2)).unwrap();
    store
        .insert_event(
            3,
            &LocationRecord {
                address: Some("1789 McGuckian St, Annapolis, Maryland, 21401".into()),
                ..Default::default()
            },
            day(5, 3),
        )
        .unwrap();
    store
        .insert_event(
            4,
            &LocationRecord { name: Some("NorCal Open".into()), ..Default::default() },
            day(6, 4),
        )
        .unwrap();
    store
        .insert_event(
            5,
            &LocationRecord { name: Some("Mystery Meetup".into()), ..Default::default() },
            day(6, 5),
        )
        .unwrap();
    store.insert_club(1, &located(29.76, -95.37)).unwrap();
    store.insert_participation(1, 1, "alice").unwrap();
    store.insert_participation(2, 1, "bob").unwrap();
    store.insert_participation(3, 2, "carol").unwrap();
}

fn build(run_id: &str) -> RegionEngine {
    RegionEngine::build_test(run_id.to_string()).expect("build test engine")
}

#[test]
fn full_run_classifies_and_measures() {
    let engine = build("run-full");
    seed(engine.store());

    let report = engine.run(as_of(), RunOptions::default()).unwrap();
    assert!(!report.has_failures());

    let events = &report.classifications[0];
    assert_eq!(events.kind, SiteKind::Event);
    assert_eq!(events.considered, 5);
    assert_eq!(events.assigned, 4);
    assert_eq!(events.unassigned, 1);
    assert_eq!(events.by_method.get("coordinates"), Some(&2));
    assert_eq!(events.by_method.get("address"), Some(&1));
    assert_eq!(events.by_method.get("name"), Some(&1));
    assert_eq!(events.by_method.get("none"), Some(&1));

    let store = engine.store();
    let by_address = store.site_assignment(SiteKind::Event, 3).unwrap().unwrap();
    assert_eq!(by_address.region.as_deref(), Some("DMV"));
    assert_eq!(by_address.confidence, 0.85);
    let by_name = store.site_assignment(SiteKind::Event, 4).unwrap().unwrap();
    assert_eq!(by_name.region.as_deref(), Some("California North Central"));

    let config = RegionConfig::default_test();
    assert_eq!(report.metrics.len(), config.geography.regions.len());
    let texas = store.region_metrics("Texas").unwrap().unwrap();
    assert_eq!(texas.recent_event_count, 1);
    assert_eq!(texas.entity_count, 1);
    assert_eq!(texas.active_participant_count, 2);
    let south = store.region_metrics("California South").unwrap().unwrap();
    assert_eq!(south.recent_event_count, 1);
    let new_england = store.region_metrics("New England").unwrap().unwrap();
    assert!(new_england.unclassifiable);

    let log = store.run_events("run-full").unwrap();
    assert_eq!(log.first().map(|e| e.event_type.as_str()), Some("run_initialized"));
    assert!(log.iter().any(|e| e.event_type == "region_unclassifiable"));
    assert_eq!(
        log.iter().filter(|e| e.event_type == "classification_completed").count(),
        2
    );
}

#[test]
fn second_run_only_revisits_unassigned_rows() {
    let engine = build("run-a");
    seed(engine.store());
    engine.run(as_of(), RunOptions::default()).unwrap();

    let engine = RegionEngine::build("run-b".into(), RegionConfig::default_test(), engine.into_store())
        .unwrap();
    let report = engine.run(as_of(), RunOptions { metrics: false, ..RunOptions::default() }).unwrap();
    assert_eq!(report.classifications[0].considered, 1, "only the unresolved event");
    assert!(report.metrics.is_empty());

    let reassigned = engine.classify_sites(SiteKind::Event, true).unwrap();
    assert_eq!(reassigned.considered, 5);
}

#[test]
fn metrics_are_stable_across_runs() {
    let engine = build("run-1");
    seed(engine.store());
    let first = engine.run(as_of(), RunOptions::default()).unwrap();

    let engine = RegionEngine::build("run-2".into(), RegionConfig::default_test(), engine.into_store())
        .unwrap();
    let second = engine.run(as_of(), RunOptions::default()).unwrap();

    assert_eq!(first.metrics, second.metrics);
    assert_eq!(engine.store().all_region_metrics().unwrap().len(), first.metrics.len());
}

#[test]
fn history_from_earlier_runs_classifies_bare_names() {
    let engine = build("run-history-1");
    engine
        .store()
        .insert_event(
            1,
            &LocationRecord { name: Some("Harbor Open".into()), ..located(30.27, -97.74) },
            day(1, 10),
        )
        .unwrap();
    engine.run(as_of(), RunOptions { metrics: false, ..RunOptions::default() }).unwrap();

    let store = engine.into_store();
    store
        .insert_event(
            2,
            &LocationRecord { name: Some("Harbor Open".into()), ..Default::default() },
            day(2, 10),
        )
        .unwrap();
    let engine = RegionEngine::build("run-history-2".into(), RegionConfig::default_test(), store)
        .unwrap();
    engine.run(as_of(), RunOptions { metrics: false, ..RunOptions::default() }).unwrap();

    let stored = engine.store().site_assignment(SiteKind::Event, 2).unwrap().unwrap();
    assert_eq!(stored.region.as_deref(), Some("Texas"));
    assert_eq!(stored.method, AssignmentMethod::History.as_str());
}

#[test]
fn persisted_boundary_makes_a_region_measurable() {
    let store = RegionStore::in_memory().unwrap();
    store.migrate().unwrap();
    let states = vec!["Connecticut".to_string(), "Massachusetts".to_string()];
    let geometry = BoundaryGeometry::from(&rectangle(-73.8, 41.0, -69.9, 42.9));
    store
        .upsert_region_boundary("New England", &states, Some(&geometry))
        .unwrap();
    store.insert_club(1, &located(42.36, -71.06)).unwrap();

    let engine = RegionEngine::build("run-ne".into(), RegionConfig::default_test(), store).unwrap();
    let report = engine.run(as_of(), RunOptions::default()).unwrap();

    let ne = report.metrics.iter().find(|m| m.region_name == "New England").unwrap();
    assert!(!ne.unclassifiable);
    assert_eq!(ne.entity_count, 1);
    let club = engine.store().site_assignment(SiteKind::Club, 1).unwrap().unwrap();
    assert_eq!(club.region.as_deref(), Some("New England"));
}

fn migrated() -> RegionStore {
    let store = RegionStore::in_memory().unwrap();
    store.migrate().unwrap();
    store
}

fn south_override() -> BoundaryGeometry {
    BoundaryGeometry::from(&rectangle(-121.0, 32.5, -114.1, 35.5))
}

#[test]
fn persisted_boundary_for_a_split_side_stands_alone() {
    let mut config = RegionConfig::default_test();
    config.geography.splits[0].boundary = None;
    let store = migrated();
    store
        .upsert_region_boundary("California South", &["California".to_string()], Some(&south_override()))
        .unwrap();
    store.insert_club(1, &located(34.05, -118.24)).unwrap();

    let engine = RegionEngine::build("run-split-own".into(), config, store).unwrap();
    let report = engine.run(as_of(), RunOptions::default()).unwrap();

    let club = engine.store().site_assignment(SiteKind::Club, 1).unwrap().unwrap();
    assert_eq!(club.region.as_deref(), Some("California South"));
    let south = report.metrics.iter().find(|m| m.region_name == "California South").unwrap();
    assert!(!south.unclassifiable);
    assert_eq!(south.entity_count, 1);
    let north = report.metrics.iter().find(|m| m.region_name == "California North Central").unwrap();
    assert!(north.unclassifiable, "the other side still has no polygon");
}

#[test]
fn persisted_boundary_for_a_split_side_beats_the_split_polygon() {
    let store = migrated();
    store
        .upsert_region_boundary("California South", &["California".to_string()], Some(&south_override()))
        .unwrap();
    store.insert_club(1, &located(34.05, -118.24)).unwrap(); // Los Angeles
    store.insert_club(2, &located(37.77, -122.42)).unwrap(); // San Francisco
    store.insert_club(3, &located(33.0, -124.0)).unwrap(); // south of the line, west of the override

    let engine = RegionEngine::build("run-split-override".into(), RegionConfig::default_test(), store)
        .unwrap();
    let report = engine.run(as_of(), RunOptions::default()).unwrap();

    let region = |id| {
        engine
            .store()
            .site_assignment(SiteKind::Club, id)
            .unwrap()
            .and_then(|a| a.region)
    };
    assert_eq!(region(1).as_deref(), Some("California South"));
    assert_eq!(region(2).as_deref(), Some("California North Central"));
    assert_eq!(region(3), None);

    let count = |name: &str| {
        report.metrics.iter().find(|m| m.region_name == name).map(|m| m.entity_count)
    };
    assert_eq!(count("California South"), Some(1));
    assert_eq!(count("California North Central"), Some(1));
}

#[test]
fn persisted_member_states_drive_addresses_and_population() {
    let store = migrated();
    let states = vec!["Texas".to_string(), "Oklahoma".to_string()];
    store.upsert_region_boundary("Texas", &states, None).unwrap();
    let tulsa = LocationRecord {
        address: Some("Tulsa, Oklahoma 74103".into()),
        ..Default::default()
    };
    store.insert_event(1, &tulsa, day(3, 1)).unwrap();

    let engine = RegionEngine::build("run-members".into(), RegionConfig::default_test(), store).unwrap();
    assert_eq!(engine.context().boundaries.regions_for_state("Oklahoma"), vec!["Texas"]);

    let report = engine.run(as_of(), RunOptions::default()).unwrap();
    let stored = engine.store().site_assignment(SiteKind::Event, 1).unwrap().unwrap();
    assert_eq!(stored.region.as_deref(), Some("Texas"));
    assert_eq!(stored.method, AssignmentMethod::Address.as_str());

    let texas = report.metrics.iter().find(|m| m.region_name == "Texas").unwrap();
    assert!(!texas.unclassifiable, "a stored row without geometry keeps the configured polygon");
    assert_eq!(texas.estimated_population, 29_145_505 + 3_959_353);
}

#[test]
fn page_size_above_the_row_ceiling_is_rejected() {
    let mut config = RegionConfig::default_test();
    config.aggregator.page_size = 2000;
    config.store.max_rows_per_request = 800;
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("row ceiling"), "error: {err}");

    let store = RegionStore::in_memory().unwrap().with_row_ceiling(800);
    store.migrate().unwrap();
    let built = RegionEngine::build("run-ceiling".into(), RegionConfig::default_test(), store);
    assert!(matches!(built, Err(RegionError::InvalidConfig { .. })));

    let store = RegionStore::in_memory().unwrap().with_row_ceiling(1000);
    store.migrate().unwrap();
    assert!(RegionEngine::build("run-ceiling-ok".into(), RegionConfig::default_test(), store).is_ok());
}

#[test]
fn a_failing_region_does_not_stop_the_run() {
    let path = std::env::temp_dir().join(format!("regionscope-fail-{}.db", std::process::id()));
    let _ = std::fs::remove_file(&path);
    let path_str = path.to_str().unwrap().to_string();

    let store = RegionStore::open(&path_str).unwrap();
    store.migrate().unwrap();
    store.insert_event(1, &located(30.27, -97.74), day(3, 1)).unwrap();
    drop(store);
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch("DROP TABLE participation;").unwrap();
    }

    let store = RegionStore::open(&path_str).unwrap();
    let engine = RegionEngine::build("run-fail".into(), RegionConfig::default_test(), store).unwrap();
    let report = engine.run(as_of(), RunOptions { assign: false, ..RunOptions::default() }).unwrap();

    assert!(report.has_failures());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "Texas");
    assert!(report.failed[0].1.contains("attempts"), "reason: {}", report.failed[0].1);
    assert_eq!(report.metrics.len(), RegionConfig::default_test().geography.regions.len() - 1);

    let log = engine.store().run_events("run-fail").unwrap();
    assert!(log.iter().any(|e| e.event_type == "region_failed" && e.payload.contains("Texas")));

    drop(engine);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{path_str}{suffix}"));
    }
}

#[test]
fn runs_are_deterministic() {
    let run = |run_id: &str| {
        let engine = build(run_id);
        seed(engine.store());
        engine.run(as_of(), RunOptions::default()).unwrap();
        (1..=5)
            .map(|id| engine.store().site_assignment(SiteKind::Event, id).unwrap())
            .collect::<Vec<_>>()
    };
    assert_eq!(run("det-a"), run("det-b"));
}

#[test]
fn shipped_data_directory_loads_and_classifies() {
    let data_dir = concat!(env!("CARGO_MANIFEST_DIR"), "/../data");
    let config = RegionConfig::load(data_dir).expect("load data/");
    assert!(config.states.len() >= 51);

    let store = RegionStore::in_memory().unwrap();
    store.migrate().unwrap();
    let engine = RegionEngine::build("run-data".into(), config, store).unwrap();
    let assign = |record: &LocationRecord| AssignmentEngine::default().assign(record, engine.context());

    assert_eq!(
        assign(&located(34.0, -118.2)).region.as_deref(),
        Some("California South")
    );
    assert_eq!(
        assign(&located(37.77, -122.42)).region.as_deref(),
        Some("California North Central")
    );
    assert_eq!(assign(&located(47.61, -122.33)).region.as_deref(), Some("Pacific Northwest"));
    assert_eq!(assign(&located(42.36, -71.06)).region.as_deref(), Some("New England"));

    let annapolis = assign(&LocationRecord {
        address: Some(
            "1789 McGuckian St, Annapolis, Maryland, United States of America, 21401".into(),
        ),
        ..Default::default()
    });
    assert_eq!(annapolis.region.as_deref(), Some("DMV"));
    assert_eq!(annapolis.confidence, 0.85);

    let pittsburgh = assign(&LocationRecord {
        address: Some("600 Grant St, Pittsburgh, PA 15219".into()),
        ..Default::default()
    });
    assert_eq!(pittsburgh.region.as_deref(), Some("Mid-Atlantic"));
}
