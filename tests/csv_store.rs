use std::fs;

use chrono::{Datelike, NaiveDate};
use tempfile::tempdir;

use kpi_report::config::Config;
use kpi_report::session::{CommitOutcome, Session};
use kpi_report::store::{CsvStore, DataStore};
use kpi_report::types::HEADERS;
use kpi_report::{KpiError, PeriodId};

fn id(s: &str) -> PeriodId {
    s.parse().unwrap()
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 12, day).unwrap()
}

#[test]
fn create_seeds_every_weekday_for_every_site() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    let sites = Config::default().sites_for(id("2025-12"));
    assert_eq!(sites.len(), 9);

    store.create_period(id("2025-12"), &sites).unwrap();

    let rows = store.load(id("2025-12")).unwrap();
    assert_eq!(rows.len(), 23 * 9);
    assert!(rows.iter().all(|r| !r.has_data()));
    assert!(rows.iter().all(|r| r.date.weekday().number_from_monday() <= 5));

    let text = fs::read_to_string(store.path_for(id("2025-12"))).unwrap();
    assert_eq!(text.lines().next().unwrap(), HEADERS.join(";"));
    assert!(matches!(
        store.create_period(id("2025-12"), &sites),
        Err(KpiError::PeriodExists(_))
    ));
}

#[test]
fn delete_is_refused_once_a_value_is_entered() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    let sites = vec!["Kassel".to_string(), "Melle".to_string()];
    store.create_period(id("2025-11"), &sites).unwrap();
    store.create_period(id("2025-12"), &sites).unwrap();

    let mut rows = store.load(id("2025-12")).unwrap();
    rows[0].stops = Some(5);
    store.save(id("2025-12"), &rows).unwrap();

    assert!(!store.delete_period(id("2025-12")).unwrap());
    assert!(store.path_for(id("2025-12")).is_file());

    assert!(store.delete_period(id("2025-11")).unwrap());
    assert!(!store.path_for(id("2025-11")).exists());
    assert_eq!(store.list_periods().unwrap(), vec![id("2025-12")]);
}

#[test]
fn list_periods_skips_foreign_files() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    store.save(id("2026-01"), &[]).unwrap();
    store.save(id("2025-12"), &[]).unwrap();
    fs::write(dir.path().join("notes.csv"), "x").unwrap();
    fs::write(dir.path().join("2025-13.csv"), "x").unwrap();
    fs::write(dir.path().join("readme.txt"), "x").unwrap();

    assert_eq!(store.list_periods().unwrap(), vec![id("2025-12"), id("2026-01")]);
}

#[test]
fn import_goes_through_validation_and_persists() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path().join("data")).unwrap();
    store
        .create_period(id("2025-12"), &["Kassel".to_string()])
        .unwrap();

    let file = dir.path().join("import.csv");
    fs::write(
        &file,
        "Datum;Standort;Disponent;Fahrzeuge;Stopps;Unverplante Stopps;Kosten Fuhrpark;Stoppschnitt;Stoppkosten\n\
         01.12.2025;Kassel;Meyer;5;50;1,5;250,00€;;\n\
         02.12.2025;Kassel;;4;40;;1.200,50 €;;\n",
    )
    .unwrap();
    let (raw, errors) = kpi_report::loader::read_raw_file(&file).unwrap();
    assert_eq!(errors, 0);

    let mut session = Session::open(store, id("2025-12"), 20).unwrap();
    let outcome = session.commit(&raw).unwrap();
    assert!(outcome.is_saved());

    let reopened = CsvStore::open(dir.path().join("data")).unwrap();
    let period = reopened.load_period(id("2025-12")).unwrap();
    assert_eq!(period.len(), 2);
    let first = period.get(date(1), "Kassel").unwrap();
    assert_eq!(first.stop_average(), Some(10.0));
    assert_eq!(first.stop_cost(), Some(5.0));
    assert_eq!(first.dispatcher.as_deref(), Some("Meyer"));
    assert_eq!(period.get(date(2), "Kassel").unwrap().stop_cost(), Some(30.01));
}

#[test]
fn rejected_import_leaves_the_file_alone() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    store
        .create_period(id("2025-12"), &["Kassel".to_string()])
        .unwrap();
    let before = fs::read_to_string(store.path_for(id("2025-12"))).unwrap();

    let file = dir.path().join("bad.txt");
    fs::write(
        &file,
        "Datum;Standort;Fahrzeuge;Stopps\n01.12.2025;Kassel;2;-3\n31.02.2025;Kassel;2;3\n",
    )
    .unwrap();
    let (raw, _) = kpi_report::loader::read_raw_file(&file).unwrap();

    let path = store.path_for(id("2025-12"));
    let mut session = Session::open(store, id("2025-12"), 20).unwrap();
    match session.commit(&raw).unwrap() {
        CommitOutcome::Rejected(report) => assert_eq!(report.errors.len(), 2),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(fs::read_to_string(path).unwrap(), before);
}

#[test]
fn undo_restores_the_file_on_disk() {
    let dir = tempdir().unwrap();
    let mut store = CsvStore::open(dir.path()).unwrap();
    store
        .create_period(id("2025-12"), &["Kassel".to_string()])
        .unwrap();

    let mut session = Session::open(store, id("2025-12"), 20).unwrap();
    let row = kpi_report::KpiRow::with_inputs(date(3), "Kassel", Some(2), Some(24), None, Some(120.0));
    session.upsert_row(row).unwrap();
    assert!(session.store().load_period(id("2025-12")).unwrap().has_data());

    assert!(session.undo().unwrap());
    let on_disk = CsvStore::open(dir.path()).unwrap();
    assert!(!on_disk.load_period(id("2025-12")).unwrap().has_data());

    assert!(session.redo().unwrap());
    let restored = on_disk.load_period(id("2025-12")).unwrap();
    assert_eq!(restored.get(date(3), "Kassel").unwrap().stop_cost(), Some(5.0));
}
