// Cannabis Registry - tests/e2e_registry.rs
//
// End-to-end tests from a registry CSV on disk to the panels the dashboard
// renders, plus the SQLite snapshot and registry.toml round trips.

use cannabis_registry::{
    insert_records, last_import, load_store, setup_database, AgeClass, Column, Config,
    DashboardSettings, FilterEngine, LoadError, Overview, OwnerLookup, Panels, RecordStore,
    SelectionState, NO_ENTRIES_MESSAGE,
};
use rusqlite::Connection;
use std::fs;
use std::path::PathBuf;

// =============================================================================
// Helpers
// =============================================================================

/// Absolute path to the on-disk fixture files.
fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn load_sample() -> RecordStore {
    RecordStore::load(&fixture("registry_sample.csv")).unwrap()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn e2e_loads_fixture_and_ignores_extra_columns() {
    let store = load_sample();

    assert_eq!(store.len(), 6);
    assert_eq!(store.source(), Some(fixture("registry_sample.csv").as_path()));
    assert_eq!(
        store.column_values(Column::LicenseCategory),
        strings(&["Retail", "Cultivator", "Delivery"])
    );
    // leading zeros survive
    assert_eq!(store.records()[0].zip_code, "02118");
    // empty coordinates load as missing
    assert_eq!(store.records()[3].position(), None);
}

#[test]
fn e2e_missing_file_is_an_open_error() {
    let result = RecordStore::load(&fixture("does_not_exist.csv"));
    assert!(
        matches!(result, Err(LoadError::Open { .. })),
        "expected Open error, got {result:?}"
    );
}

#[test]
fn e2e_missing_columns_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("partial.csv");
    fs::write(&path, "app_business_name,facility_zip_code\nShop,02118\n").unwrap();

    match RecordStore::load(&path) {
        Err(LoadError::MissingColumns(missing)) => {
            assert!(missing.contains(&"id_full_name".to_string()));
            assert!(!missing.contains(&"app_business_name".to_string()));
        }
        other => panic!("expected MissingColumns, got {other:?}"),
    }
}

// =============================================================================
// Filters and aggregations
// =============================================================================

#[test]
fn e2e_zip_and_status_listing_sorted_with_unnamed_last() {
    let store = load_sample();
    let engine = FilterEngine::new(&store);

    let view = engine.filter_by_zip_and_status(&strings(&["02118", "02119"]), "Active");
    let names: Vec<&str> = view.iter().map(|r| r.display_name()).collect();
    assert_eq!(names, vec!["Apex Cannabis", "Green Leaf Dispensary", "N/A"]);

    assert!(engine
        .filter_by_zip_and_status(&strings(&["02119"]), "Revoked")
        .is_empty());
}

#[test]
fn e2e_business_and_owner_lookups() {
    let store = load_sample();
    let engine = FilterEngine::new(&store);

    assert_eq!(engine.lookup_by_business_name("Harbor Buds").len(), 2);
    assert_eq!(engine.filter_by_category("Retail").len(), 4);

    let owner = engine.lookup_by_owner_name("Maria Santos");
    match OwnerLookup::resolve(&owner) {
        OwnerLookup::Ambiguous { first, matches } => {
            assert_eq!(matches, 2);
            assert_eq!(first.license_no, "LIC-001");
        }
        other => panic!("expected Ambiguous, got {other:?}"),
    }

    let nobody = engine.lookup_by_owner_name("Nobody");
    assert!(matches!(OwnerLookup::resolve(&nobody), OwnerLookup::NotFound));
}

#[test]
fn e2e_overview_totals_and_shares() {
    let store = load_sample();
    let overview = Overview::compute(&store, &DashboardSettings::default());

    let pivot = &overview.pivot;
    assert_eq!(pivot.count("Retail", "Active"), 4);
    assert_eq!(pivot.count("Cultivator", "Active"), 0);
    assert_eq!(pivot.count("Total", "Active"), 5);
    assert_eq!(pivot.count("Total", "Total"), 6);

    // the blank equity cell is not part of the donut
    let equity: Vec<(&str, String)> = overview
        .equity_program
        .iter()
        .map(|s| (s.label.as_str(), s.percent_label()))
        .collect();
    assert_eq!(
        equity,
        vec![("No", "60.0%".to_string()), ("Yes", "40.0%".to_string())]
    );

    assert_eq!(overview.license_status[0].legend_label(), "Active - 83.3%");
    assert_eq!(overview.grid.iter().map(|c| c.count).sum::<usize>(), 5);
}

#[test]
fn e2e_panels_for_a_full_selection() {
    let store = load_sample();
    let engine = FilterEngine::new(&store);
    let selection = SelectionState {
        age: 18,
        category: Some("Retail".to_string()),
        zip_codes: strings(&["02120"]),
        license_status: Some("Active".to_string()),
        business_name: Some("Harbor Buds".to_string()),
        owner_name: Some("Lee Wong".to_string()),
    };

    let panels = Panels::compute(&engine, &selection, &DashboardSettings::default());

    assert_eq!(panels.age_class, AgeClass::Minor);
    assert_eq!(panels.category_points.len(), 4);
    assert_eq!(panels.listing.len(), 2);
    assert_eq!(
        panels.facilities,
        strings(&[
            "Facility Address: 3 Atlantic Ave-02120",
            "Facility Address: 7 Atlantic Ave-02120",
        ])
    );
    assert_eq!(panels.owner.summary(), "Business Name: N/A\n - LIC-004");
}

#[test]
fn e2e_initial_selection_lists_nothing() {
    let store = load_sample();
    let engine = FilterEngine::new(&store);
    let selection = SelectionState::initial(&store);

    assert_eq!(selection.category.as_deref(), Some("Retail"));
    assert_eq!(selection.owner_name.as_deref(), Some("Maria Santos"));

    let panels = Panels::compute(&engine, &selection, &DashboardSettings::default());
    assert!(panels.listing_is_empty());
    assert_eq!(NO_ENTRIES_MESSAGE, "No entries found for the selected conditions.");
    assert_eq!(panels.age_class, AgeClass::Adult);
    assert!(panels.owner.is_ambiguous());
}

// =============================================================================
// Snapshot and config
// =============================================================================

#[test]
fn e2e_snapshot_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("registry.db");
    let store = load_sample();

    {
        let mut conn = Connection::open(&db_path).unwrap();
        setup_database(&conn).unwrap();
        let first = insert_records(&mut conn, store.records(), "registry_sample.csv").unwrap();
        assert_eq!(first.rows_inserted, 6);

        let again = insert_records(&mut conn, store.records(), "registry_sample.csv").unwrap();
        assert_eq!(again.duplicates(), 6);
        assert_eq!(last_import(&conn).unwrap().unwrap().rows_inserted, 0);
    }

    let reloaded = load_store(&db_path).unwrap();
    assert_eq!(reloaded.records(), store.records());
}

#[test]
fn e2e_config_file_overrides_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("registry.toml");
    fs::write(
        &path,
        r#"
[data]
csv_path = "tests/fixtures/registry_sample.csv"
datasheet_rows = 3

[map]
cell_size_m = 500.0

[server]
bind = "127.0.0.1:8080"
"#,
    )
    .unwrap();

    let config = Config::load(Some(path.as_path())).unwrap();
    let settings = config.dashboard_settings();
    assert_eq!(settings.datasheet_rows, 3);
    assert_eq!(settings.grid_cell_size_m, 500.0);
    assert_eq!(settings.grid_zoom, 11);
    assert_eq!(config.bind_addr().unwrap().port(), 8080);

    assert!(Config::load(Some(dir.path().join("missing.toml").as_path())).is_err());
}
