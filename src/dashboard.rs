// 🖥️ Dashboard - everything one render pass shows
//
// `Overview` depends only on the store and is computed once. `Panels`
// depends on the selection and is recomputed on every interaction.
// Both are plain data so the terminal UI and the web server share them.

use crate::aggregate::{pivot, PivotTable};
use crate::charts::{column_shares, line_chart, LineChart, Share};
use crate::filter::{FilterEngine, FilteredView, OwnerLookup};
use crate::geo::{grid_layer, scatter_layer, GridCell, MapPoint, MapView};
use crate::record::{Column, Record};
use crate::selection::{AgeClass, SelectionState};
use crate::store::RecordStore;
use serde::Serialize;

/// Shown when the zip code / license status panel has nothing to list.
pub const NO_ENTRIES_MESSAGE: &str = "No entries found for the selected conditions.";

/// Shown when the selected business has no facility on record.
pub const BUSINESS_NOT_FOUND_MESSAGE: &str = "No facility found for this business.";

/// Shown when the selected owner has no business on record.
pub const OWNER_NOT_FOUND_MESSAGE: &str = "No business found for this owner.";

/// Knobs that shape the widgets, usually taken from `registry.toml`.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSettings {
    pub datasheet_rows: usize,
    pub grid_cell_size_m: f64,
    pub grid_zoom: u8,
    pub category_zoom: u8,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            datasheet_rows: 195,
            grid_cell_size_m: 200.0,
            grid_zoom: 11,
            category_zoom: 10,
        }
    }
}

// ============================================================================
// OVERVIEW (selection independent)
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Overview {
    pub total_records: usize,
    /// Donut chart
    pub equity_program: Vec<Share>,
    /// Pie chart
    pub license_status: Vec<Share>,
    /// Category vs status with totals
    pub pivot: PivotTable,
    /// Bar chart, most frequent first
    pub category_counts: Vec<(String, usize)>,
    /// Line chart, one line per status
    pub category_by_status: LineChart,
    pub grid: Vec<GridCell>,
    pub grid_view: Option<MapView>,
}

impl Overview {
    pub fn compute(store: &RecordStore, settings: &DashboardSettings) -> Self {
        let records = store.records();

        Self {
            total_records: store.len(),
            equity_program: column_shares(records, Column::EquityProgram),
            license_status: column_shares(records, Column::LicenseStatus),
            pivot: pivot(records, Column::LicenseCategory, Column::LicenseStatus),
            category_counts: store.aggregate_count(Column::LicenseCategory),
            category_by_status: line_chart(records, Column::LicenseCategory, Column::LicenseStatus),
            grid: grid_layer(records, settings.grid_cell_size_m),
            grid_view: MapView::centred_on(records, settings.grid_zoom),
        }
    }
}

// ============================================================================
// PANELS (selection dependent)
// ============================================================================

/// One business in the zip code / license status listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingEntry {
    pub business_name: String,
    pub address: String,
}

impl ListingEntry {
    fn from_record(record: &Record) -> Self {
        Self {
            business_name: record.display_name().to_string(),
            address: record.display_address().to_string(),
        }
    }
}

/// What the owner panel shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OwnerPanel {
    pub found: bool,
    pub business_name: Option<String>,
    pub license_no: Option<String>,
    /// Number of records for this owner; more than one means ambiguous
    pub matches: usize,
}

impl OwnerPanel {
    fn from_lookup(lookup: &OwnerLookup) -> Self {
        let matches = match lookup {
            OwnerLookup::NotFound => 0,
            OwnerLookup::Unique(_) => 1,
            OwnerLookup::Ambiguous { matches, .. } => *matches,
        };

        match lookup.record() {
            Some(record) => Self {
                found: true,
                business_name: Some(record.display_name().to_string()),
                license_no: Some(record.license_no.clone()),
                matches,
            },
            None => Self {
                found: false,
                business_name: None,
                license_no: None,
                matches,
            },
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        self.matches > 1
    }

    /// Text of the owner panel
    pub fn summary(&self) -> String {
        match (&self.business_name, &self.license_no) {
            (Some(name), Some(license)) => format!("Business Name: {}\n - {}", name, license),
            _ => OWNER_NOT_FOUND_MESSAGE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Panels {
    pub age: u8,
    pub age_class: AgeClass,
    pub age_message: &'static str,
    pub category: Option<String>,
    pub category_points: Vec<MapPoint>,
    pub category_view: Option<MapView>,
    pub listing: Vec<ListingEntry>,
    /// "Facility Address: {address}-{zip}" per facility of the selected business
    pub facilities: Vec<String>,
    /// False when the selected business has no facility on record
    pub business_found: bool,
    pub owner: OwnerPanel,
}

impl Panels {
    pub fn compute(
        engine: &FilterEngine<'_>,
        selection: &SelectionState,
        settings: &DashboardSettings,
    ) -> Self {
        let views = engine.evaluate(selection);
        let age_class = selection.age_class();

        Self {
            age: selection.age,
            age_class,
            age_message: age_class.message(),
            category: selection.category.clone(),
            category_points: scatter_layer(views.category.iter()),
            category_view: MapView::centred_on(views.category.iter(), settings.category_zoom),
            listing: views.zip_status.iter().map(ListingEntry::from_record).collect(),
            facilities: facility_lines(&views.business),
            business_found: !views.business.is_empty(),
            owner: OwnerPanel::from_lookup(&views.owner),
        }
    }

    /// True when the listing panel shows [`NO_ENTRIES_MESSAGE`] instead
    pub fn listing_is_empty(&self) -> bool {
        self.listing.is_empty()
    }

    /// Text of the business panel
    pub fn business_lines(&self) -> Vec<String> {
        if self.business_found {
            self.facilities.clone()
        } else {
            vec![BUSINESS_NOT_FOUND_MESSAGE.to_string()]
        }
    }
}

/// Sidebar lines for a business: every facility address with its zip code.
pub fn facility_lines(view: &FilteredView<'_>) -> Vec<String> {
    view.iter()
        .map(|r| format!("Facility Address: {}-{}", r.display_address(), r.zip_code))
        .collect()
}

/// Raw datasheet rows.
pub fn datasheet<'a>(store: &'a RecordStore, settings: &DashboardSettings) -> &'a [Record] {
    store.head(settings.datasheet_rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::create_test_record;

    fn store() -> RecordStore {
        let mut records = vec![
            create_test_record(Some("Zed Shop"), "02118", "Active", "Retail", "Ann Lee"),
            create_test_record(Some("Acme Shop"), "02118", "Active", "Retail", "Bo Diaz"),
            create_test_record(Some("Zed Shop"), "02119", "Inactive", "Delivery", "Ann Lee"),
        ];
        records[0].equity_program = Some("Yes".to_string());
        records[1].equity_program = Some("No".to_string());
        records[2].facility_address = None;
        RecordStore::from_records(records)
    }

    #[test]
    fn test_overview() {
        let store = store();
        let overview = Overview::compute(&store, &DashboardSettings::default());

        assert_eq!(overview.total_records, 3);
        assert_eq!(overview.equity_program.len(), 2);
        assert_eq!(overview.license_status[0].label, "Active");
        assert_eq!(overview.pivot.grand_total, 3);
        assert_eq!(overview.category_counts[0], ("Retail".to_string(), 2));
        assert_eq!(overview.grid.iter().map(|c| c.count).sum::<usize>(), 3);
        assert_eq!(overview.grid_view.map(|v| v.zoom), Some(11));
    }

    #[test]
    fn test_panels_for_selection() {
        let store = store();
        let engine = FilterEngine::new(&store);
        let selection = SelectionState {
            age: 19,
            category: Some("Retail".to_string()),
            zip_codes: vec!["02118".to_string()],
            license_status: Some("Active".to_string()),
            business_name: Some("Zed Shop".to_string()),
            owner_name: Some("Ann Lee".to_string()),
        };

        let panels = Panels::compute(&engine, &selection, &DashboardSettings::default());

        assert_eq!(panels.age_class, AgeClass::Minor);
        assert_eq!(panels.age_message, "Illegal to be here!");
        assert_eq!(panels.category_points.len(), 2);
        assert_eq!(
            panels.listing.iter().map(|e| e.business_name.as_str()).collect::<Vec<_>>(),
            vec!["Acme Shop", "Zed Shop"]
        );
        assert_eq!(
            panels.facilities,
            vec![
                "Facility Address: 1 Zed Shop Way-02118".to_string(),
                "Facility Address: N/A-02119".to_string(),
            ]
        );
        assert!(panels.owner.is_ambiguous());
        assert_eq!(panels.owner.summary(), "Business Name: Zed Shop\n - LIC-7");
        assert!(panels.business_found);
        assert_eq!(panels.business_lines(), panels.facilities);
    }

    #[test]
    fn test_panels_not_found_states() {
        let store = store();
        let engine = FilterEngine::new(&store);
        let selection = SelectionState {
            zip_codes: vec!["00000".to_string()],
            license_status: Some("Active".to_string()),
            owner_name: Some("Nobody".to_string()),
            ..SelectionState::default()
        };

        let panels = Panels::compute(&engine, &selection, &DashboardSettings::default());
        assert!(panels.listing_is_empty());
        assert!(panels.facilities.is_empty());
        assert!(!panels.business_found);
        assert!(!panels.owner.found);
        assert_eq!(panels.owner.summary(), OWNER_NOT_FOUND_MESSAGE);
        assert_eq!(panels.age_class, AgeClass::Adult);
    }

    #[test]
    fn test_unknown_business_shows_not_found() {
        let store = store();
        let engine = FilterEngine::new(&store);
        let selection = SelectionState {
            business_name: Some("Ghost Dispensary".to_string()),
            ..SelectionState::initial(&store)
        };

        let panels = Panels::compute(&engine, &selection, &DashboardSettings::default());
        assert!(!panels.business_found);
        assert!(panels.facilities.is_empty());
        assert_eq!(panels.business_lines(), vec![BUSINESS_NOT_FOUND_MESSAGE.to_string()]);
    }

    #[test]
    fn test_datasheet_limit() {
        let store = store();
        let settings = DashboardSettings {
            datasheet_rows: 2,
            ..DashboardSettings::default()
        };
        assert_eq!(datasheet(&store, &settings).len(), 2);
    }
}
