// Cannabis Registry - Core Library
// Exposes the registry model, filters and aggregations to the terminal
// dashboard, the web server and the tests.

pub mod aggregate;
pub mod charts;
pub mod config;
pub mod dashboard;
pub mod db;
pub mod error;
pub mod filter;
pub mod geo;
pub mod logging;
pub mod media;
pub mod record;
pub mod selection;
pub mod store;

// Re-export commonly used types
pub use aggregate::{group_counts, pivot, GroupCount, PivotRow, PivotTable, TOTAL_LABEL};
pub use charts::{column_shares, line_chart, shares, LineChart, LineSeries, Share};
pub use config::Config;
pub use dashboard::{
    datasheet, DashboardSettings, ListingEntry, Overview, OwnerPanel, Panels,
    BUSINESS_NOT_FOUND_MESSAGE, NO_ENTRIES_MESSAGE, OWNER_NOT_FOUND_MESSAGE,
};
pub use db::{
    insert_records, last_import, load_records, load_store, setup_database, verify_count,
    ImportRun, ImportSummary,
};
pub use error::{ConfigError, DbError, LoadError};
pub use filter::{FilterEngine, FilteredView, OwnerLookup, PanelViews};
pub use geo::{grid_layer, scatter_layer, GridCell, MapPoint, MapView};
pub use media::{MediaAsset, MediaAssets, MediaKind};
pub use record::{Column, Record, REQUIRED_COLUMNS};
pub use selection::{classify_age, AgeClass, SelectionState, LEGAL_AGE, MAX_AGE};
pub use store::RecordStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
