// Cannabis Registry - Web Server
// REST API with Axum over the same Overview / Panels the terminal dashboard renders

use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::get,
    Router,
};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use cannabis_registry::dashboard::facility_lines;
use cannabis_registry::logging::{self, LogTarget};
use cannabis_registry::{
    datasheet, group_counts, load_store, pivot, Column, Config, DashboardSettings, FilterEngine,
    MediaAssets, Overview, OwnerLookup, Panels, Record, RecordStore, SelectionState,
    BUSINESS_NOT_FOUND_MESSAGE, LEGAL_AGE, MAX_AGE,
};

/// Cannabis Registry web dashboard
#[derive(Debug, Parser)]
#[command(name = "registry-server", version, about)]
struct Cli {
    /// Path to registry.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Registry CSV (overrides [data] csv_path)
    #[arg(long)]
    data: Option<PathBuf>,

    /// Serve the SQLite snapshot instead of the CSV
    #[arg(long)]
    from_db: bool,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    store: Arc<RecordStore>,
    overview: Arc<Overview>,
    settings: DashboardSettings,
    media: Arc<MediaAssets>,
}

impl AppState {
    fn new(store: RecordStore, config: &Config) -> Self {
        let settings = config.dashboard_settings();
        let overview = Overview::compute(&store, &settings);
        let media = MediaAssets::probe(&config.media);

        Self {
            store: Arc::new(store),
            overview: Arc::new(overview),
            settings,
            media: Arc::new(media),
        }
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: (),
            error: Some(message.into()),
        }
    }
}

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ApiResponse::error(message))).into_response()
}

/// Every option the selection controls offer
#[derive(Serialize)]
struct OptionsResponse {
    categories: Vec<String>,
    statuses: Vec<String>,
    zip_codes: Vec<String>,
    businesses: Vec<String>,
    owners: Vec<String>,
    min_age: u8,
    max_age: u8,
    default_age: u8,
}

/// Query string of /api/dashboard; missing fields keep their initial value
#[derive(Debug, Default, Deserialize)]
struct DashboardQuery {
    age: Option<u8>,
    category: Option<String>,
    /// Comma separated
    zips: Option<String>,
    status: Option<String>,
    business: Option<String>,
    owner: Option<String>,
}

impl DashboardQuery {
    fn apply(self, mut selection: SelectionState) -> SelectionState {
        if let Some(age) = self.age {
            selection.age = age.min(MAX_AGE);
        }
        if let Some(category) = self.category {
            selection.category = Some(category);
        }
        if let Some(zips) = self.zips {
            selection.zip_codes = zips
                .split(',')
                .map(str::trim)
                .filter(|z| !z.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(status) = self.status {
            selection.license_status = Some(status);
        }
        if let Some(business) = self.business {
            selection.business_name = Some(business);
        }
        if let Some(owner) = self.owner {
            selection.owner_name = Some(owner);
        }
        selection
    }
}

#[derive(Debug, Deserialize)]
struct PivotQuery {
    rows: Option<String>,
    cols: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordsQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct BusinessResponse {
    business_name: String,
    found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    facilities: Vec<String>,
    records: Vec<Record>,
}

#[derive(Serialize)]
struct OwnerResponse {
    owner_name: String,
    matches: usize,
    ambiguous: bool,
    summary: String,
    records: Vec<Record>,
}

fn parse_column(raw: &str) -> Result<Column, Response> {
    raw.parse::<Column>().map_err(|e| bad_request(e.to_string()))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/overview - Selection independent widgets
async fn get_overview(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.overview.as_ref().clone()))
}

/// GET /api/options - Values for the selection controls
async fn get_options(State(state): State<AppState>) -> impl IntoResponse {
    let store = &state.store;
    Json(ApiResponse::ok(OptionsResponse {
        categories: store.column_values(Column::LicenseCategory),
        statuses: store.column_values(Column::LicenseStatus),
        zip_codes: store.column_values(Column::ZipCode),
        businesses: store.column_values(Column::BusinessName),
        owners: store.column_values(Column::OwnerName),
        min_age: 0,
        max_age: MAX_AGE,
        default_age: LEGAL_AGE,
    }))
}

/// GET /api/dashboard - Selection dependent panels
async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> impl IntoResponse {
    let selection = query.apply(SelectionState::initial(&state.store));
    let engine = FilterEngine::new(&state.store);
    let panels = Panels::compute(&engine, &selection, &state.settings);

    tracing::debug!(
        age = selection.age,
        zips = selection.zip_codes.len(),
        listed = panels.listing.len(),
        "Dashboard evaluated"
    );

    Json(ApiResponse::ok(panels))
}

/// GET /api/counts/:column - Frequency of every value, most frequent first
async fn get_counts(State(state): State<AppState>, Path(column): Path<String>) -> Response {
    match parse_column(&column) {
        Ok(column) => (StatusCode::OK, Json(ApiResponse::ok(state.store.aggregate_count(column))))
            .into_response(),
        Err(response) => response,
    }
}

/// GET /api/pivot?rows=..&cols=.. - Cross tabulation with totals
async fn get_pivot(State(state): State<AppState>, Query(query): Query<PivotQuery>) -> Response {
    let rows = match query.rows.as_deref().map(parse_column).transpose() {
        Ok(rows) => rows.unwrap_or(Column::LicenseCategory),
        Err(response) => return response,
    };
    let cols = match query.cols.as_deref().map(parse_column).transpose() {
        Ok(cols) => cols.unwrap_or(Column::LicenseStatus),
        Err(response) => return response,
    };

    let table = pivot(state.store.records(), rows, cols);
    (StatusCode::OK, Json(ApiResponse::ok(table))).into_response()
}

/// GET /api/groups?rows=..&cols=.. - Long form of the pivot, zeros omitted
async fn get_groups(State(state): State<AppState>, Query(query): Query<PivotQuery>) -> Response {
    let first = match query.rows.as_deref().map(parse_column).transpose() {
        Ok(first) => first.unwrap_or(Column::LicenseCategory),
        Err(response) => return response,
    };
    let second = match query.cols.as_deref().map(parse_column).transpose() {
        Ok(second) => second.unwrap_or(Column::LicenseStatus),
        Err(response) => return response,
    };

    let groups = group_counts(state.store.records(), first, second);
    (StatusCode::OK, Json(ApiResponse::ok(groups))).into_response()
}

/// GET /api/records?limit=.. - Raw datasheet rows
async fn get_records(
    State(state): State<AppState>,
    Query(query): Query<RecordsQuery>,
) -> impl IntoResponse {
    let rows = match query.limit {
        Some(limit) => state.store.head(limit),
        None => datasheet(&state.store, &state.settings),
    };
    Json(ApiResponse::ok(rows.to_vec()))
}

/// GET /api/business/:name - Every facility of a business
///
/// `Path` has already percent-decoded the name.
async fn get_business(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let engine = FilterEngine::new(&state.store);
    let view = engine.lookup_by_business_name(&name);
    let found = !view.is_empty();

    Json(ApiResponse::ok(BusinessResponse {
        found,
        message: (!found).then_some(BUSINESS_NOT_FOUND_MESSAGE),
        facilities: facility_lines(&view),
        records: view.iter().cloned().collect(),
        business_name: name,
    }))
}

/// GET /api/owner/:name - Business held by an owner
async fn get_owner(State(state): State<AppState>, Path(name): Path<String>) -> impl IntoResponse {
    let engine = FilterEngine::new(&state.store);
    let view = engine.lookup_by_owner_name(&name);
    let lookup = OwnerLookup::resolve(&view);

    let selection = SelectionState {
        owner_name: Some(name.clone()),
        ..SelectionState::default()
    };
    let owner = Panels::compute(&engine, &selection, &state.settings).owner;

    if matches!(lookup, OwnerLookup::Ambiguous { .. }) {
        tracing::info!(owner = %name, matches = view.len(), "Owner holds several businesses");
    }

    Json(ApiResponse::ok(OwnerResponse {
        matches: owner.matches,
        ambiguous: owner.is_ambiguous(),
        summary: owner.summary(),
        records: view.iter().cloned().collect(),
        owner_name: name,
    }))
}

/// GET /api/media - Video and image availability
async fn get_media(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.media.as_ref().clone()))
}

/// GET /media/:file - Video or image bytes
async fn serve_media(State(state): State<AppState>, Path(file): Path<String>) -> Response {
    let Some(asset) = state.media.by_file_name(&file) else {
        return (StatusCode::NOT_FOUND, Json(ApiResponse::error("Unknown media file")))
            .into_response();
    };

    match asset.read_bytes() {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, asset.kind.content_type(&asset.path))],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(file = %file, error = %e, "Media file unavailable");
            (StatusCode::NOT_FOUND, Json(ApiResponse::error(e.to_string()))).into_response()
        }
    }
}

/// GET / - Serve index.html
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

// ============================================================================
// Main Server
// ============================================================================

fn build_router(state: AppState) -> Router {
    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/overview", get(get_overview))
        .route("/options", get(get_options))
        .route("/dashboard", get(get_dashboard))
        .route("/counts/:column", get(get_counts))
        .route("/pivot", get(get_pivot))
        .route("/groups", get(get_groups))
        .route("/records", get(get_records))
        .route("/business/:name", get(get_business))
        .route("/owner/:name", get(get_owner))
        .route("/media", get(get_media))
        .with_state(state.clone());

    // Build main router
    Router::new()
        .route("/", get(serve_index))
        .route("/media/:file", get(serve_media))
        .with_state(state)
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data) = cli.data {
        config.data.csv_path = data;
    }

    let target = match &config.logging.file {
        Some(file) => LogTarget::File(file),
        None => LogTarget::Stderr,
    };
    logging::init(cli.debug, config.logging.level.as_deref(), target)?;
    match Config::resolve_path(cli.config.as_deref()) {
        Some(path) => tracing::info!(path = %path.display(), "Loaded config file"),
        None => tracing::debug!("No config file found; using defaults"),
    }

    println!("🌐 Cannabis Registry - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let store = if cli.from_db {
        load_store(&config.data.database_path).with_context(|| {
            format!(
                "Failed to load registry snapshot {} (run `cannabis-registry import` first)",
                config.data.database_path.display()
            )
        })?
    } else {
        RecordStore::load(&config.data.csv_path)
            .with_context(|| format!("Failed to load registry {}", config.data.csv_path.display()))?
    };
    println!("✓ Registry loaded: {} records", store.len());

    // Create shared state
    let app = build_router(AppState::new(store, &config));

    // Start server
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!(%addr, "Server listening");
    println!("\n🚀 Server running on http://{}", addr);
    println!("   API: http://{}/api/dashboard", addr);
    println!("   UI:  http://{}", addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app)
        .await
        .context("Server stopped unexpectedly")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const SAMPLE_CSV: &str = "\
longitude,latitude,equity_program_designation,app_license_status,app_license_category,facility_zip_code,app_business_name,facility_address,id_full_name,app_license_no
-71.06,42.34,Yes,Active,Retail,02118,100%25 Pure,1 Main St,Ann 50% Lee,L-1
-71.07,42.35,No,Active,Retail,02119,100%25 Pure,2 Main St,Bo Diaz,L-2
-71.08,42.36,No,Inactive,Cultivator,02120,Green Leaf LLC,3 Elm St,Cy Park,L-3
";

    fn router() -> Router {
        let store = RecordStore::from_reader(SAMPLE_CSV.as_bytes()).unwrap();
        build_router(AppState::new(store, &Config::default()))
    }

    async fn get_json(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_dashboard_query_overrides_initial_selection() {
        let initial = SelectionState {
            age: 21,
            category: Some("Retail".to_string()),
            license_status: Some("Active".to_string()),
            ..SelectionState::default()
        };
        let query = DashboardQuery {
            age: Some(250),
            zips: Some("02118, 02119,,".to_string()),
            status: Some("Inactive".to_string()),
            ..DashboardQuery::default()
        };

        let selection = query.apply(initial);
        assert_eq!(selection.age, MAX_AGE);
        assert_eq!(selection.category.as_deref(), Some("Retail"));
        assert_eq!(selection.zip_codes, vec!["02118", "02119"]);
        assert_eq!(selection.license_status.as_deref(), Some("Inactive"));
    }

    #[test]
    fn test_parse_column_rejects_unknown() {
        assert_eq!(parse_column("app_license_status").ok(), Some(Column::LicenseStatus));
        assert!(parse_column("license").is_err());
    }

    #[tokio::test]
    async fn test_business_name_with_percent_sign() {
        // "100%25 Pure" on the wire is "100%2525%20Pure"
        let (status, body) = get_json("/api/business/100%2525%20Pure").await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["business_name"], "100%25 Pure");
        assert_eq!(data["found"], true);
        assert!(data.get("message").is_none());
        assert_eq!(
            data["facilities"],
            serde_json::json!([
                "Facility Address: 1 Main St-02118",
                "Facility Address: 2 Main St-02119",
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_business_is_reported_not_found() {
        let (status, body) = get_json("/api/business/Ghost%20Dispensary").await;

        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["found"], false);
        assert_eq!(data["message"], BUSINESS_NOT_FOUND_MESSAGE);
        assert_eq!(data["facilities"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_owner_name_is_decoded_once() {
        let (_, body) = get_json("/api/owner/Ann%2050%25%20Lee").await;

        let data = &body["data"];
        assert_eq!(data["owner_name"], "Ann 50% Lee");
        assert_eq!(data["matches"], 1);
        assert_eq!(data["summary"], "Business Name: 100%25 Pure\n - L-1");
    }

    #[tokio::test]
    async fn test_dashboard_reports_unknown_business() {
        let (_, body) = get_json("/api/dashboard?business=Ghost").await;

        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["business_found"], false);
    }
}
