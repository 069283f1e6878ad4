// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use std::path::{Path, PathBuf};

use cannabis_registry::logging::{self, LogTarget};
use cannabis_registry::{
    insert_records, last_import, load_store, setup_database, verify_count, Column, Config,
    Overview, RecordStore,
};

/// Cannabis Registry - a one stop-shop for all your cannabis needs
#[derive(Debug, Parser)]
#[command(name = "cannabis-registry", version, about)]
struct Cli {
    /// Path to registry.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry CSV (overrides [data] csv_path)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive terminal dashboard (default)
    Ui {
        /// Read the registry from the SQLite snapshot instead of the CSV
        #[arg(long)]
        from_db: bool,
    },
    /// Copy the registry CSV into the SQLite snapshot
    Import {
        /// Snapshot path (overrides [data] database_path)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Print record count, license status shares and the pivot table
    Summary {
        #[arg(long)]
        from_db: bool,

        /// Print the whole overview as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(data) = &cli.data {
        config.data.csv_path = data.clone();
    }

    let command = cli.command.unwrap_or(Command::Ui { from_db: false });

    // The dashboard owns the terminal, so logs must not go to stderr there
    let target = match (&command, &config.logging.file) {
        (_, Some(file)) => LogTarget::File(file),
        (Command::Ui { .. }, None) => LogTarget::Discard,
        (_, None) => LogTarget::Stderr,
    };
    logging::init(cli.debug, config.logging.level.as_deref(), target)?;
    match Config::resolve_path(cli.config.as_deref()) {
        Some(path) => tracing::info!(path = %path.display(), "Loaded config file"),
        None => tracing::debug!("No config file found; using defaults"),
    }

    match command {
        Command::Ui { from_db } => run_ui_mode(&config, from_db),
        Command::Import { db } => {
            let db_path = db.unwrap_or_else(|| config.data.database_path.clone());
            run_import(&config.data.csv_path, &db_path)
        }
        Command::Summary { from_db, json } => run_summary(&config, from_db, json),
    }
}

fn load_registry(config: &Config, from_db: bool) -> Result<RecordStore> {
    if from_db {
        load_store(&config.data.database_path).with_context(|| {
            format!(
                "Failed to load registry snapshot {}",
                config.data.database_path.display()
            )
        })
    } else {
        RecordStore::load(&config.data.csv_path).with_context(|| {
            format!("Failed to load registry {}", config.data.csv_path.display())
        })
    }
}

fn run_import(csv_path: &Path, db_path: &Path) -> Result<()> {
    println!("🗄️  Registry Import - CSV → SQLite + WAL");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    // 1. Load CSV
    println!("\n📂 Loading CSV...");
    let store = RecordStore::load(csv_path)
        .with_context(|| format!("Failed to load registry {}", csv_path.display()))?;
    println!("✓ Loaded {} records from {}", store.len(), csv_path.display());

    // 2. Setup database
    println!("\n🔧 Setting up database...");
    let mut conn = Connection::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    setup_database(&conn).context("Failed to create registry tables")?;
    println!("✓ Database initialized with WAL mode");

    // 3. Insert records
    println!("\n💾 Inserting records...");
    let source = csv_path.display().to_string();
    let summary = insert_records(&mut conn, store.records(), &source)?;

    // 4. Verify count
    println!("\n🔍 Verifying database...");
    let count = verify_count(&conn)?;
    println!("✓ Database contains {} records", count);

    println!("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✅ Import complete");
    println!("✓ New records: {}", summary.rows_inserted);
    println!("✓ Duplicates skipped: {}", summary.duplicates());
    if let Some(run) = last_import(&conn)? {
        println!("✓ Recorded at {}", run.imported_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    Ok(())
}

fn run_summary(config: &Config, from_db: bool, json: bool) -> Result<()> {
    let store = load_registry(config, from_db)?;
    let overview = Overview::compute(&store, &config.dashboard_settings());

    if json {
        println!("{}", serde_json::to_string_pretty(&overview)?);
        return Ok(());
    }

    println!("🍃 The Cannabis Registry");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("Records: {}", overview.total_records);

    println!("\n{}:", Column::LicenseStatus.title());
    for share in &overview.license_status {
        println!("  {:<30} {:>5}", share.legend_label(), share.count);
    }

    println!("\n{}:", Column::EquityProgram.title());
    for share in &overview.equity_program {
        println!("  {:<30} {:>6}", share.label, share.percent_label());
    }

    let pivot = &overview.pivot;
    println!(
        "\nPivot table - {} vs {}",
        pivot.row_dim.title(),
        pivot.col_dim.title()
    );
    let header = pivot.header();
    print!("  {:<28}", "");
    for label in &header {
        print!(" {:>12}", truncate(label, 12));
    }
    println!();
    for row in pivot.rows() {
        print!("  {:<28}", truncate(&row.label, 28));
        for count in &row.counts {
            print!(" {:>12}", count);
        }
        println!();
    }

    Ok(())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(feature = "tui")]
fn run_ui_mode(config: &Config, from_db: bool) -> Result<()> {
    println!("🖥️  Loading Cannabis Registry dashboard...\n");

    let store = load_registry(config, from_db)?;
    println!("✓ Loaded {} records\n", store.len());
    println!("Starting UI... (Press 'q' to quit)\n");

    let mut app = ui::App::new(&store, config);
    ui::run_ui(&mut app)?;

    println!("\n✅ Dashboard closed");

    Ok(())
}

#[cfg(not(feature = "tui"))]
fn run_ui_mode(_config: &Config, _from_db: bool) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or use the web dashboard: cargo run --bin registry-server --features server");
    std::process::exit(1);
}
