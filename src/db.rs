// 🗄️ SQLite snapshot of the registry
//
// `import` copies the CSV into SQLite (WAL mode) so later runs can start from
// the snapshot. Rows are keyed by a content hash, which makes re-importing
// the same file a no-op.

use crate::error::{DbError, LoadError};
use crate::record::Record;
use crate::store::RecordStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Result of one import run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: usize,
    pub rows_inserted: usize,
}

impl ImportSummary {
    pub fn duplicates(&self) -> usize {
        self.rows_read - self.rows_inserted
    }
}

/// One row of the `imports` audit table.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRun {
    pub imported_at: DateTime<Utc>,
    pub source: String,
    pub rows_read: i64,
    pub rows_inserted: i64,
}

/// Content hash used as the idempotency key.
pub fn record_hash(record: &Record) -> String {
    let mut hasher = Sha256::new();
    let fields = [
        record.business_name.as_deref().unwrap_or(""),
        record.facility_address.as_deref().unwrap_or(""),
        &record.zip_code,
        &record.license_status,
        &record.license_category,
        &record.owner_name,
        &record.license_no,
        record.equity_program.as_deref().unwrap_or(""),
    ];
    for field in fields {
        hasher.update(field.as_bytes());
        hasher.update([0x1f]);
    }
    hasher.update(format!("{:?}|{:?}", record.latitude, record.longitude));
    format!("{:x}", hasher.finalize())
}

pub fn setup_database(conn: &Connection) -> Result<(), DbError> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS registry_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            row_hash TEXT UNIQUE NOT NULL,
            app_business_name TEXT,
            facility_address TEXT,
            facility_zip_code TEXT NOT NULL,
            app_license_status TEXT NOT NULL,
            app_license_category TEXT NOT NULL,
            id_full_name TEXT NOT NULL,
            app_license_no TEXT NOT NULL,
            equity_program_designation TEXT,
            latitude REAL,
            longitude REAL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS imports (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            imported_at TEXT NOT NULL,
            source TEXT NOT NULL,
            rows_read INTEGER NOT NULL,
            rows_inserted INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_category ON registry_records(app_license_category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_zip_status ON registry_records(facility_zip_code, app_license_status)",
        [],
    )?;

    Ok(())
}

/// Insert `records` in one transaction, skipping rows already present.
pub fn insert_records(
    conn: &mut Connection,
    records: &[Record],
    source: &str,
) -> Result<ImportSummary, DbError> {
    let tx = conn.transaction()?;
    let mut inserted = 0;

    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO registry_records (
                row_hash, app_business_name, facility_address, facility_zip_code,
                app_license_status, app_license_category, id_full_name, app_license_no,
                equity_program_designation, latitude, longitude
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )?;

        for record in records {
            inserted += stmt.execute(params![
                record_hash(record),
                record.business_name,
                record.facility_address,
                record.zip_code,
                record.license_status,
                record.license_category,
                record.owner_name,
                record.license_no,
                record.equity_program,
                record.latitude,
                record.longitude,
            ])?;
        }
    }

    let summary = ImportSummary {
        rows_read: records.len(),
        rows_inserted: inserted,
    };

    tx.execute(
        "INSERT INTO imports (imported_at, source, rows_read, rows_inserted) VALUES (?1, ?2, ?3, ?4)",
        params![
            Utc::now().to_rfc3339(),
            source,
            summary.rows_read as i64,
            summary.rows_inserted as i64
        ],
    )?;

    tx.commit()?;

    tracing::info!(
        source,
        read = summary.rows_read,
        inserted = summary.rows_inserted,
        "Registry snapshot updated"
    );

    Ok(summary)
}

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<Record> {
    Ok(Record {
        business_name: row.get(0)?,
        facility_address: row.get(1)?,
        zip_code: row.get(2)?,
        license_status: row.get(3)?,
        license_category: row.get(4)?,
        owner_name: row.get(5)?,
        license_no: row.get(6)?,
        equity_program: row.get(7)?,
        latitude: row.get(8)?,
        longitude: row.get(9)?,
    })
}

/// All snapshot rows in import order.
pub fn load_records(conn: &Connection) -> Result<Vec<Record>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT app_business_name, facility_address, facility_zip_code,
                app_license_status, app_license_category, id_full_name, app_license_no,
                equity_program_designation, latitude, longitude
         FROM registry_records
         ORDER BY id",
    )?;

    let records = stmt
        .query_map([], row_to_record)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(records)
}

pub fn verify_count(conn: &Connection) -> Result<i64, DbError> {
    let count = conn.query_row("SELECT COUNT(*) FROM registry_records", [], |row| row.get(0))?;
    Ok(count)
}

/// Most recent import, if any.
pub fn last_import(conn: &Connection) -> Result<Option<ImportRun>, DbError> {
    let run = conn
        .query_row(
            "SELECT imported_at, source, rows_read, rows_inserted
             FROM imports ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                let imported_at: String = row.get(0)?;
                let imported_at = DateTime::parse_from_rfc3339(&imported_at)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                Ok(ImportRun {
                    imported_at,
                    source: row.get(1)?,
                    rows_read: row.get(2)?,
                    rows_inserted: row.get(3)?,
                })
            },
        )
        .optional()?;

    Ok(run)
}

/// Open an existing snapshot as a `RecordStore`.
pub fn load_store(db_path: &Path) -> Result<RecordStore, LoadError> {
    if !db_path.exists() {
        return Err(DbError::NotFound(db_path.to_path_buf()).into());
    }

    let conn = Connection::open(db_path).map_err(DbError::from)?;
    let records = load_records(&conn)?;

    tracing::info!(
        path = %db_path.display(),
        records = records.len(),
        "Registry loaded from snapshot"
    );

    Ok(RecordStore::from_records(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::create_test_record;

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    #[test]
    fn test_round_trip_preserves_records_and_order() {
        let mut conn = memory_db();
        let mut records = vec![
            create_test_record(Some("Zed Shop"), "02118", "Active", "Retail", "Ann Lee"),
            create_test_record(None, "02119", "Inactive", "Delivery", "Bo Diaz"),
        ];
        records[1].latitude = None;

        let summary = insert_records(&mut conn, &records, "test.csv").unwrap();
        assert_eq!(summary.rows_inserted, 2);

        let loaded = load_records(&conn).unwrap();
        assert_eq!(loaded, records);
        assert_eq!(verify_count(&conn).unwrap(), 2);
    }

    #[test]
    fn test_reimport_skips_duplicates() {
        let mut conn = memory_db();
        let records = vec![create_test_record(Some("A"), "02118", "Active", "Retail", "Ann")];

        insert_records(&mut conn, &records, "a.csv").unwrap();
        let second = insert_records(&mut conn, &records, "a.csv").unwrap();

        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.duplicates(), 1);
        assert_eq!(verify_count(&conn).unwrap(), 1);

        let run = last_import(&conn).unwrap().unwrap();
        assert_eq!(run.source, "a.csv");
        assert_eq!(run.rows_read, 1);
        assert_eq!(run.rows_inserted, 0);
    }

    #[test]
    fn test_hash_distinguishes_missing_from_empty_coordinates() {
        let a = create_test_record(Some("A"), "02118", "Active", "Retail", "Ann");
        let mut b = a.clone();
        b.latitude = None;
        assert_ne!(record_hash(&a), record_hash(&b));
        assert_eq!(record_hash(&a), record_hash(&a.clone()));
    }

    #[test]
    fn test_last_import_on_fresh_db() {
        let conn = memory_db();
        assert!(last_import(&conn).unwrap().is_none());
    }

    #[test]
    fn test_load_store_missing_snapshot() {
        let err = load_store(Path::new("/nonexistent/registry.db")).unwrap_err();
        assert!(matches!(err, LoadError::Snapshot(DbError::NotFound(_))));
    }
}
