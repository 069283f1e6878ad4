// ⚠️ Error types for the registry core
//
// Library code returns these typed errors; the binaries wrap them with
// anyhow context at the edges.

use std::path::PathBuf;
use thiserror::Error;

/// Failure to bring the registry into memory. Always fatal at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open registry file {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("cannot read registry header")]
    Header(#[source] csv::Error),

    #[error("registry is missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("malformed registry row {row}")]
    MalformedRow {
        row: u64,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Snapshot(#[from] DbError),
}

/// Failures from the SQLite snapshot.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error")]
    Sqlite(#[from] rusqlite::Error),

    #[error("snapshot not found at {}", .0.display())]
    NotFound(PathBuf),
}

/// Invalid or unreadable `registry.toml`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value for `{field}`: {message}")]
    Invalid { field: &'static str, message: String },
}
