// ⚙️ Configuration - registry.toml loading and startup validation
//
// Every section is optional; missing keys fall back to the defaults below.
// Unknown keys are ignored so an older binary accepts a newer file.

use crate::dashboard::DashboardSettings;
use crate::error::ConfigError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "registry.toml";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Highest zoom level map widgets accept
const MAX_ZOOM: u8 = 22;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data: DataSection,
    pub media: MediaSection,
    pub map: MapSection,
    pub server: ServerSection,
    pub logging: LoggingSection,
}

/// `[data]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub csv_path: PathBuf,
    pub database_path: PathBuf,
    pub datasheet_rows: usize,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            csv_path: PathBuf::from("Cannabis_Registry.csv"),
            database_path: PathBuf::from("registry.db"),
            datasheet_rows: 195,
        }
    }
}

/// `[media]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MediaSection {
    pub video: PathBuf,
    pub image: PathBuf,
}

impl Default for MediaSection {
    fn default() -> Self {
        Self {
            video: PathBuf::from("cannabisvideo.mp4"),
            image: PathBuf::from("Weed-Background-Pictures.jpg"),
        }
    }
}

/// `[map]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MapSection {
    pub cell_size_m: f64,
    pub grid_zoom: u8,
    pub category_zoom: u8,
}

impl Default for MapSection {
    fn default() -> Self {
        Self {
            cell_size_m: 200.0,
            grid_zoom: 11,
            category_zoom: 10,
        }
    }
}

/// `[server]`
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:3000".to_string(),
        }
    }
}

/// `[logging]`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl Config {
    /// The file `load` reads: `path` when given, else `registry.toml` if it
    /// exists in the working directory, else none (defaults).
    pub fn resolve_path(path: Option<&Path>) -> Option<PathBuf> {
        match path {
            Some(p) => Some(p.to_path_buf()),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                default.exists().then_some(default)
            }
        }
    }

    /// Load the file picked by [`Config::resolve_path`], or defaults. An
    /// explicitly named file must exist.
    ///
    /// Runs before logging is set up, so callers report the source once the
    /// subscriber is installed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = Self::resolve_path(path) else {
            return Ok(Self::default());
        };

        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        Self::from_toml(&text).map_err(|err| match err {
            ConfigError::Parse { source, .. } => ConfigError::Parse { path, source },
            other => other,
        })
    }

    /// Parse and validate config text.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data.datasheet_rows == 0 {
            return Err(ConfigError::Invalid {
                field: "data.datasheet_rows",
                message: "must be at least 1".to_string(),
            });
        }

        if !self.map.cell_size_m.is_finite() || self.map.cell_size_m <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "map.cell_size_m",
                message: format!("must be a positive number of metres, got {}", self.map.cell_size_m),
            });
        }

        for (field, zoom) in [
            ("map.grid_zoom", self.map.grid_zoom),
            ("map.category_zoom", self.map.category_zoom),
        ] {
            if zoom > MAX_ZOOM {
                return Err(ConfigError::Invalid {
                    field,
                    message: format!("must be between 0 and {}, got {}", MAX_ZOOM, zoom),
                });
            }
        }

        self.bind_addr()?;

        if let Some(level) = &self.logging.level {
            if !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
                return Err(ConfigError::Invalid {
                    field: "logging.level",
                    message: format!("expected one of {}, got `{}`", LOG_LEVELS.join(", "), level),
                });
            }
        }

        Ok(())
    }

    /// Parsed `[server] bind`
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.server.bind.parse().map_err(|_| ConfigError::Invalid {
            field: "server.bind",
            message: format!("`{}` is not a socket address", self.server.bind),
        })
    }

    pub fn dashboard_settings(&self) -> DashboardSettings {
        DashboardSettings {
            datasheet_rows: self.data.datasheet_rows,
            grid_cell_size_m: self.map.cell_size_m,
            grid_zoom: self.map.grid_zoom,
            category_zoom: self.map.category_zoom,
        }
    }
}
