// 🍃 Registry record - one row of the cannabis business registry
//
// Columns are validated once when the CSV header is read (see store.rs);
// after that every consumer works with typed fields instead of string keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Header names the loader insists on. Extra columns are ignored.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "longitude",
    "latitude",
    "equity_program_designation",
    "app_license_status",
    "app_license_category",
    "facility_zip_code",
    "app_business_name",
    "facility_address",
    "id_full_name",
    "app_license_no",
];

/// One licensed business/facility entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "app_business_name")]
    pub business_name: Option<String>,

    #[serde(rename = "facility_address")]
    pub facility_address: Option<String>,

    #[serde(rename = "facility_zip_code")]
    pub zip_code: String,

    #[serde(rename = "app_license_status")]
    pub license_status: String,

    #[serde(rename = "app_license_category")]
    pub license_category: String,

    #[serde(rename = "id_full_name")]
    pub owner_name: String,

    #[serde(rename = "app_license_no")]
    pub license_no: String,

    #[serde(rename = "equity_program_designation")]
    pub equity_program: Option<String>,

    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Record {
    /// Value of a text column, with empty cells reported as missing.
    pub fn text(&self, column: Column) -> Option<&str> {
        let raw = match column {
            Column::BusinessName => self.business_name.as_deref(),
            Column::FacilityAddress => self.facility_address.as_deref(),
            Column::ZipCode => Some(self.zip_code.as_str()),
            Column::LicenseStatus => Some(self.license_status.as_str()),
            Column::LicenseCategory => Some(self.license_category.as_str()),
            Column::OwnerName => Some(self.owner_name.as_str()),
            Column::LicenseNo => Some(self.license_no.as_str()),
            Column::EquityProgram => self.equity_program.as_deref(),
        };
        raw.filter(|v| !v.trim().is_empty())
    }

    /// (longitude, latitude) when both are present and finite.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.longitude, self.latitude) {
            (Some(lon), Some(lat)) if lon.is_finite() && lat.is_finite() => Some((lon, lat)),
            _ => None,
        }
    }

    /// Business name for display, `N/A` when missing.
    pub fn display_name(&self) -> &str {
        self.text(Column::BusinessName).unwrap_or("N/A")
    }

    /// Facility address for display, `N/A` when missing.
    pub fn display_address(&self) -> &str {
        self.text(Column::FacilityAddress).unwrap_or("N/A")
    }
}

/// Text columns the dashboard filters, counts and pivots on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Column {
    BusinessName,
    FacilityAddress,
    ZipCode,
    LicenseStatus,
    LicenseCategory,
    OwnerName,
    LicenseNo,
    EquityProgram,
}

impl Column {
    pub const ALL: [Column; 8] = [
        Column::BusinessName,
        Column::FacilityAddress,
        Column::ZipCode,
        Column::LicenseStatus,
        Column::LicenseCategory,
        Column::OwnerName,
        Column::LicenseNo,
        Column::EquityProgram,
    ];

    /// CSV header name
    pub fn name(&self) -> &'static str {
        match self {
            Column::BusinessName => "app_business_name",
            Column::FacilityAddress => "facility_address",
            Column::ZipCode => "facility_zip_code",
            Column::LicenseStatus => "app_license_status",
            Column::LicenseCategory => "app_license_category",
            Column::OwnerName => "id_full_name",
            Column::LicenseNo => "app_license_no",
            Column::EquityProgram => "equity_program_designation",
        }
    }

    /// Human-readable title for chart legends and table headers
    pub fn title(&self) -> &'static str {
        match self {
            Column::BusinessName => "Business Name",
            Column::FacilityAddress => "Facility Address",
            Column::ZipCode => "Facility Zip Code",
            Column::LicenseStatus => "App License Status",
            Column::LicenseCategory => "App License Category",
            Column::OwnerName => "Owner Name",
            Column::LicenseNo => "App License No",
            Column::EquityProgram => "Equity Program Designation",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownColumn(pub String);

impl fmt::Display for UnknownColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown column `{}`", self.0)
    }
}

impl std::error::Error for UnknownColumn {}

impl FromStr for Column {
    type Err = UnknownColumn;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Column::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| UnknownColumn(s.to_string()))
    }
}
