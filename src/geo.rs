// 🗺️ Map layers - density grid and category scatter
//
// Coordinates are WGS84 degrees. Grid cells are approximately square in
// metres around the centre of the data; at city scale the distortion is
// negligible.

use crate::record::{Column, Record};
use serde::Serialize;
use std::collections::BTreeMap;

/// Metres per degree of latitude (mean Earth radius).
const METRES_PER_DEGREE: f64 = 111_320.0;

/// Initial camera of a map widget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MapView {
    pub latitude: f64,
    pub longitude: f64,
    pub zoom: u8,
}

impl MapView {
    /// Centre on the mean position of the records that have coordinates.
    pub fn centred_on<'a, I>(records: I, zoom: u8) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let (mut lon_sum, mut lat_sum, mut n) = (0.0, 0.0, 0usize);
        for (lon, lat) in records.into_iter().filter_map(Record::position) {
            lon_sum += lon;
            lat_sum += lat;
            n += 1;
        }

        if n == 0 {
            return None;
        }

        Some(Self {
            latitude: lat_sum / n as f64,
            longitude: lon_sum / n as f64,
            zoom,
        })
    }
}

// ============================================================================
// GRID LAYER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridCell {
    /// Cell centre
    pub longitude: f64,
    pub latitude: f64,
    pub count: usize,
}

/// Bin record positions into square cells of `cell_size_m` metres.
///
/// Cells are returned in (column, row) order; empty cells are omitted.
pub fn grid_layer<'a, I>(records: I, cell_size_m: f64) -> Vec<GridCell>
where
    I: IntoIterator<Item = &'a Record> + Clone,
{
    let Some(centre) = MapView::centred_on(records.clone(), 0) else {
        return Vec::new();
    };
    if cell_size_m.is_nan() || cell_size_m <= 0.0 {
        return Vec::new();
    }

    let lat_step = cell_size_m / METRES_PER_DEGREE;
    let lon_step = cell_size_m / (METRES_PER_DEGREE * centre.latitude.to_radians().cos().max(1e-6));

    let mut cells: BTreeMap<(i64, i64), usize> = BTreeMap::new();
    for (lon, lat) in records.into_iter().filter_map(Record::position) {
        let key = (
            (lon / lon_step).floor() as i64,
            (lat / lat_step).floor() as i64,
        );
        *cells.entry(key).or_insert(0) += 1;
    }

    cells
        .into_iter()
        .map(|((col, row), count)| GridCell {
            longitude: (col as f64 + 0.5) * lon_step,
            latitude: (row as f64 + 0.5) * lat_step,
            count,
        })
        .collect()
}

// ============================================================================
// SCATTER LAYER
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub longitude: f64,
    pub latitude: f64,
    /// Tooltip text
    pub name: String,
}

/// One point per record with coordinates, labelled by business name.
pub fn scatter_layer<'a, I>(records: I) -> Vec<MapPoint>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(|r| {
            r.position().map(|(longitude, latitude)| MapPoint {
                longitude,
                latitude,
                name: r.text(Column::BusinessName).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

/// Bounding box (min_lon, min_lat, max_lon, max_lat) of the positioned records.
pub fn bounds<'a, I>(records: I) -> Option<(f64, f64, f64, f64)>
where
    I: IntoIterator<Item = &'a Record>,
{
    records
        .into_iter()
        .filter_map(Record::position)
        .fold(None, |acc, (lon, lat)| match acc {
            None => Some((lon, lat, lon, lat)),
            Some((x0, y0, x1, y1)) => Some((x0.min(lon), y0.min(lat), x1.max(lon), y1.max(lat))),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::create_test_record;

    fn at(name: &str, lon: f64, lat: f64) -> Record {
        let mut record = create_test_record(Some(name), "02118", "Active", "Retail", name);
        record.longitude = Some(lon);
        record.latitude = Some(lat);
        record
    }

    #[test]
    fn test_map_view_is_mean_position() {
        let mut missing = at("X", 0.0, 0.0);
        missing.latitude = None;
        let records = vec![at("A", -71.0, 42.0), at("B", -71.2, 42.4), missing];

        let view = MapView::centred_on(&records, 11).unwrap();
        assert!((view.longitude + 71.1).abs() < 1e-9);
        assert!((view.latitude - 42.2).abs() < 1e-9);
        assert_eq!(view.zoom, 11);
    }

    #[test]
    fn test_map_view_without_positions() {
        let empty: Vec<Record> = Vec::new();
        assert!(MapView::centred_on(&empty, 10).is_none());
    }

    #[test]
    fn test_grid_layer_bins_nearby_points_together() {
        let records = vec![
            at("A", -71.06000, 42.35000),
            at("B", -71.06001, 42.35001),
            at("C", -71.10000, 42.40000),
        ];

        let cells = grid_layer(&records, 200.0);
        let total: usize = cells.iter().map(|c| c.count).sum();
        assert_eq!(total, 3);
        assert_eq!(cells.len(), 2);
        assert!(cells.iter().any(|c| c.count == 2));
    }

    #[test]
    fn test_grid_layer_rejects_bad_cell_size() {
        let records = vec![at("A", -71.0, 42.0)];
        assert!(grid_layer(&records, 0.0).is_empty());
        assert!(grid_layer(&records, f64::NAN).is_empty());
    }

    #[test]
    fn test_scatter_layer_labels_points() {
        let mut unnamed = at("", -71.0, 42.0);
        unnamed.business_name = None;
        let records = vec![at("Acme", -71.0, 42.0), unnamed];

        let points = scatter_layer(&records);
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].name, "Acme");
        assert_eq!(points[1].name, "");
    }

    #[test]
    fn test_bounds() {
        let records = vec![at("A", -71.0, 42.0), at("B", -71.2, 42.4)];
        assert_eq!(bounds(&records), Some((-71.2, 42.0, -71.0, 42.4)));
    }
}
