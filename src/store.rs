// 🗃️ RecordStore - the registry held in memory
//
// Loaded once at startup and never mutated afterwards. Every view the
// dashboard renders is derived from a shared `&RecordStore`.

use crate::error::LoadError;
use crate::record::{Column, Record, REQUIRED_COLUMNS};
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
    records: Vec<Record>,
    source: Option<PathBuf>,
}

impl RecordStore {
    /// Parse the registry CSV at `path`.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let reader = reader_builder().from_path(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut store = Self::from_csv(reader)?;
        store.source = Some(path.to_path_buf());

        tracing::info!(
            path = %path.display(),
            records = store.len(),
            "Registry loaded"
        );

        Ok(store)
    }

    /// Parse registry CSV from any reader (tests, embedded data).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        Self::from_csv(reader_builder().from_reader(reader))
    }

    /// Wrap already-typed records, e.g. rows read back from the SQLite snapshot.
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            records,
            source: None,
        }
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self, LoadError> {
        let headers = reader.headers().map_err(LoadError::Header)?.clone();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|required| !headers.iter().any(|h| h == **required))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(LoadError::MissingColumns(missing));
        }

        let mut records = Vec::new();
        for (index, result) in reader.deserialize::<Record>().enumerate() {
            let record = result.map_err(|source| LoadError::MalformedRow {
                // header is line 1, first data row is row 1
                row: source
                    .position()
                    .map(|p| p.line().saturating_sub(1))
                    .unwrap_or(index as u64 + 1),
                source,
            })?;
            records.push(record);
        }

        tracing::debug!(records = records.len(), "Parsed registry rows");

        Ok(Self {
            records,
            source: None,
        })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// File the store was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// First `n` records, for the raw datasheet.
    pub fn head(&self, n: usize) -> &[Record] {
        &self.records[..n.min(self.records.len())]
    }

    /// Distinct non-null values of `column` in first-seen order.
    ///
    /// Used to populate selection controls; the order is stable across
    /// render passes because the store never changes.
    pub fn column_values(&self, column: Column) -> Vec<String> {
        distinct(self.records.iter(), column)
    }

    /// Frequency table over `column`, most frequent first.
    ///
    /// Ties keep first-seen order. Null cells are not counted.
    pub fn aggregate_count(&self, column: Column) -> Vec<(String, usize)> {
        count_values(self.records.iter(), column)
    }
}

fn reader_builder() -> csv::ReaderBuilder {
    let mut builder = csv::ReaderBuilder::new();
    builder.trim(csv::Trim::Headers);
    builder
}

/// Distinct values over any record sequence.
pub fn distinct<'a, I>(records: I, column: Column) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut seen: HashSet<&str> = HashSet::new();
    let mut values = Vec::new();
    for record in records {
        if let Some(value) = record.text(column) {
            if seen.insert(value) {
                values.push(value.to_string());
            }
        }
    }
    values
}

/// Frequency table over any record sequence.
pub fn count_values<'a, I>(records: I, column: Column) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for record in records {
        if let Some(value) = record.text(column) {
            match slots.get(value) {
                Some(&slot) => counts[slot].1 += 1,
                None => {
                    slots.insert(value, counts.len());
                    counts.push((value, 1));
                }
            }
        }
    }

    // stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .map(|(value, count)| (value.to_string(), count))
        .collect()
}
