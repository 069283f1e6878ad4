// 📊 Aggregation - contingency tables and grouped counts
//
// Labels are sorted ascending the way a spreadsheet pivot would show them.
// Records with a missing value in either dimension are left out.

use crate::record::{Column, Record};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Label of the synthetic totals row and column.
pub const TOTAL_LABEL: &str = "Total";

// ============================================================================
// PIVOT TABLE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotTable {
    pub row_dim: Column,
    pub col_dim: Column,
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `cells[row][col]`, zero where a combination never occurs
    pub cells: Vec<Vec<usize>>,
    pub row_totals: Vec<usize>,
    pub column_totals: Vec<usize>,
    pub grand_total: usize,
}

/// One printable line of the table, totals included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRow {
    pub label: String,
    pub counts: Vec<usize>,
}

impl PivotTable {
    /// Count for a (row, column) pair. `"Total"` addresses the margins.
    pub fn count(&self, row: &str, col: &str) -> usize {
        let row_index = self.row_labels.iter().position(|l| l == row);
        let col_index = self.column_labels.iter().position(|l| l == col);

        match (row_index, col_index, row == TOTAL_LABEL, col == TOTAL_LABEL) {
            (Some(r), Some(c), _, _) => self.cells[r][c],
            (Some(r), None, _, true) => self.row_totals[r],
            (None, Some(c), true, _) => self.column_totals[c],
            (None, None, true, true) => self.grand_total,
            _ => 0,
        }
    }

    /// Column headers with the totals column appended
    pub fn header(&self) -> Vec<String> {
        self.column_labels
            .iter()
            .cloned()
            .chain(std::iter::once(TOTAL_LABEL.to_string()))
            .collect()
    }

    /// Data rows followed by the totals row, each ending with its row total
    pub fn rows(&self) -> Vec<PivotRow> {
        let mut rows: Vec<PivotRow> = self
            .row_labels
            .iter()
            .zip(&self.cells)
            .zip(&self.row_totals)
            .map(|((label, cells), total)| PivotRow {
                label: label.clone(),
                counts: cells.iter().copied().chain(std::iter::once(*total)).collect(),
            })
            .collect();

        rows.push(PivotRow {
            label: TOTAL_LABEL.to_string(),
            counts: self
                .column_totals
                .iter()
                .copied()
                .chain(std::iter::once(self.grand_total))
                .collect(),
        });

        rows
    }
}

/// Cross-tabulate `records` by two columns.
pub fn pivot<'a, I>(records: I, row_dim: Column, col_dim: Column) -> PivotTable
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut counts: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    let mut row_set = BTreeSet::new();
    let mut col_set = BTreeSet::new();

    for record in records {
        if let (Some(r), Some(c)) = (record.text(row_dim), record.text(col_dim)) {
            *counts.entry((r, c)).or_insert(0) += 1;
            row_set.insert(r);
            col_set.insert(c);
        }
    }

    let row_labels: Vec<&str> = row_set.into_iter().collect();
    let column_labels: Vec<&str> = col_set.into_iter().collect();

    let cells: Vec<Vec<usize>> = row_labels
        .iter()
        .map(|r| {
            column_labels
                .iter()
                .map(|c| counts.get(&(*r, *c)).copied().unwrap_or(0))
                .collect()
        })
        .collect();

    let row_totals: Vec<usize> = cells.iter().map(|row| row.iter().sum()).collect();
    let column_totals: Vec<usize> = (0..column_labels.len())
        .map(|c| cells.iter().map(|row| row[c]).sum())
        .collect();
    let grand_total = row_totals.iter().sum();

    PivotTable {
        row_dim,
        col_dim,
        row_labels: row_labels.into_iter().map(String::from).collect(),
        column_labels: column_labels.into_iter().map(String::from).collect(),
        cells,
        row_totals,
        column_totals,
        grand_total,
    }
}

// ============================================================================
// GROUPED COUNTS
// ============================================================================

/// Size of one (first, second) group in long form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupCount {
    pub first: String,
    pub second: String,
    pub count: usize,
}

/// Group sizes by two columns, sorted by the group keys.
pub fn group_counts<'a, I>(records: I, first: Column, second: Column) -> Vec<GroupCount>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut groups: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for record in records {
        if let (Some(a), Some(b)) = (record.text(first), record.text(second)) {
            *groups.entry((a, b)).or_insert(0) += 1;
        }
    }

    groups
        .into_iter()
        .map(|((a, b), count)| GroupCount {
            first: a.to_string(),
            second: b.to_string(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::create_test_record;

    fn records() -> Vec<Record> {
        vec![
            create_test_record(Some("A"), "02118", "Active", "Retail", "Ann"),
            create_test_record(Some("B"), "02118", "Active", "Retail", "Bo"),
            create_test_record(Some("C"), "02118", "Inactive", "Retail", "Cy"),
            create_test_record(Some("D"), "02118", "Active", "Cultivator", "Di"),
            create_test_record(Some("E"), "02118", "", "Delivery", "Ed"),
        ]
    }

    #[test]
    fn test_pivot_counts_and_zero_fill() {
        let records = records();
        let table = pivot(&records, Column::LicenseCategory, Column::LicenseStatus);

        assert_eq!(table.row_labels, vec!["Cultivator", "Retail"]);
        assert_eq!(table.column_labels, vec!["Active", "Inactive"]);
        assert_eq!(table.count("Retail", "Active"), 2);
        assert_eq!(table.count("Cultivator", "Inactive"), 0);
        assert_eq!(table.count("Delivery", "Active"), 0);
    }

    #[test]
    fn test_pivot_totals() {
        let records = records();
        let table = pivot(&records, Column::LicenseCategory, Column::LicenseStatus);

        for (r, cells) in table.cells.iter().enumerate() {
            assert_eq!(table.row_totals[r], cells.iter().sum::<usize>());
        }
        assert_eq!(table.count("Retail", TOTAL_LABEL), 3);
        assert_eq!(table.count(TOTAL_LABEL, "Active"), 3);
        // the record with an empty status is not counted
        assert_eq!(table.count(TOTAL_LABEL, TOTAL_LABEL), 4);
        assert_eq!(table.grand_total, 4);
    }

    #[test]
    fn test_pivot_rows_append_totals() {
        let records = records();
        let table = pivot(&records, Column::LicenseCategory, Column::LicenseStatus);

        assert_eq!(table.header(), vec!["Active", "Inactive", "Total"]);
        let rows = table.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1], PivotRow { label: "Retail".to_string(), counts: vec![2, 1, 3] });
        assert_eq!(rows[2], PivotRow { label: "Total".to_string(), counts: vec![3, 1, 4] });
    }

    #[test]
    fn test_pivot_of_nothing() {
        let empty: Vec<Record> = Vec::new();
        let table = pivot(&empty, Column::LicenseCategory, Column::LicenseStatus);
        assert_eq!(table.grand_total, 0);
        assert_eq!(table.rows(), vec![PivotRow { label: "Total".to_string(), counts: vec![0] }]);
    }

    #[test]
    fn test_repeated_pivot_is_identical() {
        let records = records();
        let first = pivot(&records, Column::LicenseCategory, Column::LicenseStatus);
        let second = pivot(&records, Column::LicenseCategory, Column::LicenseStatus);
        assert_eq!(first, second);
        assert_eq!(first.rows(), second.rows());
    }

    #[test]
    fn test_group_counts_sorted_by_keys() {
        let records = records();
        let groups = group_counts(&records, Column::LicenseCategory, Column::LicenseStatus);

        let keys: Vec<(&str, &str, usize)> = groups
            .iter()
            .map(|g| (g.first.as_str(), g.second.as_str(), g.count))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Cultivator", "Active", 1),
                ("Retail", "Active", 2),
                ("Retail", "Inactive", 1),
            ]
        );
    }
}
