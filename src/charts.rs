// 🥧 Chart series - data behind the donut, pie, bar and line widgets
//
// Pure data: the terminal dashboard and the web page draw these however
// their toolkit allows.

use crate::aggregate::group_counts;
use crate::record::{Column, Record};
use crate::store::count_values;
use serde::Serialize;

/// One slice of a pie/donut chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub label: String,
    pub count: usize,
    pub percent: f64,
}

impl Share {
    /// Slice label used on the donut chart, e.g. `"37.5%"`
    pub fn percent_label(&self) -> String {
        format!("{:.1}%", self.percent)
    }

    /// Legend entry used on the pie chart, e.g. `"Active - 37.5%"`
    pub fn legend_label(&self) -> String {
        format!("{} - {:.1}%", self.label, self.percent)
    }
}

/// Turn a frequency table into percentage shares (in the same order).
pub fn shares(counts: &[(String, usize)]) -> Vec<Share> {
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    counts
        .iter()
        .map(|(label, count)| Share {
            label: label.clone(),
            count: *count,
            percent: if total == 0 {
                0.0
            } else {
                100.0 * *count as f64 / total as f64
            },
        })
        .collect()
}

/// Shares of a column over a set of records.
pub fn column_shares<'a, I>(records: I, column: Column) -> Vec<Share>
where
    I: IntoIterator<Item = &'a Record>,
{
    shares(&count_values(records, column))
}

// ============================================================================
// LINE CHART
// ============================================================================

/// One line of the category/status chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSeries {
    pub label: String,
    /// (x index into `LineChart::x_labels`, count)
    pub points: Vec<(usize, usize)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineChart {
    pub x_labels: Vec<String>,
    pub series: Vec<LineSeries>,
}

impl LineChart {
    /// Largest y value across all series
    pub fn max_count(&self) -> usize {
        self.series
            .iter()
            .flat_map(|s| s.points.iter().map(|(_, y)| *y))
            .max()
            .unwrap_or(0)
    }
}

/// Counts per `x` value, one line per `hue` value.
///
/// Combinations that never occur have no point, so lines only connect
/// observed groups.
pub fn line_chart<'a, I>(records: I, x: Column, hue: Column) -> LineChart
where
    I: IntoIterator<Item = &'a Record>,
{
    let groups = group_counts(records, x, hue);

    let mut x_labels: Vec<String> = Vec::new();
    let mut series: Vec<LineSeries> = Vec::new();

    for group in groups {
        // groups arrive sorted by x, so a new label is always the last one
        if x_labels.last() != Some(&group.first) {
            x_labels.push(group.first.clone());
        }
        let x_index = x_labels.len() - 1;

        match series.iter_mut().find(|s| s.label == group.second) {
            Some(line) => line.points.push((x_index, group.count)),
            None => series.push(LineSeries {
                label: group.second,
                points: vec![(x_index, group.count)],
            }),
        }
    }

    series.sort_by(|a, b| a.label.cmp(&b.label));
    LineChart { x_labels, series }
}
