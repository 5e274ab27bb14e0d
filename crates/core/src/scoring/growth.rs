use crate::domain::table::TimeSeriesTable;
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Growth scoring needs more than this many periods.
pub const MIN_GROWTH_PERIODS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GrowthOutcome {
    Scored(GrowthScore),
    InsufficientData { periods: usize, metrics: usize },
}

impl GrowthOutcome {
    /// Score in [0, 10], or `None` when there was not enough history.
    pub fn score(&self) -> Option<f64> {
        match self {
            GrowthOutcome::Scored(s) => Some(s.score),
            GrowthOutcome::InsufficientData { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowthScore {
    /// Mean of the per-metric proportions, times 10.
    pub score: f64,
    /// Share of period transitions in which each metric grew, in [0, 1].
    pub per_metric: BTreeMap<String, f64>,
    pub detail: GrowthDetail,
}

/// Per period, whether each metric grew against the period just before it.
/// The oldest period has no comparator and holds `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowthDetail {
    pub rows: Vec<(NaiveDate, BTreeMap<String, Option<bool>>)>,
}

impl Serialize for GrowthDetail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for (date, grew) in &self.rows {
            map.serialize_entry(&date.to_string(), grew)?;
        }
        map.end()
    }
}

/// Proportion of period-over-period increases, averaged over every metric of `table`.
///
/// The table is most recent first by construction, so position `i` is compared with the
/// older position `i + 1`. A metric missing in either period counts as no growth.
pub fn score_growth(table: &TimeSeriesTable) -> GrowthOutcome {
    let periods = table.len();
    let metrics = table.metrics();
    if periods <= MIN_GROWTH_PERIODS || metrics.is_empty() {
        return GrowthOutcome::InsufficientData {
            periods,
            metrics: metrics.len(),
        };
    }

    let transitions = (periods - 1) as f64;
    let mut per_metric = BTreeMap::new();
    let mut rows: Vec<(NaiveDate, BTreeMap<String, Option<bool>>)> = table
        .rows()
        .iter()
        .map(|row| (row.date, BTreeMap::new()))
        .collect();

    for metric in &metrics {
        let column = table.column(metric);
        let mut grew_count = 0usize;
        for (i, slot) in rows.iter_mut().enumerate() {
            let grew = match (column.get(i).copied().flatten(), column.get(i + 1)) {
                (_, None) => None,
                (Some(current), Some(Some(older))) => Some(current > *older),
                _ => Some(false),
            };
            if grew == Some(true) {
                grew_count += 1;
            }
            slot.1.insert(metric.to_string(), grew);
        }
        per_metric.insert(metric.to_string(), grew_count as f64 / transitions);
    }

    let score = 10.0 * per_metric.values().sum::<f64>() / per_metric.len() as f64;

    GrowthOutcome::Scored(GrowthScore {
        score,
        per_metric,
        detail: GrowthDetail { rows },
    })
}
