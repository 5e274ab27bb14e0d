use crate::error::ScoringError;
use chrono::NaiveDate;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{BTreeMap, BTreeSet};

/// One period's named numeric values.
pub type MetricVector = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodRow {
    pub date: NaiveDate,
    pub values: MetricVector,
}

impl PeriodRow {
    pub fn new(date: NaiveDate, values: MetricVector) -> Self {
        Self { date, values }
    }

    pub fn get(&self, metric: &str) -> Option<f64> {
        self.values.get(metric).copied()
    }
}

/// Period-indexed table of metrics, always held most recent period first.
///
/// The ordering is part of the type: constructors either validate it
/// ([`TimeSeriesTable::from_descending`]) or establish it from the dates
/// ([`TimeSeriesTable::from_unordered`]). Duplicate dates are rejected.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesTable {
    rows: Vec<PeriodRow>,
}

impl TimeSeriesTable {
    /// Accepts rows that are already strictly descending by date.
    pub fn from_descending(rows: Vec<PeriodRow>) -> Result<Self, ScoringError> {
        for pair in rows.windows(2) {
            if pair[0].date <= pair[1].date {
                return Err(ScoringError::malformed(format!(
                    "periods must be strictly descending by date: {} is followed by {}",
                    pair[0].date, pair[1].date
                )));
            }
        }
        Ok(Self { rows })
    }

    /// Sorts rows most recent first; duplicate dates are malformed.
    pub fn from_unordered(mut rows: Vec<PeriodRow>) -> Result<Self, ScoringError> {
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        if let Some(pair) = rows.windows(2).find(|pair| pair[0].date == pair[1].date) {
            return Err(ScoringError::malformed(format!(
                "duplicate period {}",
                pair[0].date
            )));
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows, most recent first.
    pub fn rows(&self) -> &[PeriodRow] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&PeriodRow> {
        self.rows.first()
    }

    pub fn oldest_first(&self) -> impl Iterator<Item = &PeriodRow> {
        self.rows.iter().rev()
    }

    /// Every metric name that appears in at least one period.
    pub fn metrics(&self) -> BTreeSet<&str> {
        self.rows
            .iter()
            .flat_map(|row| row.values.keys().map(String::as_str))
            .collect()
    }

    /// Values of one metric, most recent first.
    pub fn column(&self, metric: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|row| row.get(metric)).collect()
    }

    /// Inner join on period date; metrics from `other` overwrite same-named ones.
    pub fn join_inner(&self, other: &TimeSeriesTable) -> TimeSeriesTable {
        let by_date: BTreeMap<NaiveDate, &PeriodRow> =
            other.rows.iter().map(|row| (row.date, row)).collect();

        let rows = self
            .rows
            .iter()
            .filter_map(|row| {
                let matched = by_date.get(&row.date)?;
                let mut values = row.values.clone();
                values.extend(matched.values.iter().map(|(k, v)| (k.clone(), *v)));
                Some(PeriodRow::new(row.date, values))
            })
            .collect();

        TimeSeriesTable { rows }
    }
}

impl Serialize for TimeSeriesTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for row in &self.rows {
            map.serialize_entry(&row.date.to_string(), &row.values)?;
        }
        map.end()
    }
}

#[cfg(test)]
pub(crate) fn row(date: &str, values: &[(&str, f64)]) -> PeriodRow {
    PeriodRow::new(
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        values.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_descending_rejects_ascending_rows() {
        let rows = vec![
            row("2022-12-31", &[("Revenue", 1.0)]),
            row("2023-12-31", &[("Revenue", 2.0)]),
        ];
        let err = TimeSeriesTable::from_descending(rows).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedInput(_)));
    }

    #[test]
    fn from_descending_rejects_duplicates() {
        let rows = vec![
            row("2023-12-31", &[("Revenue", 1.0)]),
            row("2023-12-31", &[("Revenue", 2.0)]),
        ];
        assert!(TimeSeriesTable::from_descending(rows).is_err());
    }

    #[test]
    fn from_unordered_sorts_most_recent_first() {
        let rows = vec![
            row("2021-12-31", &[("Revenue", 1.0)]),
            row("2023-12-31", &[("Revenue", 3.0)]),
            row("2022-12-31", &[("Revenue", 2.0)]),
        ];
        let table = TimeSeriesTable::from_unordered(rows).unwrap();
        assert_eq!(table.column("Revenue"), vec![Some(3.0), Some(2.0), Some(1.0)]);
        assert_eq!(
            table.oldest_first().next().map(|r| r.date.to_string()),
            Some("2021-12-31".to_string())
        );
    }

    #[test]
    fn join_inner_keeps_matching_dates_only() {
        let income = TimeSeriesTable::from_unordered(vec![
            row("2023-06-30", &[("Revenue", 10.0)]),
            row("2023-03-31", &[("Revenue", 9.0)]),
        ])
        .unwrap();
        let cash = TimeSeriesTable::from_unordered(vec![row(
            "2023-06-30",
            &[("Free Cash Flow", 2.0)],
        )])
        .unwrap();

        let joined = income.join_inner(&cash);
        assert_eq!(joined.len(), 1);
        let latest = joined.latest().unwrap();
        assert_eq!(latest.get("Revenue"), Some(10.0));
        assert_eq!(latest.get("Free Cash Flow"), Some(2.0));
    }

    #[test]
    fn serializes_as_period_keyed_map() {
        let table =
            TimeSeriesTable::from_unordered(vec![row("2023-12-31", &[("Revenue", 5.0)])]).unwrap();
        let v = serde_json::to_value(&table).unwrap();
        assert_eq!(v["2023-12-31"]["Revenue"], 5.0);
    }
}
