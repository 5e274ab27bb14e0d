use crate::domain::kpis::{GROSS_PROFIT, INVENTORY, REVENUE};
use crate::domain::table::{MetricVector, PeriodRow, TimeSeriesTable};
use crate::error::ScoringError;
use crate::ingest::provider::MarketDataProvider;
use crate::ingest::types::{
    parse_cell, RawLine, RawStatement, ReportPeriod, StatementKind, PAYWALLED_CELL,
};
use crate::observer::{ScoreEvent, ScoreObserver};
use crate::time::calendar::parse_period_header;
use std::collections::BTreeMap;

/// A statement as published plus its typed, KPI-filtered view.
#[derive(Debug, Clone, PartialEq)]
pub struct StatementTables {
    pub full: RawStatement,
    pub filtered: TimeSeriesTable,
    /// Placeholder or non-numeric cells that caused a period to be dropped.
    pub dropped_cells: usize,
}

/// Fetches one statement and filters it to `kpis`.
pub async fn fetch_financial_statement(
    provider: &dyn MarketDataProvider,
    ticker: &str,
    kind: StatementKind,
    kpis: &[&str],
    period: ReportPeriod,
    observer: &dyn ScoreObserver,
) -> Result<StatementTables, ScoringError> {
    let raw = provider
        .fetch_statement(ticker, kind, period)
        .await
        .map_err(|e| ScoringError::fetch(ticker, kind.as_str(), &e))?;
    tracing::debug!(
        %ticker,
        kind = kind.as_str(),
        period = period.as_str(),
        lines = raw.lines.len(),
        periods = raw.periods.len(),
        "statement fetched"
    );
    filter_statement(raw, kpis, observer)
}

fn cell(line: &RawLine, col: usize) -> &str {
    line.cells.get(col).map(|c| c.trim()).unwrap_or("")
}

/// Restricts a published statement to `kpis`, one typed row per usable period.
///
/// A missing Gross Profit line is served by Revenue; a missing Inventory line is simply
/// not requested. Paywalled periods are skipped and any period with a non-numeric cell
/// for a requested KPI is dropped.
pub fn filter_statement(
    raw: RawStatement,
    kpis: &[&str],
    observer: &dyn ScoreObserver,
) -> Result<StatementTables, ScoringError> {
    let mut full = raw;
    let mut kpis: Vec<&str> = kpis.to_vec();

    if kpis.contains(&GROSS_PROFIT) && !full.has_line(GROSS_PROFIT) {
        if let Some(revenue) = full.line(REVENUE).cloned() {
            full.lines.push(RawLine {
                label: GROSS_PROFIT.to_string(),
                cells: revenue.cells,
            });
            observer.on_event(ScoreEvent::FieldFallback {
                target: GROSS_PROFIT,
                primary: GROSS_PROFIT.to_string(),
                used: REVENUE.to_string(),
            });
        }
    }

    if kpis.contains(&INVENTORY) && !full.has_line(INVENTORY) {
        kpis.retain(|k| *k != INVENTORY);
        observer.on_event(ScoreEvent::FieldMissing {
            field: INVENTORY.to_string(),
            context: "statement filter",
        });
    }

    let anchor = *kpis
        .first()
        .ok_or_else(|| ScoringError::malformed("kpi list must be non-empty"))?;

    let mut lines: Vec<(&str, &RawLine)> = Vec::with_capacity(kpis.len());
    for kpi in &kpis {
        match full.line(kpi) {
            Some(line) => lines.push((*kpi, line)),
            None => observer.on_event(ScoreEvent::FieldMissing {
                field: kpi.to_string(),
                context: "statement filter",
            }),
        }
    }

    let mut dropped_per_kpi: BTreeMap<&str, usize> = BTreeMap::new();
    let mut rows = Vec::with_capacity(full.periods.len());
    for (col, header) in full.periods.iter().enumerate() {
        let Some(date) = parse_period_header(header) else {
            observer.on_event(ScoreEvent::PeriodSkipped {
                header: header.clone(),
            });
            continue;
        };

        let paywalled = lines
            .iter()
            .find(|(kpi, _)| *kpi == anchor)
            .is_some_and(|(_, line)| cell(line, col) == PAYWALLED_CELL);
        if paywalled {
            continue;
        }

        let mut values = MetricVector::new();
        let mut usable = true;
        for (kpi, line) in &lines {
            match parse_cell(cell(line, col)) {
                Some(v) => {
                    values.insert(kpi.to_string(), v);
                }
                None => {
                    *dropped_per_kpi.entry(*kpi).or_default() += 1;
                    usable = false;
                }
            }
        }
        if usable {
            rows.push(PeriodRow::new(date, values));
        }
    }

    let mut dropped_cells = 0;
    for (kpi, count) in dropped_per_kpi {
        dropped_cells += count;
        observer.on_event(ScoreEvent::CellsDropped {
            kpi: kpi.to_string(),
            count,
        });
    }

    let filtered = TimeSeriesTable::from_unordered(rows)?;
    Ok(StatementTables {
        full,
        filtered,
        dropped_cells,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NoopObserver, RecordingObserver};
    use serde_json::json;

    fn statement(v: serde_json::Value) -> RawStatement {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn filters_to_requested_kpis_most_recent_first() {
        let raw = statement(json!({
            "periods": ["Dec 31, 2023", "Dec 31, 2022", "Dec 31, 2021"],
            "lines": [
                {"label": "Revenue", "cells": ["300", "200", "100"]},
                {"label": "Cost of Revenue", "cells": ["30", "20", "10"]},
                {"label": "Net Income", "cells": ["30", "20", "10"]}
            ]
        }));
        let out = filter_statement(raw, &["Revenue", "Net Income"], &NoopObserver).unwrap();
        assert_eq!(out.filtered.len(), 3);
        assert_eq!(out.dropped_cells, 0);
        let latest = out.filtered.latest().unwrap();
        assert_eq!(latest.date.to_string(), "2023-12-31");
        assert_eq!(latest.values.len(), 2);
        assert_eq!(latest.get("Revenue"), Some(300.0));
    }

    #[test]
    fn placeholder_cells_drop_the_period_and_are_counted() {
        let obs = RecordingObserver::new();
        let raw = statement(json!({
            "periods": ["2023-12-31", "2022-12-31", "2021-12-31"],
            "lines": [
                {"label": "Operating Cash Flow", "cells": ["5", "-", "3"]},
                {"label": "Free Cash Flow", "cells": ["4", "-", "n/a"]}
            ]
        }));
        let out = filter_statement(raw, &["Operating Cash Flow", "Free Cash Flow"], &obs).unwrap();
        assert_eq!(out.filtered.len(), 1);
        assert_eq!(out.dropped_cells, 3);
        assert!(obs
            .events()
            .iter()
            .any(|e| matches!(e, ScoreEvent::CellsDropped { count: 2, .. })));
    }

    #[test]
    fn paywalled_periods_are_skipped() {
        let raw = statement(json!({
            "periods": ["2023-12-31", "2022-12-31"],
            "lines": [{"label": "Revenue", "cells": ["10", "Upgrade"]}]
        }));
        let out = filter_statement(raw, &["Revenue"], &NoopObserver).unwrap();
        assert_eq!(out.filtered.len(), 1);
        assert_eq!(out.dropped_cells, 0);
    }

    #[test]
    fn short_lines_leave_later_periods_unusable() {
        let raw = statement(json!({
            "periods": ["2023-12-31", "2022-12-31", "2021-12-31"],
            "lines": [
                {"label": "Revenue", "cells": ["30", "20", "10"]},
                {"label": "Net Income", "cells": [" 3 "]}
            ]
        }));
        let out = filter_statement(raw, &["Revenue", "Net Income"], &NoopObserver).unwrap();
        assert_eq!(out.filtered.len(), 1);
        assert_eq!(out.filtered.latest().unwrap().get("Net Income"), Some(3.0));
        assert_eq!(out.dropped_cells, 2);
    }

    #[test]
    fn missing_gross_profit_is_served_by_revenue() {
        let obs = RecordingObserver::new();
        let raw = statement(json!({
            "periods": ["2023-12-31"],
            "lines": [{"label": "Revenue", "cells": ["10"]}]
        }));
        let out = filter_statement(raw, &["Revenue", "Gross Profit"], &obs).unwrap();
        assert_eq!(out.filtered.latest().unwrap().get("Gross Profit"), Some(10.0));
        assert!(out.full.has_line("Gross Profit"));
        assert!(matches!(
            obs.events().first(),
            Some(ScoreEvent::FieldFallback { target: "Gross Profit", .. })
        ));
    }

    #[test]
    fn missing_inventory_is_not_requested() {
        let raw = statement(json!({
            "periods": ["2023-12-31"],
            "lines": [{"label": "Total Assets", "cells": ["10"]}]
        }));
        let out = filter_statement(raw, &["Total Assets", "Inventory"], &NoopObserver).unwrap();
        let latest = out.filtered.latest().unwrap();
        assert_eq!(latest.values.len(), 1);
    }

    #[test]
    fn non_date_headers_are_skipped() {
        let obs = RecordingObserver::new();
        let raw = statement(json!({
            "periods": ["TTM", "2023-12-31"],
            "lines": [{"label": "Revenue", "cells": ["12", "10"]}]
        }));
        let out = filter_statement(raw, &["Revenue"], &obs).unwrap();
        assert_eq!(out.filtered.len(), 1);
        assert!(matches!(
            obs.events().first(),
            Some(ScoreEvent::PeriodSkipped { header }) if header == "TTM"
        ));
    }

    #[test]
    fn empty_kpi_list_is_malformed() {
        assert!(filter_statement(RawStatement::default(), &[], &NoopObserver).is_err());
    }
}
