use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const PLACEHOLDER_CELL: &str = "-";
pub const PAYWALLED_CELL: &str = "Upgrade";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Income,
    BalanceSheet,
    CashFlow,
}

impl StatementKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementKind::Income => "income",
            StatementKind::BalanceSheet => "balance_sheet",
            StatementKind::CashFlow => "cash_flow",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportPeriod {
    Annual,
    Ttm,
}

impl ReportPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportPeriod::Annual => "annual",
            ReportPeriod::Ttm => "ttm",
        }
    }
}

/// A financial statement exactly as published: one line per item, one text cell per
/// reported period, period headers most recent first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawStatement {
    pub periods: Vec<String>,
    pub lines: Vec<RawLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawLine {
    pub label: String,
    pub cells: Vec<String>,
}

impl RawStatement {
    pub fn line(&self, label: &str) -> Option<&RawLine> {
        self.lines.iter().find(|line| line.label == label)
    }

    pub fn has_line(&self, label: &str) -> bool {
        self.line(label).is_some()
    }

    /// Line items of the most recent reported period.
    pub fn latest_items(&self) -> LineItems {
        self.items_at(0)
    }

    pub fn items_at(&self, column: usize) -> LineItems {
        LineItems {
            items: self
                .lines
                .iter()
                .map(|line| {
                    let cell = line.cells.get(column).map(String::as_str).unwrap_or("");
                    (line.label.clone(), parse_cell(cell))
                })
                .collect(),
        }
    }
}

/// One period of a statement, in published line order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineItems {
    items: Vec<(String, Option<f64>)>,
}

impl LineItems {
    pub fn new(items: Vec<(String, Option<f64>)>) -> Self {
        Self { items }
    }

    /// Numeric value of a reported line; `None` if absent or not numeric.
    pub fn get(&self, label: &str) -> Option<f64> {
        self.items
            .iter()
            .find(|(l, _)| l == label)
            .and_then(|(_, v)| *v)
    }

    pub fn position(&self, label: &str) -> Option<usize> {
        self.items.iter().position(|(l, _)| l == label)
    }

    pub fn slice(&self, start: usize, end: usize) -> &[(String, Option<f64>)] {
        let end = end.min(self.items.len());
        let start = start.min(end);
        &self.items[start..end]
    }
}

/// Reads a published cell: thousands separators are ignored, placeholders are `None`.
pub fn parse_cell(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == PLACEHOLDER_CELL {
        return None;
    }
    s.replace(',', "").parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
    #[serde(default)]
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FxPoint {
    pub date: NaiveDate,
    /// Units of the reporting currency per one unit of the price currency.
    pub close: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub financial_currency: String,
}
