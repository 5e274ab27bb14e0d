use crate::domain::kpis::{FREE_CASH_FLOW, GROSS_PROFIT, NET_INCOME, REVENUE, SHARES_BASIC};
use crate::domain::table::{PeriodRow, TimeSeriesTable};
use crate::error::ScoringError;
use crate::ingest::types::{FxPoint, PricePoint};
use crate::scoring::ratio;
use crate::time::calendar::ValidityInterval;
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Multiple {
    Pe,
    Ps,
    Pgp,
    Pfcf,
}

impl Multiple {
    pub const ALL: [Multiple; 4] = [Multiple::Pe, Multiple::Ps, Multiple::Pgp, Multiple::Pfcf];

    /// Component name used in weight specs and output documents.
    pub fn name(self) -> &'static str {
        match self {
            Multiple::Pe => "pe",
            Multiple::Ps => "ps",
            Multiple::Pgp => "pgp",
            Multiple::Pfcf => "pfcf",
        }
    }
}

/// One trading day: the close, the close in reporting currency, the TTM report in force
/// that day and the four multiples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MultiplesRow {
    #[serde(skip)]
    pub date: NaiveDate,
    pub close: f64,
    pub volume: Option<f64>,
    /// Reporting-currency units per price-currency unit; 1 when both currencies agree.
    pub fx_rate: Option<f64>,
    /// Close converted to the reporting currency.
    pub price: Option<f64>,
    pub report_date: Option<NaiveDate>,
    pub revenue: Option<f64>,
    pub gross_profit: Option<f64>,
    pub net_income: Option<f64>,
    pub shares: Option<f64>,
    pub free_cash_flow: Option<f64>,
    pub pe: Option<f64>,
    pub ps: Option<f64>,
    pub pgp: Option<f64>,
    pub pfcf: Option<f64>,
}

impl MultiplesRow {
    pub fn multiple(&self, m: Multiple) -> Option<f64> {
        match m {
            Multiple::Pe => self.pe,
            Multiple::Ps => self.ps,
            Multiple::Pgp => self.pgp,
            Multiple::Pfcf => self.pfcf,
        }
    }
}

/// Daily multiples, oldest day first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MultiplesTable {
    rows: Vec<MultiplesRow>,
}

impl MultiplesTable {
    pub fn rows(&self) -> &[MultiplesRow] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&MultiplesRow> {
        self.rows.last()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Every defined value of one multiple across the history.
    pub fn values(&self, m: Multiple) -> impl Iterator<Item = f64> + '_ {
        self.rows.iter().filter_map(move |row| row.multiple(m))
    }
}

impl Serialize for MultiplesTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.rows.len()))?;
        for row in &self.rows {
            map.serialize_entry(&row.date.to_string(), row)?;
        }
        map.end()
    }
}

/// Everything the builder needs for one ticker, already fetched.
#[derive(Debug, Clone, Copy)]
pub struct MultiplesInput<'a> {
    /// TTM Revenue, Gross Profit, Net Income and basic shares per report.
    pub income_ttm: &'a TimeSeriesTable,
    /// TTM Free Cash Flow per report.
    pub cash_flow_ttm: &'a TimeSeriesTable,
    pub prices: &'a [PricePoint],
    /// Daily FX closes, present only when the reporting currency is not the price currency.
    pub fx: Option<&'a [FxPoint]>,
}

/// Merges quarterly TTM fundamentals with daily prices into a daily multiples table.
///
/// Each report is in force from its own date up to, not including, the next report's
/// date; the newest report stays in force through `today`. Prices are left-joined to
/// both the FX series and the forward-filled fundamentals, so an unmatched day keeps its
/// row with undefined multiples.
pub fn build_multiples(
    input: MultiplesInput<'_>,
    today: NaiveDate,
) -> Result<MultiplesTable, ScoringError> {
    if input.prices.is_empty() {
        return Err(ScoringError::InsufficientData {
            component: "multiples",
            detail: "no daily prices".to_string(),
        });
    }

    let fundamentals = input.income_ttm.join_inner(input.cash_flow_ttm);
    if fundamentals.is_empty() {
        return Err(ScoringError::InsufficientData {
            component: "multiples",
            detail: format!(
                "no TTM report has both income ({} periods) and cash flow ({} periods)",
                input.income_ttm.len(),
                input.cash_flow_ttm.len()
            ),
        });
    }

    let in_force = replicate_daily(&fundamentals, today);
    let fx: Option<BTreeMap<NaiveDate, f64>> = input
        .fx
        .map(|rates| rates.iter().map(|p| (p.date, p.close)).collect());
    let prices: BTreeMap<NaiveDate, &PricePoint> =
        input.prices.iter().map(|p| (p.date, p)).collect();

    let rows = prices
        .into_iter()
        .map(|(date, point)| {
            let fx_rate = match &fx {
                Some(rates) => rates.get(&date).copied(),
                None => Some(1.0),
            };
            daily_row(date, point, fx_rate, in_force.get(&date).copied())
        })
        .collect();

    Ok(MultiplesTable { rows })
}

/// Calendar day to the report in force that day.
fn replicate_daily(
    fundamentals: &TimeSeriesTable,
    today: NaiveDate,
) -> BTreeMap<NaiveDate, &PeriodRow> {
    let reports: Vec<&PeriodRow> = fundamentals.oldest_first().collect();
    let mut daily = BTreeMap::new();
    for (i, report) in reports.iter().enumerate() {
        let next = reports.get(i + 1).map(|r| r.date);
        let interval = ValidityInterval::new(report.date, next, today);
        for day in interval.days() {
            daily.insert(day, *report);
        }
    }
    daily
}

fn daily_row(
    date: NaiveDate,
    point: &PricePoint,
    fx_rate: Option<f64>,
    report: Option<&PeriodRow>,
) -> MultiplesRow {
    let price = fx_rate.map(|rate| point.close * rate);
    let field = |label: &str| report.and_then(|r| r.get(label));

    let revenue = field(REVENUE);
    let gross_profit = field(GROSS_PROFIT);
    let net_income = field(NET_INCOME);
    let shares = field(SHARES_BASIC);
    let free_cash_flow = field(FREE_CASH_FLOW);

    let market_cap = price.zip(shares).map(|(p, s)| p * s);

    MultiplesRow {
        date,
        close: point.close,
        volume: point.volume,
        fx_rate,
        price,
        report_date: report.map(|r| r.date),
        revenue,
        gross_profit,
        net_income,
        shares,
        free_cash_flow,
        pe: ratio(market_cap, net_income),
        ps: ratio(market_cap, revenue),
        pgp: ratio(market_cap, gross_profit),
        pfcf: ratio(market_cap, free_cash_flow),
    }
}

#[cfg(test)]
pub(crate) fn multiples_row(date: &str, values: [Option<f64>; 4]) -> MultiplesRow {
    let [pe, ps, pgp, pfcf] = values;
    MultiplesRow {
        date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
        close: 1.0,
        volume: None,
        fx_rate: Some(1.0),
        price: Some(1.0),
        report_date: None,
        revenue: None,
        gross_profit: None,
        net_income: None,
        shares: None,
        free_cash_flow: None,
        pe,
        ps,
        pgp,
        pfcf,
    }
}

#[cfg(test)]
pub(crate) fn table_of(rows: Vec<MultiplesRow>) -> MultiplesTable {
    MultiplesTable { rows }
}
