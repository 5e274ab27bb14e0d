use crate::domain::table::TimeSeriesTable;
use crate::scoring::balance::{BalanceKpis, RuleOutcome};
use crate::scoring::growth::GrowthOutcome;
use crate::scoring::historic::MultipleHistory;
use crate::scoring::margins::PeerMarginScore;
use crate::scoring::multiples::MultiplesTable;
use crate::scoring::peer_multiples::PeerMultiplesScore;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

/// Everything computed for one valuation request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDocument {
    pub ticker: String,
    pub as_of: NaiveDate,
    /// Peers after resolution, in request or discovery order.
    pub peers: Vec<String>,
    pub financials: FinancialsSection,
    pub price_historic: HistoricSection,
    pub price_peers: PeerMultiplesScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinancialsSection {
    pub income: IncomeSection,
    pub balance: BalanceSection,
    pub cash_flow: CashFlowSection,
    /// Global financial-health score, two decimals.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncomeSection {
    /// Annual income KPIs, most recent first.
    pub table: TimeSeriesTable,
    pub growth: GrowthOutcome,
    pub margins: PeerMarginScore,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceSection {
    pub kpis: BalanceKpis,
    pub rules: Vec<RuleOutcome>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashFlowSection {
    pub table: TimeSeriesTable,
    pub growth: GrowthOutcome,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricSection {
    pub detail: BTreeMap<&'static str, MultipleHistory>,
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiples: Option<MultiplesTable>,
}
