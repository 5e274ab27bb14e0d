use crate::domain::kpis::{GROSS_PROFIT, NET_INCOME, OPERATING_INCOME, REVENUE};
use crate::domain::peers::PeerWeights;
use crate::domain::table::TimeSeriesTable;
use crate::error::ScoringError;
use crate::scoring::ratio;
use serde::Serialize;
use std::collections::BTreeMap;

/// Gross, operating and net margin of the most recent TTM period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Margins {
    pub gross: Option<f64>,
    pub operating: Option<f64>,
    pub net: Option<f64>,
}

impl Margins {
    pub fn from_latest(table: &TimeSeriesTable) -> Result<Self, ScoringError> {
        let latest = table.latest().ok_or_else(|| ScoringError::InsufficientData {
            component: "margins",
            detail: "income statement has no periods".to_string(),
        })?;
        let revenue = latest.get(REVENUE);
        Ok(Self {
            gross: ratio(latest.get(GROSS_PROFIT), revenue),
            operating: ratio(latest.get(OPERATING_INCOME), revenue),
            net: ratio(latest.get(NET_INCOME), revenue),
        })
    }

    fn as_array(&self) -> [Option<f64>; 3] {
        [self.gross, self.operating, self.net]
    }

    /// How many of the three margins are strictly higher than `other`'s.
    /// An undefined margin on either side is not a win.
    pub fn beats(&self, other: &Margins) -> usize {
        self.as_array()
            .into_iter()
            .zip(other.as_array())
            .filter(|pair| matches!(pair, (Some(a), Some(b)) if a > b))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerMarginScore {
    /// 10 x sum of peer contributions; `None` when no peer could be compared.
    pub score: Option<f64>,
    pub subject: Margins,
    pub peers: BTreeMap<String, Margins>,
    /// weight x beats / 3, per peer.
    pub contributions: BTreeMap<String, f64>,
}

/// Compares the subject's margins against every peer that has data.
///
/// Peers missing from `peers` were skipped upstream; with uniform weights the remaining
/// peers share the whole weight.
pub fn score_peer_margins(
    subject: Margins,
    peers: Vec<(String, Margins)>,
    weights: &PeerWeights,
) -> PeerMarginScore {
    let scored = peers.len();
    let mut contributions = BTreeMap::new();
    for (ticker, margins) in &peers {
        let w = weights.weight(ticker, scored);
        let contribution = w * subject.beats(margins) as f64 / 3.0;
        tracing::debug!(%ticker, weight = w, contribution, "peer margin contribution");
        contributions.insert(ticker.clone(), contribution);
    }

    let score = (scored > 0).then(|| 10.0 * contributions.values().sum::<f64>());

    PeerMarginScore {
        score,
        subject,
        peers: peers.into_iter().collect(),
        contributions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::row;

    fn margins(g: f64, o: f64, n: f64) -> Margins {
        Margins {
            gross: Some(g),
            operating: Some(o),
            net: Some(n),
        }
    }

    #[test]
    fn margins_use_latest_period() {
        let t = TimeSeriesTable::from_descending(vec![
            row(
                "2024-06-30",
                &[
                    (REVENUE, 200.0),
                    (GROSS_PROFIT, 100.0),
                    (OPERATING_INCOME, 50.0),
                    (NET_INCOME, 20.0),
                ],
            ),
            row("2024-03-31", &[(REVENUE, 1.0), (GROSS_PROFIT, 1.0)]),
        ])
        .unwrap();
        assert_eq!(Margins::from_latest(&t).unwrap(), margins(0.5, 0.25, 0.1));
    }

    #[test]
    fn zero_revenue_leaves_margins_undefined() {
        let t = TimeSeriesTable::from_descending(vec![row(
            "2024-06-30",
            &[(REVENUE, 0.0), (GROSS_PROFIT, 1.0)],
        )])
        .unwrap();
        assert_eq!(Margins::from_latest(&t).unwrap(), Margins::default());
    }

    #[test]
    fn beating_every_peer_on_all_margins_scores_ten() {
        let out = score_peer_margins(
            margins(0.6, 0.3, 0.2),
            vec![
                ("BBB".to_string(), margins(0.5, 0.2, 0.1)),
                ("CCC".to_string(), margins(0.4, 0.1, 0.05)),
            ],
            &PeerWeights::Uniform,
        );
        assert_eq!(out.score, Some(10.0));
    }

    #[test]
    fn ties_do_not_count_as_wins() {
        let out = score_peer_margins(
            margins(0.5, 0.3, 0.2),
            vec![("BBB".to_string(), margins(0.5, 0.2, 0.3))],
            &PeerWeights::Uniform,
        );
        let score = out.score.unwrap();
        assert!((score - 10.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn explicit_weights_leave_remainder_unused() {
        let weights = PeerWeights::Explicit(BTreeMap::from([("BBB".to_string(), 0.5)]));
        let out = score_peer_margins(
            margins(0.6, 0.3, 0.2),
            vec![("BBB".to_string(), margins(0.5, 0.2, 0.1))],
            &weights,
        );
        assert_eq!(out.score, Some(5.0));
    }

    #[test]
    fn no_comparable_peer_is_undefined() {
        let out = score_peer_margins(margins(0.6, 0.3, 0.2), Vec::new(), &PeerWeights::Uniform);
        assert_eq!(out.score, None);
    }
}
