use crate::domain::weights::WeightSpec;
use crate::scoring::aggregate::combine;
use crate::scoring::multiples::{Multiple, MultiplesTable};
use crate::scoring::round2;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MultipleHistory {
    pub current: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// (max - current) / (max - min), in [0, 1]; `None` for a flat or empty history.
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricMultiplesScore {
    pub score: Option<f64>,
    pub detail: BTreeMap<&'static str, MultipleHistory>,
}

/// Places each multiple's latest value inside its own min-max range.
///
/// The equally weighted score is rounded to two decimals; a weighted score is not.
///
/// Negative multiples are kept: a negative P/E widens the range the same way any other
/// value does. Peer ranking discards them, this scorer does not.
pub fn score_historic_multiples(
    table: &MultiplesTable,
    weights: Option<&WeightSpec>,
) -> HistoricMultiplesScore {
    let detail: BTreeMap<&'static str, MultipleHistory> = Multiple::ALL
        .iter()
        .map(|m| (m.name(), history(table, *m)))
        .collect();

    let components: Vec<(&str, Option<f64>)> =
        detail.iter().map(|(name, h)| (*name, h.score)).collect();
    let score = combine(&components, weights).map(|s| match weights {
        Some(_) => 10.0 * s,
        None => round2(10.0 * s),
    });

    HistoricMultiplesScore { score, detail }
}

fn history(table: &MultiplesTable, m: Multiple) -> MultipleHistory {
    let current = table.latest().and_then(|row| row.multiple(m));
    let (min, max) = table.values(m).fold((None, None), |(lo, hi), v| {
        (
            Some(lo.map_or(v, |lo: f64| lo.min(v))),
            Some(hi.map_or(v, |hi: f64| hi.max(v))),
        )
    });

    let score = match (current, min, max) {
        (Some(current), Some(min), Some(max)) if max > min => Some((max - current) / (max - min)),
        _ => None,
    };

    MultipleHistory {
        current,
        min,
        max,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::multiples::{multiples_row, table_of};

    #[test]
    fn current_at_low_scores_one_and_at_high_scores_zero() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(10.0), Some(1.0), Some(2.0), Some(5.0)]),
            multiples_row("2024-01-02", [Some(30.0), Some(3.0), Some(2.0), Some(7.0)]),
            multiples_row("2024-01-03", [Some(10.0), Some(3.0), Some(3.0), Some(6.0)]),
        ]);
        let out = score_historic_multiples(&table, None);
        assert_eq!(out.detail["pe"].score, Some(1.0));
        assert_eq!(out.detail["ps"].score, Some(0.0));
        assert_eq!(out.detail["pgp"].score, Some(0.0));
        assert_eq!(out.detail["pfcf"].score, Some(0.5));
        assert_eq!(out.score, Some(10.0 * 1.5 / 4.0));
    }

    #[test]
    fn equally_weighted_score_is_rounded() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(10.0), Some(10.0), Some(10.0), None]),
            multiples_row("2024-01-02", [Some(40.0), Some(40.0), Some(40.0), None]),
            multiples_row("2024-01-03", [Some(30.0), Some(30.0), Some(20.0), None]),
        ]);
        let out = score_historic_multiples(&table, None);
        // (1/3 + 1/3 + 2/3) / 3 * 10
        assert_eq!(out.score, Some(4.44));
    }

    #[test]
    fn flat_history_is_undefined() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(12.0), None, None, None]),
            multiples_row("2024-01-02", [Some(12.0), None, None, None]),
        ]);
        let out = score_historic_multiples(&table, None);
        assert_eq!(out.detail["pe"].score, None);
        assert_eq!(out.detail["pe"].min, Some(12.0));
        assert_eq!(out.score, None);
    }

    #[test]
    fn undefined_latest_value_is_undefined() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(12.0), None, None, None]),
            multiples_row("2024-01-02", [Some(14.0), None, None, None]),
            multiples_row("2024-01-03", [None, None, None, None]),
        ]);
        assert_eq!(score_historic_multiples(&table, None).detail["pe"].score, None);
    }

    #[test]
    fn negative_current_multiple_sits_at_the_low_end() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(15.0), None, None, None]),
            multiples_row("2024-01-02", [Some(30.0), None, None, None]),
            multiples_row("2024-01-03", [Some(-5.0), None, None, None]),
        ]);
        let out = score_historic_multiples(&table, None);
        assert_eq!(out.detail["pe"].min, Some(-5.0));
        assert_eq!(out.detail["pe"].score, Some(1.0));
        assert_eq!(out.score, Some(10.0));
    }

    #[test]
    fn weighted_combination() {
        let table = table_of(vec![
            multiples_row("2024-01-01", [Some(10.0), Some(1.0), Some(1.0), Some(1.0)]),
            multiples_row("2024-01-02", [Some(20.0), Some(2.0), Some(2.0), Some(2.0)]),
            multiples_row("2024-01-03", [Some(10.0), Some(2.0), Some(2.0), Some(2.0)]),
        ]);
        let weights = WeightSpec::new([("pe", 0.5), ("ps", 0.5)]);
        let out = score_historic_multiples(&table, Some(&weights));
        assert_eq!(out.score, Some(5.0));
    }
}
