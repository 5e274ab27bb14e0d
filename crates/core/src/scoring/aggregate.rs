use crate::domain::weights::WeightSpec;
use crate::scoring::round2;

/// Combines component scores of one scale into one score of the same scale.
///
/// With weights: the weighted sum over positively weighted components, undefined if any
/// of those is undefined. Without: the mean of the defined components.
pub fn combine(components: &[(&str, Option<f64>)], weights: Option<&WeightSpec>) -> Option<f64> {
    match weights {
        Some(weights) => components
            .iter()
            .map(|(name, score)| (weights.weight(name), *score))
            .filter(|(w, _)| *w > 0.0)
            .try_fold(0.0, |acc, (w, score)| Some(acc + w * score?)),
        None => {
            let defined: Vec<f64> = components.iter().filter_map(|(_, s)| *s).collect();
            if defined.is_empty() {
                None
            } else {
                Some(defined.iter().sum::<f64>() / defined.len() as f64)
            }
        }
    }
}

/// Income statement score from the annual growth score and the peer margin score.
pub fn score_income(
    growth: Option<f64>,
    peers: Option<f64>,
    weights: Option<&WeightSpec>,
) -> Option<f64> {
    combine(&[("growth", growth), ("peers", peers)], weights)
}

/// Overall financial health, rounded to two decimals.
pub fn score_financial(
    income: Option<f64>,
    balance: Option<f64>,
    cash_flow: Option<f64>,
    weights: Option<&WeightSpec>,
) -> Option<f64> {
    combine(
        &[("income", income), ("balance", balance), ("cash_flow", cash_flow)],
        weights,
    )
    .map(round2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unweighted_mean_skips_undefined() {
        assert_eq!(combine(&[("a", Some(4.0)), ("b", None), ("c", Some(8.0))], None), Some(6.0));
        assert_eq!(combine(&[("a", None)], None), None);
    }

    #[test]
    fn weighted_sum_ignores_zero_weights() {
        let w = WeightSpec::new([("a", 0.25), ("b", 0.75)]);
        assert_eq!(
            combine(&[("a", Some(4.0)), ("b", Some(8.0)), ("c", None)], Some(&w)),
            Some(7.0)
        );
    }

    #[test]
    fn weighted_sum_with_undefined_weighted_component_is_undefined() {
        let w = WeightSpec::new([("a", 0.5), ("b", 0.5)]);
        assert_eq!(combine(&[("a", Some(4.0)), ("b", None)], Some(&w)), None);
    }

    #[test]
    fn income_score_with_even_weights() {
        let w = WeightSpec::new([("growth", 0.5), ("peers", 0.5)]);
        assert_eq!(score_income(Some(10.0), Some(10.0), Some(&w)), Some(10.0));
    }

    #[test]
    fn financial_score_is_rounded() {
        assert_eq!(score_financial(Some(10.0), Some(20.0 / 3.0), Some(5.0), None), Some(7.22));
    }
}
