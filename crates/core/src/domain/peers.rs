use crate::domain::weights::WEIGHT_SUM_TOLERANCE;
use crate::error::ScoringError;
use crate::observer::{ScoreEvent, ScoreObserver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Peer specification as it arrives on the wire: exactly one field must be set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weighted: Option<BTreeMap<String, f64>>,
}

/// Which peers to compare against.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerSet {
    /// Discover this many peers through the market-data provider.
    ByCount(usize),
    /// Explicit peers, weighted equally.
    ByList(Vec<String>),
    /// Explicit peers with caller-supplied weights summing to at most one.
    ByWeightedMap(BTreeMap<String, f64>),
}

impl TryFrom<PeerSpec> for PeerSet {
    type Error = ScoringError;

    fn try_from(spec: PeerSpec) -> Result<Self, Self::Error> {
        match (spec.count, spec.list, spec.weighted) {
            (Some(n), None, None) => Ok(PeerSet::ByCount(n)),
            (None, Some(list), None) => Ok(PeerSet::ByList(list)),
            (None, None, Some(map)) => Ok(PeerSet::ByWeightedMap(map)),
            (None, None, None) => Err(ScoringError::malformed(
                "peers must set one of count, list or weighted",
            )),
            _ => Err(ScoringError::malformed(
                "peers must set exactly one of count, list or weighted",
            )),
        }
    }
}

impl PeerSet {
    pub fn validate(&self, observer: &dyn ScoreObserver) -> Result<(), ScoringError> {
        match self {
            PeerSet::ByCount(n) => {
                if *n == 0 {
                    return Err(ScoringError::malformed("peer count must be at least 1"));
                }
            }
            PeerSet::ByList(list) => {
                if list.is_empty() {
                    return Err(ScoringError::malformed("peer list must be non-empty"));
                }
                reject_duplicate_tickers(list.iter())?;
            }
            PeerSet::ByWeightedMap(map) => {
                if map.is_empty() {
                    return Err(ScoringError::malformed("weighted peer map must be non-empty"));
                }
                reject_duplicate_tickers(map.keys())?;
                for (ticker, weight) in map {
                    if !weight.is_finite() || *weight < 0.0 {
                        return Err(ScoringError::malformed(format!(
                            "peer weight for '{ticker}' must be a non-negative number (got {weight})"
                        )));
                    }
                }
                let sum: f64 = map.values().sum();
                if sum > 1.0 + WEIGHT_SUM_TOLERANCE {
                    return Err(ScoringError::malformed(format!(
                        "peer weights must sum to at most 1 (got {sum})"
                    )));
                }
                if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
                    observer.on_event(ScoreEvent::WeightSumMismatch {
                        spec: "peers",
                        sum,
                    });
                }
            }
        }
        Ok(())
    }

    /// Number of peers to discover, if this set is resolved through discovery.
    pub fn discovery_count(&self) -> Option<usize> {
        match self {
            PeerSet::ByCount(n) => Some(*n),
            _ => None,
        }
    }

    /// Normalizes into the ordered peer list and weight lookup every scorer consumes.
    /// `discovered` is only read for [`PeerSet::ByCount`].
    pub fn into_resolved(self, discovered: Vec<String>) -> ResolvedPeers {
        match self {
            PeerSet::ByCount(n) => {
                let mut seen = BTreeSet::new();
                let tickers = discovered
                    .into_iter()
                    .map(|t| normalize_ticker(&t))
                    .filter(|t| !t.is_empty() && seen.insert(t.clone()))
                    .take(n)
                    .collect();
                ResolvedPeers {
                    tickers,
                    weights: PeerWeights::Uniform,
                }
            }
            PeerSet::ByList(list) => ResolvedPeers {
                tickers: list.iter().map(|t| normalize_ticker(t)).collect(),
                weights: PeerWeights::Uniform,
            },
            PeerSet::ByWeightedMap(map) => {
                let map: BTreeMap<String, f64> =
                    map.iter().map(|(t, w)| (normalize_ticker(t), *w)).collect();
                ResolvedPeers {
                    tickers: map.keys().cloned().collect(),
                    weights: PeerWeights::Explicit(map),
                }
            }
        }
    }
}

pub fn normalize_ticker(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// Tickers are compared after trimming and uppercasing.
fn reject_duplicate_tickers<'a>(
    tickers: impl Iterator<Item = &'a String>,
) -> Result<(), ScoringError> {
    let mut seen = BTreeSet::new();
    for ticker in tickers {
        let t = normalize_ticker(ticker);
        if t.is_empty() {
            return Err(ScoringError::malformed("peer tickers must be non-empty"));
        }
        if !seen.insert(t.clone()) {
            return Err(ScoringError::malformed(format!("duplicate peer ticker '{t}'")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub enum PeerWeights {
    /// Each peer that could be scored weighs `1 / scored`.
    Uniform,
    Explicit(BTreeMap<String, f64>),
}

impl PeerWeights {
    pub fn weight(&self, ticker: &str, scored: usize) -> f64 {
        match self {
            PeerWeights::Uniform if scored == 0 => 0.0,
            PeerWeights::Uniform => 1.0 / scored as f64,
            PeerWeights::Explicit(map) => map.get(ticker).copied().unwrap_or(0.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPeers {
    pub tickers: Vec<String>,
    pub weights: PeerWeights,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::{NoopObserver, RecordingObserver};
    use serde_json::json;

    fn parse(v: serde_json::Value) -> Result<PeerSet, ScoringError> {
        PeerSet::try_from(serde_json::from_value::<PeerSpec>(v).unwrap())
    }

    #[test]
    fn exactly_one_form_is_accepted() {
        assert_eq!(parse(json!({"count": 3})).unwrap(), PeerSet::ByCount(3));
        assert!(matches!(
            parse(json!({"list": ["BBB"]})).unwrap(),
            PeerSet::ByList(_)
        ));
        assert!(matches!(
            parse(json!({"weighted": {"BBB": 1.0}})).unwrap(),
            PeerSet::ByWeightedMap(_)
        ));
    }

    #[test]
    fn multiple_forms_are_malformed() {
        let err = parse(json!({"count": 3, "list": ["BBB"]})).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedInput(_)));
        assert!(parse(json!({})).is_err());
    }

    #[test]
    fn weights_above_one_are_rejected() {
        let set = parse(json!({"weighted": {"BBB": 0.7, "CCC": 0.6}})).unwrap();
        assert!(set.validate(&NoopObserver).is_err());
    }

    #[test]
    fn weights_below_one_are_flagged() {
        let obs = RecordingObserver::new();
        let set = parse(json!({"weighted": {"BBB": 0.4, "CCC": 0.4}})).unwrap();
        set.validate(&obs).unwrap();
        assert!(matches!(
            obs.events().as_slice(),
            [ScoreEvent::WeightSumMismatch { spec: "peers", .. }]
        ));
    }

    #[test]
    fn duplicate_list_entries_are_rejected() {
        let set = PeerSet::ByList(vec!["BBB".to_string(), " BBB".to_string()]);
        assert!(set.validate(&NoopObserver).is_err());
    }

    #[test]
    fn weighted_keys_that_normalize_to_the_same_ticker_are_rejected() {
        let set = parse(json!({"weighted": {"BBB": 0.5, " bbb": 0.5}})).unwrap();
        let err = set.validate(&NoopObserver).unwrap_err();
        assert!(matches!(err, ScoringError::MalformedInput(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn weighted_keys_are_normalized_on_resolution() {
        let resolved = PeerSet::ByWeightedMap(BTreeMap::from([(" ccc ".to_string(), 1.0)]))
            .into_resolved(Vec::new());
        assert_eq!(resolved.tickers, vec!["CCC"]);
        assert_eq!(resolved.weights.weight("CCC", 1), 1.0);
    }

    #[test]
    fn count_resolution_truncates_discovered_peers() {
        let resolved = PeerSet::ByCount(2).into_resolved(vec![
            "BBB".to_string(),
            "BBB".to_string(),
            "CCC".to_string(),
            "DDD".to_string(),
        ]);
        assert_eq!(resolved.tickers, vec!["BBB", "CCC"]);
        assert_eq!(resolved.weights.weight("BBB", 2), 0.5);
    }

    #[test]
    fn explicit_weights_are_looked_up_per_ticker() {
        let resolved = PeerSet::ByWeightedMap(BTreeMap::from([
            ("BBB".to_string(), 0.25),
            ("CCC".to_string(), 0.75),
        ]))
        .into_resolved(Vec::new());
        assert_eq!(resolved.weights.weight("CCC", 1), 0.75);
        assert_eq!(resolved.weights.weight("ZZZ", 1), 0.0);
    }
}
