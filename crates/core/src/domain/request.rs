use crate::domain::peers::{PeerSet, PeerSpec};
use crate::domain::weights::{FinancialWeights, WeightSpec, MULTIPLE_COMPONENTS};
use crate::error::ScoringError;
use crate::observer::ScoreObserver;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRequest {
    pub ticker: String,
    #[serde(default)]
    pub financial_weights: FinancialWeights,
    pub peers: PeerSpec,
    #[serde(default)]
    pub multiples_weights: Option<WeightSpec>,
    /// Adds the daily multiples table to the historic section of the document.
    #[serde(default)]
    pub include_history: bool,
    /// Pins the end of the newest fundamentals interval; defaults to the current UTC date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub today: Option<NaiveDate>,
}

impl ValuationRequest {
    /// Checks every weight map and turns the peer spec into its single active form.
    pub fn validate(&self, observer: &dyn ScoreObserver) -> Result<PeerSet, ScoringError> {
        if self.ticker.trim().is_empty() {
            return Err(ScoringError::malformed("ticker must be non-empty"));
        }
        self.financial_weights.validate(observer)?;
        if let Some(weights) = &self.multiples_weights {
            weights.validate("multiples", &MULTIPLE_COMPONENTS, observer)?;
        }

        let peers = PeerSet::try_from(self.peers.clone())?;
        peers.validate(observer)?;
        if let Some(own) = self.peer_list_self_reference(&peers) {
            return Err(ScoringError::malformed(format!(
                "peer set must not contain the subject ticker '{own}'"
            )));
        }
        Ok(peers)
    }

    pub fn normalized_ticker(&self) -> String {
        self.ticker.trim().to_ascii_uppercase()
    }

    fn peer_list_self_reference(&self, peers: &PeerSet) -> Option<String> {
        let own = self.normalized_ticker();
        let clashes = |t: &String| t.trim().eq_ignore_ascii_case(&own);
        let found = match peers {
            PeerSet::ByCount(_) => false,
            PeerSet::ByList(list) => list.iter().any(clashes),
            PeerSet::ByWeightedMap(map) => map.keys().any(clashes),
        };
        found.then_some(own)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::NoopObserver;
    use serde_json::json;

    #[test]
    fn parses_minimal_request() {
        let req: ValuationRequest =
            serde_json::from_value(json!({"ticker": "aaa", "peers": {"count": 3}})).unwrap();
        assert_eq!(req.normalized_ticker(), "AAA");
        assert_eq!(req.validate(&NoopObserver).unwrap(), PeerSet::ByCount(3));
        assert!(!req.include_history);
        assert!(req.multiples_weights.is_none());
    }

    #[test]
    fn parses_full_request() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "ticker": "AAA",
            "financial_weights": {
                "income": {"growth": 0.5, "peers": 0.5},
                "global": {"income": 0.4, "balance": 0.3, "cash_flow": 0.3}
            },
            "peers": {"weighted": {"BBB": 0.6, "CCC": 0.4}},
            "multiples_weights": {"pe": 0.25, "ps": 0.25, "pgp": 0.25, "pfcf": 0.25},
            "include_history": true,
            "today": "2024-06-30"
        }))
        .unwrap();
        assert!(matches!(req.validate(&NoopObserver).unwrap(), PeerSet::ByWeightedMap(_)));
        assert_eq!(req.today, NaiveDate::from_ymd_opt(2024, 6, 30));
    }

    #[test]
    fn two_peer_forms_are_malformed() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "ticker": "AAA",
            "peers": {"count": 2, "list": ["BBB"]}
        }))
        .unwrap();
        assert!(matches!(
            req.validate(&NoopObserver),
            Err(ScoringError::MalformedInput(_))
        ));
    }

    #[test]
    fn unknown_multiple_weight_is_malformed() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "ticker": "AAA",
            "peers": {"list": ["BBB"]},
            "multiples_weights": {"ev_ebitda": 1.0}
        }))
        .unwrap();
        assert!(req.validate(&NoopObserver).is_err());
    }

    #[test]
    fn subject_in_peer_list_is_malformed() {
        let req: ValuationRequest = serde_json::from_value(json!({
            "ticker": "AAA",
            "peers": {"list": ["BBB", "aaa"]}
        }))
        .unwrap();
        assert!(req.validate(&NoopObserver).is_err());
    }

    #[test]
    fn blank_ticker_is_malformed() {
        let req: ValuationRequest =
            serde_json::from_value(json!({"ticker": " ", "peers": {"count": 1}})).unwrap();
        assert!(req.validate(&NoopObserver).is_err());
    }
}
