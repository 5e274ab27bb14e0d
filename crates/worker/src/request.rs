use anyhow::Context;
use std::collections::BTreeMap;
use valuator_core::domain::peers::PeerSpec;
use valuator_core::domain::request::ValuationRequest;
use valuator_core::domain::weights::{FinancialWeights, WeightSpec};

pub const DEFAULT_PEER_COUNT: usize = 5;

/// Request flags as given on the command line, before they are turned into a request.
#[derive(Debug, Clone, Default)]
pub struct RequestFlags {
    pub ticker: Option<String>,
    pub peers: Option<usize>,
    pub peer_list: Option<String>,
    pub peer_weights: Option<String>,
    pub income_weights: Option<String>,
    pub global_weights: Option<String>,
    pub multiples_weights: Option<String>,
    pub include_history: bool,
}

/// Peer count used when no peer flag is given.
pub fn default_peer_count_from_env() -> usize {
    std::env::var("VALUATOR_PEER_COUNT")
        .ok()
        .and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_PEER_COUNT)
}

pub fn build_request(
    flags: RequestFlags,
    default_peer_count: usize,
) -> anyhow::Result<ValuationRequest> {
    let ticker = flags
        .ticker
        .filter(|t| !t.trim().is_empty())
        .context("--ticker is required unless --request is given")?;

    let peer_flags = [
        flags.peers.is_some(),
        flags.peer_list.is_some(),
        flags.peer_weights.is_some(),
    ];
    anyhow::ensure!(
        peer_flags.iter().filter(|set| **set).count() <= 1,
        "use only one of --peers, --peer-list or --peer-weights"
    );

    let peers = if let Some(list) = flags.peer_list {
        PeerSpec {
            list: Some(parse_list(&list)),
            ..PeerSpec::default()
        }
    } else if let Some(pairs) = flags.peer_weights {
        PeerSpec {
            weighted: Some(
                parse_weight_pairs(&pairs)
                    .context("invalid --peer-weights")?
                    .into_iter()
                    .map(|(ticker, w)| (ticker.to_ascii_uppercase(), w))
                    .collect(),
            ),
            ..PeerSpec::default()
        }
    } else {
        PeerSpec {
            count: Some(flags.peers.unwrap_or(default_peer_count)),
            ..PeerSpec::default()
        }
    };

    Ok(ValuationRequest {
        ticker,
        financial_weights: FinancialWeights {
            income: weight_spec(flags.income_weights.as_deref())
                .context("invalid --income-weights")?,
            global: weight_spec(flags.global_weights.as_deref())
                .context("invalid --global-weights")?,
        },
        peers,
        multiples_weights: weight_spec(flags.multiples_weights.as_deref())
            .context("invalid --multiples-weights")?,
        include_history: flags.include_history,
        today: None,
    })
}

fn weight_spec(raw: Option<&str>) -> anyhow::Result<Option<WeightSpec>> {
    raw.map(|s| parse_weight_pairs(s).map(WeightSpec::new))
        .transpose()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_ascii_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Parses `name=weight,name=weight`.
pub fn parse_weight_pairs(raw: &str) -> anyhow::Result<BTreeMap<String, f64>> {
    let mut out = BTreeMap::new();
    for pair in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let (name, weight) = pair
            .split_once('=')
            .with_context(|| format!("expected name=weight, got '{pair}'"))?;
        let name = name.trim();
        anyhow::ensure!(!name.is_empty(), "empty name in '{pair}'");
        let weight: f64 = weight
            .trim()
            .parse()
            .with_context(|| format!("weight for '{name}' is not a number"))?;
        anyhow::ensure!(
            out.insert(name.to_string(), weight).is_none(),
            "'{name}' is given twice"
        );
    }
    anyhow::ensure!(!out.is_empty(), "no weights given");
    Ok(out)
}
