use crate::domain::weights::WeightSpec;
use crate::scoring::aggregate::combine;
use crate::scoring::multiples::{Multiple, MultiplesRow};
use chrono::NaiveDate;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// One company's latest multiples and where they rank among the compared set.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntity {
    pub ticker: String,
    pub date: NaiveDate,
    /// Latest multiples, negatives already discarded. Indexed like [`Multiple::ALL`].
    pub values: [Option<f64>; 4],
    /// Per-multiple rank score in [0, 1], cheapest = 1.
    pub ranks: [Option<f64>; 4],
    /// 10 x combined rank score.
    pub score: Option<f64>,
}

impl RankedEntity {
    pub fn value(&self, m: Multiple) -> Option<f64> {
        self.values[index(m)]
    }

    pub fn rank(&self, m: Multiple) -> Option<f64> {
        self.ranks[index(m)]
    }
}

fn index(m: Multiple) -> usize {
    m as usize
}

impl Serialize for RankedEntity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("date", &self.date)?;
        for m in Multiple::ALL {
            map.serialize_entry(m.name(), &self.value(m))?;
        }
        for m in Multiple::ALL {
            map.serialize_entry(&format!("score_{}", m.name()), &self.rank(m))?;
        }
        map.serialize_entry("score", &self.score)?;
        map.end()
    }
}

/// Compared entities ordered best first; entities without a score come last.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeerMultiplesScore {
    pub entities: Vec<RankedEntity>,
}

impl PeerMultiplesScore {
    pub fn score_of(&self, ticker: &str) -> Option<f64> {
        self.entities
            .iter()
            .find(|e| e.ticker == ticker)
            .and_then(|e| e.score)
    }
}

struct DetailByTicker<'a>(&'a [RankedEntity]);
struct ScoreByTicker<'a>(&'a [RankedEntity]);

impl Serialize for DetailByTicker<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for e in self.0 {
            map.serialize_entry(&e.ticker, e)?;
        }
        map.end()
    }
}

impl Serialize for ScoreByTicker<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for e in self.0 {
            map.serialize_entry(&e.ticker, &e.score)?;
        }
        map.end()
    }
}

impl Serialize for PeerMultiplesScore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("detail", &DetailByTicker(&self.entities))?;
        map.serialize_entry("score", &ScoreByTicker(&self.entities))?;
        map.end()
    }
}

/// Ranks the subject and its peers on their latest multiples; lower is better.
///
/// `entities` holds each company's most recent multiples row, subject first. Negative
/// multiples are not rankable and are treated as undefined. Ties share the average rank.
pub fn score_peer_multiples(
    entities: Vec<(String, MultiplesRow)>,
    weights: Option<&WeightSpec>,
) -> PeerMultiplesScore {
    let values: Vec<[Option<f64>; 4]> = entities
        .iter()
        .map(|(_, row)| Multiple::ALL.map(|m| row.multiple(m).filter(|v| *v >= 0.0)))
        .collect();

    let mut ranks = vec![[None; 4]; entities.len()];
    for col in 0..Multiple::ALL.len() {
        let column: Vec<Option<f64>> = values.iter().map(|v| v[col]).collect();
        for (i, rank) in descending_rank_scores(&column).into_iter().enumerate() {
            ranks[i][col] = rank;
        }
    }

    let mut ranked: Vec<RankedEntity> = entities
        .into_iter()
        .zip(values)
        .zip(ranks)
        .map(|(((ticker, row), values), ranks)| {
            let components: Vec<(&str, Option<f64>)> = Multiple::ALL
                .iter()
                .zip(ranks)
                .map(|(m, r)| (m.name(), r))
                .collect();
            let score = combine(&components, weights).map(|s| 10.0 * s);
            RankedEntity {
                ticker,
                date: row.date,
                values,
                ranks,
                score,
            }
        })
        .collect();

    ranked.sort_by(|a, b| match (a.score, b.score) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    PeerMultiplesScore { entities: ranked }
}

/// `(rank - 1) / (n - 1)` with rank 1 for the largest value and ties averaged.
/// Undefined when fewer than two values are defined.
fn descending_rank_scores(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let defined: Vec<f64> = column.iter().filter_map(|v| *v).collect();
    let n = defined.len();
    if n < 2 {
        return vec![None; column.len()];
    }

    column
        .iter()
        .map(|v| {
            let v = (*v)?;
            let above = defined.iter().filter(|x| **x > v).count();
            let tied = defined.iter().filter(|x| **x == v).count();
            let rank = 1.0 + above as f64 + (tied - 1) as f64 / 2.0;
            Some((rank - 1.0) / (n - 1) as f64)
        })
        .collect()
}
