use crate::error::ScoringError;
use crate::observer::{ScoreEvent, ScoreObserver};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

pub const INCOME_COMPONENTS: [&str; 2] = ["growth", "peers"];
pub const GLOBAL_COMPONENTS: [&str; 3] = ["income", "balance", "cash_flow"];
pub const MULTIPLE_COMPONENTS: [&str; 4] = ["pe", "ps", "pgp", "pfcf"];

/// Component name to non-negative weight. Components left out weigh zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightSpec(BTreeMap<String, f64>);

impl WeightSpec {
    pub fn new<I, K>(weights: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self(weights.into_iter().map(|(k, w)| (k.into(), w)).collect())
    }

    pub fn weight(&self, component: &str) -> f64 {
        self.0.get(component).copied().unwrap_or(0.0)
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, w)| (k.as_str(), *w))
    }

    /// Rejects unknown component names and negative or non-finite weights; reports a sum
    /// that is not one.
    pub fn validate(
        &self,
        spec: &'static str,
        components: &[&str],
        observer: &dyn ScoreObserver,
    ) -> Result<(), ScoringError> {
        for (name, weight) in &self.0 {
            if !components.contains(&name.as_str()) {
                return Err(ScoringError::malformed(format!(
                    "{spec} weights reference unknown component '{name}' (expected one of {})",
                    components.join(", ")
                )));
            }
            if !weight.is_finite() || *weight < 0.0 {
                return Err(ScoringError::malformed(format!(
                    "{spec} weight for '{name}' must be a non-negative number (got {weight})"
                )));
            }
        }

        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            observer.on_event(ScoreEvent::WeightSumMismatch { spec, sum });
        }
        Ok(())
    }
}

/// Weights used by the financial-health aggregators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialWeights {
    /// Growth vs peer-margin weights inside the income statement score.
    #[serde(default)]
    pub income: Option<WeightSpec>,
    /// Income vs balance vs cash-flow weights in the global score.
    #[serde(default)]
    pub global: Option<WeightSpec>,
}

impl FinancialWeights {
    pub fn validate(&self, observer: &dyn ScoreObserver) -> Result<(), ScoringError> {
        if let Some(income) = &self.income {
            income.validate("income", &INCOME_COMPONENTS, observer)?;
        }
        if let Some(global) = &self.global {
            global.validate("global", &GLOBAL_COMPONENTS, observer)?;
        }
        Ok(())
    }
}
