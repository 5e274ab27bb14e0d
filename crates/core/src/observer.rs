use serde::Serialize;
use std::sync::Mutex;

/// Something worth reporting while scoring that does not abort the request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScoreEvent {
    /// A line item was not reported and its documented substitute was used instead.
    FieldFallback {
        target: &'static str,
        primary: String,
        used: String,
    },
    /// A line item was not reported and has no substitute.
    FieldMissing { field: String, context: &'static str },
    /// Periods were dropped from a statement because of placeholder or non-numeric cells.
    CellsDropped { kpi: String, count: usize },
    /// A statement column header could not be read as a date.
    PeriodSkipped { header: String },
    /// A peer could not be used for one comparison.
    PeerSkipped {
        ticker: String,
        stage: &'static str,
        reason: String,
    },
    /// A component could not be scored from the data at hand.
    InsufficientData {
        component: &'static str,
        detail: String,
    },
    /// Weights do not add up to one; they are used as given.
    WeightSumMismatch { spec: &'static str, sum: f64 },
    /// Prices were converted to the reporting currency before computing multiples.
    CurrencyAdjusted { ticker: String, currency: String },
    /// A component produced its score.
    ComponentScored {
        component: &'static str,
        score: Option<f64>,
    },
}

/// Receives [`ScoreEvent`]s from the scorers so the math itself stays free of logging.
pub trait ScoreObserver: Send + Sync {
    fn on_event(&self, event: ScoreEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl ScoreObserver for NoopObserver {
    fn on_event(&self, _event: ScoreEvent) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ScoreObserver for TracingObserver {
    fn on_event(&self, event: ScoreEvent) {
        match event {
            ScoreEvent::FieldFallback {
                target,
                primary,
                used,
            } => {
                tracing::warn!(
                    target_field = target,
                    %primary,
                    %used,
                    "line item missing; using fallback"
                )
            }
            ScoreEvent::FieldMissing { field, context } => {
                tracing::warn!(%field, context, "line item missing")
            }
            ScoreEvent::CellsDropped { kpi, count } => {
                tracing::warn!(%kpi, count, "dropped periods with placeholder cells")
            }
            ScoreEvent::PeriodSkipped { header } => {
                tracing::warn!(%header, "statement column header is not a date; skipped")
            }
            ScoreEvent::PeerSkipped {
                ticker,
                stage,
                reason,
            } => tracing::warn!(%ticker, stage, %reason, "peer skipped"),
            ScoreEvent::InsufficientData { component, detail } => {
                tracing::warn!(component, %detail, "insufficient data")
            }
            ScoreEvent::WeightSumMismatch { spec, sum } => {
                tracing::warn!(spec, sum, "weights do not sum to 1")
            }
            ScoreEvent::CurrencyAdjusted { ticker, currency } => {
                tracing::info!(%ticker, %currency, "price adjusted to reporting currency")
            }
            ScoreEvent::ComponentScored { component, score } => {
                tracing::info!(component, ?score, "component scored")
            }
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ScoreEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ScoreEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ScoreObserver for RecordingObserver {
    fn on_event(&self, event: ScoreEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_observer_keeps_order() {
        let obs = RecordingObserver::new();
        obs.on_event(ScoreEvent::CellsDropped {
            kpi: "Revenue".to_string(),
            count: 2,
        });
        obs.on_event(ScoreEvent::WeightSumMismatch {
            spec: "peers",
            sum: 0.8,
        });

        let events = obs.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], ScoreEvent::CellsDropped { count: 2, .. }));
        assert!(matches!(events[1], ScoreEvent::WeightSumMismatch { .. }));
    }

    #[test]
    fn events_serialize_with_kind_tag() {
        let v = serde_json::to_value(ScoreEvent::PeerSkipped {
            ticker: "BBB".to_string(),
            stage: "margins",
            reason: "timeout".to_string(),
        })
        .unwrap();
        assert_eq!(v["kind"], "peer_skipped");
        assert_eq!(v["ticker"], "BBB");
    }
}
