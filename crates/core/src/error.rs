use thiserror::Error;

/// Failures that invalidate a score and must reach the caller.
///
/// Recoverable conditions (a peer that could not be fetched, a line item served by its
/// fallback, a degenerate ranking column) are not errors; they surface as `None` scores
/// and [`crate::observer::ScoreEvent`]s instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScoringError {
    #[error("insufficient data for {component}: {detail}")]
    InsufficientData {
        component: &'static str,
        detail: String,
    },

    #[error("missing field '{field}' ({context}) and no fallback is available")]
    MissingField {
        field: &'static str,
        context: &'static str,
    },

    #[error("reporting currency {currency} differs from price currency {price_currency} and no FX rate could be fetched: {detail}")]
    CurrencyMismatchUnresolved {
        currency: String,
        price_currency: String,
        detail: String,
    },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("failed to fetch {what} for {ticker}: {detail}")]
    Fetch {
        ticker: String,
        what: &'static str,
        detail: String,
    },
}

impl ScoringError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedInput(detail.into())
    }

    pub fn fetch(ticker: &str, what: &'static str, err: &anyhow::Error) -> Self {
        Self::Fetch {
            ticker: ticker.to_string(),
            what,
            detail: format!("{err:#}"),
        }
    }
}
