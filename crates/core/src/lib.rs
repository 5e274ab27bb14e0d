pub mod domain;
pub mod error;
pub mod ingest;
pub mod observer;
pub mod pipeline;
pub mod scoring;
pub mod time;

pub use error::ScoringError;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_PRICE_CURRENCY: &str = "USD";

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub data_provider_base_url: Option<String>,
        pub data_provider_api_key: Option<String>,
        pub data_provider_timeout_secs: Option<u64>,
        pub data_provider_retries: Option<u32>,
        pub price_currency: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                data_provider_base_url: std::env::var("DATA_PROVIDER_BASE_URL").ok(),
                data_provider_api_key: std::env::var("DATA_PROVIDER_API_KEY").ok(),
                data_provider_timeout_secs: parse_env("DATA_PROVIDER_TIMEOUT_SECS")?,
                data_provider_retries: parse_env("DATA_PROVIDER_RETRIES")?,
                price_currency: std::env::var("PRICE_CURRENCY")
                    .ok()
                    .filter(|s| !s.trim().is_empty()),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_data_provider_base_url(&self) -> anyhow::Result<&str> {
            self.data_provider_base_url
                .as_deref()
                .context("DATA_PROVIDER_BASE_URL is required")
        }

        /// Currency the daily price series is quoted in.
        pub fn price_currency(&self) -> String {
            self.price_currency
                .as_deref()
                .map(|s| s.trim().to_ascii_uppercase())
                .unwrap_or_else(|| DEFAULT_PRICE_CURRENCY.to_string())
        }
    }

    fn parse_env<T: std::str::FromStr>(key: &str) -> anyhow::Result<Option<T>> {
        match std::env::var(key) {
            Ok(s) if !s.trim().is_empty() => s
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|_| anyhow::anyhow!("{key} is not a valid value: {s}")),
            _ => Ok(None),
        }
    }

}
