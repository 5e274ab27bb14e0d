use crate::config::Settings;
use crate::ingest::types::{
    CompanyProfile, FxPoint, PricePoint, RawStatement, ReportPeriod, StatementKind,
};
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRIES: u32 = 3;
pub const PRICE_LOOKBACK_YEARS: u32 = 5;

/// The market-data collaborators the engine depends on. Implementations do I/O only;
/// every decision about the data is made by the caller.
#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    async fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: ReportPeriod,
    ) -> Result<RawStatement>;

    /// Daily closes over the price lookback window.
    async fn fetch_daily_prices(&self, ticker: &str) -> Result<Vec<PricePoint>>;

    /// Daily rates converting the price currency into `currency`.
    async fn fetch_fx_rates(&self, currency: &str) -> Result<Vec<FxPoint>>;

    async fn fetch_reporting_currency(&self, ticker: &str) -> Result<String>;

    async fn discover_peers(&self, ticker: &str, n: usize) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct HttpJsonDataProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    retries: u32,
}

impl HttpJsonDataProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings.require_data_provider_base_url()?.to_string();
        let api_key = settings.data_provider_api_key.clone();

        let timeout_secs = settings
            .data_provider_timeout_secs
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let retries = settings.data_provider_retries.unwrap_or(DEFAULT_RETRIES).max(1);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build data provider http client")?;

        Ok(Self {
            http,
            base_url,
            api_key,
            retries,
        })
    }

    fn url(&self, path: &str) -> String {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };

        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(api_key) = &self.api_key {
            headers.insert("x-api-key", HeaderValue::from_str(api_key)?);
        }
        Ok(headers)
    }

    async fn get_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(path);
        let headers = self.headers()?;

        let res = self
            .http
            .get(&url)
            .headers(headers)
            .query(query)
            .send()
            .await
            .with_context(|| format!("data provider request failed: {url}"))?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read provider response")?;
        let raw_json = serde_json::from_str::<Value>(&text)
            .with_context(|| format!("provider response is not valid JSON: {text}"))?;

        if !status.is_success() {
            anyhow::bail!("data provider HTTP {status}: {raw_json}");
        }

        serde_json::from_value::<T>(raw_json)
            .with_context(|| format!("failed to parse provider response from {url}"))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.get_once(path, query).await {
                Ok(parsed) => return Ok(parsed),
                Err(err) => {
                    if attempt >= self.retries {
                        return Err(err);
                    }
                    let backoff = Duration::from_secs(1 << (attempt - 1));
                    tracing::warn!(
                        attempt,
                        %path,
                        ?backoff,
                        error = %err,
                        "data provider fetch failed; retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for HttpJsonDataProvider {
    fn provider_name(&self) -> &'static str {
        "external_http_json"
    }

    async fn fetch_statement(
        &self,
        ticker: &str,
        kind: StatementKind,
        period: ReportPeriod,
    ) -> Result<RawStatement> {
        let path = format!("/v1/statements/{}/{}", ticker_path(ticker), kind.as_str());
        let stmt: RawStatement = self
            .get(&path, &[("period", period.as_str().to_string())])
            .await?;
        validate_statement(&stmt)?;
        Ok(stmt)
    }

    async fn fetch_daily_prices(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let path = format!("/v1/prices/{}", ticker_path(ticker));
        let prices: Vec<PricePoint> = self
            .get(&path, &[("lookback_years", PRICE_LOOKBACK_YEARS.to_string())])
            .await?;
        anyhow::ensure!(!prices.is_empty(), "no price history for {ticker}");
        Ok(prices)
    }

    async fn fetch_fx_rates(&self, currency: &str) -> Result<Vec<FxPoint>> {
        let path = format!("/v1/fx/{}", currency.trim().to_ascii_uppercase());
        let rates: Vec<FxPoint> = self
            .get(&path, &[("lookback_years", PRICE_LOOKBACK_YEARS.to_string())])
            .await?;
        anyhow::ensure!(!rates.is_empty(), "no FX history for {currency}");
        Ok(rates)
    }

    async fn fetch_reporting_currency(&self, ticker: &str) -> Result<String> {
        let path = format!("/v1/profile/{}", ticker_path(ticker));
        let profile: CompanyProfile = self.get(&path, &[]).await?;
        let currency = profile.financial_currency.trim().to_ascii_uppercase();
        anyhow::ensure!(!currency.is_empty(), "empty financial currency for {ticker}");
        Ok(currency)
    }

    async fn discover_peers(&self, ticker: &str, n: usize) -> Result<Vec<String>> {
        let path = format!("/v1/peers/{}", ticker_path(ticker));
        let mut peers: Vec<String> = self.get(&path, &[("n", n.to_string())]).await?;
        peers.truncate(n);
        Ok(peers)
    }
}

fn ticker_path(ticker: &str) -> String {
    ticker.trim().to_ascii_lowercase()
}

fn validate_statement(stmt: &RawStatement) -> Result<()> {
    anyhow::ensure!(!stmt.periods.is_empty(), "statement has no periods");
    for line in &stmt.lines {
        anyhow::ensure!(!line.label.trim().is_empty(), "line label must be non-empty");
        anyhow::ensure!(
            line.cells.len() == stmt.periods.len(),
            "line '{}' has {} cells for {} periods",
            line.label,
            line.cells.len(),
            stmt.periods.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_statement_shape() {
        let v = json!({
            "periods": ["Dec 31, 2023", "Dec 31, 2022"],
            "lines": [
                {"label": "Revenue", "cells": ["1,000", "900"]},
                {"label": "Net Income", "cells": ["100", "-"]}
            ]
        });
        let stmt: RawStatement = serde_json::from_value(v).unwrap();
        assert!(validate_statement(&stmt).is_ok());
        assert_eq!(stmt.lines.len(), 2);
    }

    #[test]
    fn rejects_ragged_lines() {
        let v = json!({
            "periods": ["Dec 31, 2023", "Dec 31, 2022"],
            "lines": [{"label": "Revenue", "cells": ["1,000"]}]
        });
        let stmt: RawStatement = serde_json::from_value(v).unwrap();
        assert!(validate_statement(&stmt).is_err());
    }

    #[test]
    fn rejects_non_numeric_close_via_deserialize() {
        let v = json!([{"date": "2024-01-02", "close": "10.5"}]);
        assert!(serde_json::from_value::<Vec<PricePoint>>(v).is_err());
    }

    #[test]
    fn url_joins_base_and_path() {
        let settings = Settings {
            data_provider_base_url: Some("https://data.example.com/".to_string()),
            ..Settings::default()
        };
        let provider = HttpJsonDataProvider::from_settings(&settings).unwrap();
        assert_eq!(
            provider.url("v1/prices/aaa"),
            "https://data.example.com/v1/prices/aaa"
        );
        assert_eq!(ticker_path(" AAPL "), "aapl");
    }
}
