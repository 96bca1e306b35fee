use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::latency::LatencyStats;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::types::{KlineInterval, Market};

/// Thin REST client for the exchange's spot and futures APIs.
///
/// Every request goes through [`ExchangeClient::with_timeout`]: a request that
/// does not complete (headers and body) within the configured timeout is
/// dropped and surfaces as [`AppError::Timeout`], the same failure path as a
/// transport error or a non-2xx status.
pub struct ExchangeClient {
    http: reqwest::Client,
    spot_url: String,
    futures_url: String,
    timeout: Duration,
    latency: Arc<LatencyStats>,
}

impl ExchangeClient {
    pub fn new(cfg: &Config, latency: Arc<LatencyStats>) -> Result<Self> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self {
            http,
            spot_url: cfg.spot_api_url.trim_end_matches('/').to_string(),
            futures_url: cfg.futures_api_url.trim_end_matches('/').to_string(),
            timeout: cfg.request_timeout,
            latency,
        })
    }

    fn api_root(&self, market: Market) -> String {
        match market {
            Market::Spot => format!("{}/api/v3", self.spot_url),
            Market::Futures => format!("{}/fapi/v1", self.futures_url),
        }
    }

    /// Liveness endpoint. Only the spot API is probed.
    pub fn ping_url(&self) -> String {
        format!("{}/ping", self.api_root(Market::Spot))
    }

    pub fn exchange_info_url(&self, market: Market) -> String {
        format!("{}/exchangeInfo", self.api_root(market))
    }

    pub fn ticker_price_url(&self, market: Market) -> String {
        format!("{}/ticker/price", self.api_root(market))
    }

    pub fn ticker_24h_url(&self, market: Market) -> String {
        format!("{}/ticker/24hr", self.api_root(market))
    }

    pub fn klines_url(&self, market: Market) -> String {
        format!("{}/klines", self.api_root(market))
    }

    /// Query pairs for a klines request. Values are percent-encoded by reqwest,
    /// so a symbol can never add or replace parameters.
    pub fn klines_query(symbol: &str, interval: KlineInterval, limit: u32) -> Vec<(&'static str, String)> {
        vec![
            ("symbol", symbol.to_string()),
            ("interval", interval.to_string()),
            ("limit", limit.to_string()),
        ]
    }

    pub fn symbol_query(symbol: &str) -> Vec<(&'static str, String)> {
        vec![("symbol", symbol.to_string())]
    }

    /// GET the liveness endpoint; any 2xx is success.
    pub async fn ping(&self) -> Result<()> {
        let url = self.ping_url();
        self.with_timeout(async {
            let resp = self.http.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(AppError::HttpStatus(status.as_u16()));
            }
            Ok::<(), AppError>(())
        })
        .await
    }

    /// GET `url` with `query` appended and decode the body as JSON into `T`.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&'static str, String)]) -> Result<T> {
        debug!(?query, "GET {url}");
        self.with_timeout(async {
            let resp = self.http.get(url).query(query).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(AppError::HttpStatus(status.as_u16()));
            }
            let body = resp.bytes().await?;
            serde_json::from_slice::<T>(&body).map_err(|e| AppError::MalformedPayload(e.to_string()))
        })
        .await
    }

    async fn with_timeout<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let started = Instant::now();
        let outcome = tokio::time::timeout(self.timeout, fut).await;
        self.latency.record(started.elapsed());
        match outcome {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout(self.timeout.as_millis() as u64)),
        }
    }
}
