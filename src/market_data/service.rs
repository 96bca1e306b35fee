use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::analysis::classify_candles;
use crate::config::{Config, KLINES_MAX_LIMIT};
use crate::error::{AppError, Result};
use crate::exchange::messages::{
    parse_klines_payload, parse_price_payload, parse_ticker_24h_payload, ExchangeInfo,
};
use crate::exchange::ExchangeClient;
use crate::market_data::catalog::{fallback_catalog, merge_symbols, search, Catalog};
use crate::market_data::history_cache::{HistoryCache, HistoryKey};
use crate::monitor::ConnectivityMonitor;
use crate::types::{Candle, InstrumentInfo, KlineInterval, Market, Ticker24h, TrendResult};

/// All price, candle and catalog access to the exchange.
///
/// Public operations never return errors: every failure is logged and
/// collapsed into `None` (or the fallback catalog).
pub struct MarketDataService {
    client: Arc<ExchangeClient>,
    history: HistoryCache,
    catalog: RwLock<Arc<Catalog>>,
    /// When set, hot-path network calls are skipped while the API is down.
    monitor: Option<Arc<ConnectivityMonitor>>,
    trend_window_days: u32,
}

impl MarketDataService {
    pub fn new(cfg: &Config, client: Arc<ExchangeClient>) -> Self {
        Self {
            client,
            history: HistoryCache::new(cfg.history_ttl),
            catalog: RwLock::new(Arc::new(Catalog::new())),
            monitor: None,
            trend_window_days: cfg.trend_window_days,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<ConnectivityMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn trend_window_days(&self) -> u32 {
        self.trend_window_days
    }

    fn api_available(&self) -> bool {
        self.monitor.as_ref().map_or(true, |m| m.is_available())
    }

    // -----------------------------------------------------------------------
    // Catalog
    // -----------------------------------------------------------------------

    /// Fetch spot then futures instrument lists. Futures entries replace spot
    /// entries with the same symbol. Falls back to the built-in list only when
    /// both requests fail.
    pub async fn fetch_instrument_catalog(&self) -> Catalog {
        let mut catalog = Catalog::new();
        let mut any_ok = false;

        for market in [Market::Spot, Market::Futures] {
            let url = self.client.exchange_info_url(market);
            match self.client.get_json::<ExchangeInfo>(&url, &[]).await {
                Ok(info) => {
                    let accepted = merge_symbols(&mut catalog, &info.symbols, market);
                    debug!(%market, accepted, total = info.symbols.len(), "Catalog page loaded");
                    any_ok = true;
                }
                Err(e) => warn!(%market, "Catalog fetch failed: {e}"),
            }
        }

        if any_ok {
            catalog
        } else {
            warn!("Both catalog requests failed, using built-in instrument list");
            fallback_catalog()
        }
    }

    /// Fetch the catalog and replace the stored one wholesale.
    pub async fn refresh_catalog(&self) -> usize {
        let catalog = self.fetch_instrument_catalog().await;
        let count = catalog.len();
        if let Ok(mut slot) = self.catalog.write() {
            *slot = Arc::new(catalog);
        }
        info!(instruments = count, "Instrument catalog loaded");
        count
    }

    pub fn catalog(&self) -> Arc<Catalog> {
        self.catalog
            .read()
            .map(|c| Arc::clone(&*c))
            .unwrap_or_default()
    }

    pub fn lookup(&self, symbol: &str) -> Option<InstrumentInfo> {
        self.catalog.read().ok()?.get(symbol).cloned()
    }

    /// Catalog search for the add-ticker box.
    pub fn suggest(&self, query: &str) -> Vec<(String, InstrumentInfo)> {
        search(&self.catalog(), query)
    }

    // -----------------------------------------------------------------------
    // Prices
    // -----------------------------------------------------------------------

    pub async fn get_current_price(&self, symbol: &str, market: Market) -> Option<f64> {
        if !self.api_available() {
            debug!(symbol, %market, "API unavailable, skipping price fetch");
            return None;
        }
        match self.fetch_current_price(symbol, market).await {
            Ok(price) => Some(price),
            Err(e) => {
                warn!(symbol, %market, "Price fetch failed: {e}");
                None
            }
        }
    }

    async fn fetch_current_price(&self, symbol: &str, market: Market) -> Result<f64> {
        let url = self.client.ticker_price_url(market);
        let body: Value = self.client.get_json(&url, &ExchangeClient::symbol_query(symbol)).await?;
        parse_price_payload(&body)
    }

    pub async fn get_ticker_24h(&self, symbol: &str, market: Market) -> Option<Ticker24h> {
        if !self.api_available() {
            debug!(symbol, %market, "API unavailable, skipping 24h ticker fetch");
            return None;
        }
        let url = self.client.ticker_24h_url(market);
        let query = ExchangeClient::symbol_query(symbol);
        let result = match self.client.get_json::<Value>(&url, &query).await {
            Ok(body) => parse_ticker_24h_payload(&body),
            Err(e) => Err(e),
        };
        match result {
            Ok(t) => Some(t),
            Err(e) => {
                warn!(symbol, %market, "24h ticker fetch failed: {e}");
                None
            }
        }
    }

    // -----------------------------------------------------------------------
    // History + trend
    // -----------------------------------------------------------------------

    /// Candles for the last `window_days`, served from cache while fresh.
    /// Failed fetches are not cached, so the next call retries immediately.
    pub async fn get_price_history(
        &self,
        symbol: &str,
        market: Market,
        window_days: u32,
    ) -> Option<Arc<Vec<Candle>>> {
        let key = HistoryKey::new(symbol, market, window_days);
        if let Some(candles) = self.history.get_fresh(&key) {
            debug!(symbol, %market, window_days, "History cache hit");
            return Some(candles);
        }

        if !self.api_available() {
            debug!(symbol, %market, "API unavailable, skipping history fetch");
            return None;
        }

        match self.fetch_history(symbol, market, window_days).await {
            Ok(candles) => {
                debug!(symbol, %market, window_days, rows = candles.len(), "History fetched");
                Some(self.history.insert(key, candles))
            }
            Err(e) => {
                warn!(symbol, %market, window_days, "History fetch failed: {e}");
                None
            }
        }
    }

    async fn fetch_history(&self, symbol: &str, market: Market, window_days: u32) -> Result<Vec<Candle>> {
        if window_days == 0 {
            return Err(AppError::InvalidInput("window must be at least one day".to_string()));
        }
        let interval = KlineInterval::for_window(window_days);
        let limit = history_limit(window_days);
        let url = self.client.klines_url(market);
        let query = ExchangeClient::klines_query(symbol, interval, limit);
        let body: Value = self.client.get_json(&url, &query).await?;
        parse_klines_payload(&body)
    }

    /// Trend over the configured window, computed from the cached history path.
    pub async fn analyze_trend(&self, symbol: &str, market: Market) -> Option<TrendResult> {
        let candles = self
            .get_price_history(symbol, market, self.trend_window_days)
            .await?;
        let trend = classify_candles(&candles);
        if trend.is_none() {
            debug!(symbol, %market, rows = candles.len(), "Not enough history for a trend");
        }
        trend
    }
}

/// `min(window_days * 24, 1000)` rows.
pub fn history_limit(window_days: u32) -> u32 {
    window_days.saturating_mul(24).min(KLINES_MAX_LIMIT)
}
