use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use crate::db::WatchlistRepo;
use crate::error::{AppError, Result};
use crate::market_data::catalog::base_name;
use crate::market_data::MarketDataService;
use crate::types::{ListKind, Market, MoveDirection, WatchlistStats, WatchlistTicker};
use crate::watchlist::symbol::normalize_symbol;

const PRICE_DECIMALS: i32 = 6;
const CHANGE_DECIMALS: i32 = 2;

/// User-facing watchlist operations over the repository and market data.
#[derive(Clone)]
pub struct WatchlistManager {
    repo: WatchlistRepo,
    market_data: Arc<MarketDataService>,
}

impl WatchlistManager {
    pub fn new(repo: WatchlistRepo, market_data: Arc<MarketDataService>) -> Self {
        Self { repo, market_data }
    }

    /// Normalise `raw`, file it under `list` and, for exchange-listed
    /// symbols, fetch an initial quote and trend.
    pub async fn add(&self, list: ListKind, raw: &str) -> Result<WatchlistTicker> {
        let symbol = normalize_symbol(raw)?;
        if self.repo.exists(list, &symbol).await? {
            return Err(AppError::InvalidInput(format!("{symbol} is already in the {list} list")));
        }

        let (display_name, market, listed) = match self.market_data.lookup(&symbol) {
            Some(info) => (info.display_name, info.market, true),
            None => (base_name(&symbol), Market::Spot, false),
        };

        let mut ticker = WatchlistTicker {
            list,
            symbol,
            display_name,
            market,
            current_price: 0.0,
            percent_change_24h: 0.0,
            is_exchange_listed: listed,
            comment: String::new(),
            star_rating: 0,
            trend: None,
            added_at_ns: now_ns(),
            position: self.repo.next_position(list).await?,
        };

        if listed {
            if let Some(quote) = self.market_data.get_ticker_24h(&ticker.symbol, market).await {
                ticker.current_price = round_to(quote.last_price, PRICE_DECIMALS);
                ticker.percent_change_24h = round_to(quote.price_change_percent, CHANGE_DECIMALS);
                ticker.trend = self.market_data.analyze_trend(&ticker.symbol, market).await;
            }
        }

        // The pre-check above saves a network round trip; this catches a
        // concurrent add of the same symbol.
        if !self.repo.insert(&ticker).await? {
            return Err(AppError::InvalidInput(format!(
                "{} is already in the {list} list",
                ticker.symbol
            )));
        }
        info!(symbol = %ticker.symbol, %list, listed, "Ticker added");
        Ok(ticker)
    }

    pub async fn remove(&self, list: ListKind, symbol: &str) -> Result<()> {
        if !self.repo.remove(list, symbol).await? {
            return Err(not_found(list, symbol));
        }
        info!(symbol, %list, "Ticker removed");
        Ok(())
    }

    pub async fn clear(&self, list: ListKind) -> Result<u64> {
        let removed = self.repo.clear(list).await?;
        info!(%list, removed, "List cleared");
        Ok(removed)
    }

    pub async fn list_all(&self) -> Result<Vec<WatchlistTicker>> {
        self.repo.list_all().await
    }

    pub async fn set_comment(&self, list: ListKind, symbol: &str, comment: &str) -> Result<()> {
        if !self.repo.set_comment(list, symbol, comment.trim()).await? {
            return Err(not_found(list, symbol));
        }
        Ok(())
    }

    pub async fn set_stars(&self, list: ListKind, symbol: &str, stars: u8) -> Result<()> {
        if stars > 3 {
            return Err(AppError::InvalidInput(format!("star rating must be 0-3, got {stars}")));
        }
        if !self.repo.set_stars(list, symbol, stars).await? {
            return Err(not_found(list, symbol));
        }
        Ok(())
    }

    /// Set the price and 24 h change of a ticker the exchange does not list.
    pub async fn set_manual_quote(&self, list: ListKind, symbol: &str, price: f64, change: f64) -> Result<()> {
        if !price.is_finite() || !change.is_finite() {
            return Err(AppError::InvalidInput("price and change must be numbers".to_string()));
        }
        let ticker = self
            .repo
            .get(list, symbol)
            .await?
            .ok_or_else(|| not_found(list, symbol))?;
        if ticker.is_exchange_listed {
            return Err(AppError::InvalidInput(format!(
                "{symbol} is quoted by the exchange and cannot be edited"
            )));
        }
        self.repo
            .set_manual_quote(list, symbol, round_to(price, PRICE_DECIMALS), round_to(change, CHANGE_DECIMALS))
            .await?;
        Ok(())
    }

    /// Swap a ticker with its neighbour and renumber the list 0..n. Returns
    /// false at either end of the list.
    pub async fn move_ticker(&self, list: ListKind, symbol: &str, direction: MoveDirection) -> Result<bool> {
        let tickers: Vec<WatchlistTicker> = self
            .repo
            .list_all()
            .await?
            .into_iter()
            .filter(|t| t.list == list)
            .collect();
        let idx = tickers
            .iter()
            .position(|t| t.symbol == symbol)
            .ok_or_else(|| not_found(list, symbol))?;

        let neighbour = match direction {
            MoveDirection::Up => idx.checked_sub(1),
            MoveDirection::Down => Some(idx + 1).filter(|&i| i < tickers.len()),
        };
        let Some(n) = neighbour else {
            return Ok(false);
        };

        let mut order: Vec<String> = tickers.into_iter().map(|t| t.symbol).collect();
        order.swap(idx, n);
        self.repo.set_order(list, &order).await?;
        Ok(true)
    }

    pub async fn stats(&self) -> Result<WatchlistStats> {
        self.repo.counts().await
    }

    /// Tickers the background refresher should visit.
    pub async fn refreshable(&self) -> Result<Vec<WatchlistTicker>> {
        self.repo.list_listed().await
    }

    /// Pull a fresh 24 h quote for one ticker. The record (and its trend) is
    /// rewritten only when the rounded price or change actually moved; a
    /// failed trend keeps the stored one. Returns whether anything changed.
    pub async fn refresh_ticker(&self, ticker: &WatchlistTicker) -> Result<bool> {
        if !ticker.is_exchange_listed {
            return Ok(false);
        }
        let Some(quote) = self.market_data.get_ticker_24h(&ticker.symbol, ticker.market).await else {
            return Ok(false);
        };

        let price = round_to(quote.last_price, PRICE_DECIMALS);
        let change = round_to(quote.price_change_percent, CHANGE_DECIMALS);
        if price == round_to(ticker.current_price, PRICE_DECIMALS)
            && change == round_to(ticker.percent_change_24h, CHANGE_DECIMALS)
        {
            return Ok(false);
        }

        let trend = self.market_data.analyze_trend(&ticker.symbol, ticker.market).await;
        let updated = self
            .repo
            .update_quote(ticker.list, &ticker.symbol, price, change, trend.as_ref())
            .await?;
        debug!(symbol = %ticker.symbol, list = %ticker.list, price, change, "Quote refreshed");
        Ok(updated)
    }
}

fn not_found(list: ListKind, symbol: &str) -> AppError {
    AppError::NotFound(format!("{symbol} in {list} list"))
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

fn now_ns() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::latency::LatencyStats;
    use crate::config::Config;
    use crate::exchange::ExchangeClient;
    use crate::types::TrendDirection;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn manager_for(server: &MockServer) -> WatchlistManager {
        manager_with(server, |_| {}).await
    }

    async fn manager_with(server: &MockServer, tweak: impl FnOnce(&mut Config)) -> WatchlistManager {
        Mock::given(method("GET"))
            .and(path("/api/v3/exchangeInfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"symbols": [
                {"symbol": "BTCUSDT", "status": "TRADING", "baseAsset": "BTC"}
            ]})))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/fapi/v1/exchangeInfo"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;

        let mut cfg = Config {
            spot_api_url: server.uri(),
            futures_api_url: server.uri(),
            request_timeout: Duration::from_secs(2),
            ..Config::default()
        };
        tweak(&mut cfg);
        let client = Arc::new(ExchangeClient::new(&cfg, Arc::new(LatencyStats::new())).unwrap());
        let market_data = Arc::new(MarketDataService::new(&cfg, client));
        market_data.refresh_catalog().await;
        let repo = WatchlistRepo::in_memory().await.unwrap();
        WatchlistManager::new(repo, market_data)
    }

    fn klines(closes: &[f64]) -> Value {
        Value::Array(
            closes
                .iter()
                .enumerate()
                .map(|(i, c)| json!([i as i64, "1", "1", "1", c.to_string(), "1", i as i64 + 1, "0", 1, "0", "0", "0"]))
                .collect(),
        )
    }

    async fn mount_quote(server: &MockServer, last: &str, change: &str) {
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .and(query_param("symbol", "BTCUSDT"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"lastPrice": last, "priceChangePercent": change})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn add_listed_ticker_fetches_quote_and_trend() {
        let server = MockServer::start().await;
        mount_quote(&server, "64000.1234567", "1.236").await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(klines(&[100.0, 100.0, 100.0, 100.0, 110.0])))
            .mount(&server)
            .await;

        let mgr = manager_for(&server).await;
        let t = mgr.add(ListKind::Long, "btc").await.unwrap();
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.display_name, "BTC");
        assert!(t.is_exchange_listed);
        assert_eq!(t.current_price, 64000.123457);
        assert_eq!(t.percent_change_24h, 1.24);
        assert_eq!(t.trend.unwrap().direction, TrendDirection::Up);
        assert_eq!(mgr.list_all().await.unwrap(), vec![t]);
    }

    #[tokio::test]
    async fn add_unlisted_ticker_skips_network() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mgr = manager_for(&server).await;
        let t = mgr.add(ListKind::ShortWait, "mycoin").await.unwrap();
        assert_eq!(t.symbol, "MYCOINUSDT");
        assert_eq!(t.display_name, "MYCOIN");
        assert_eq!(t.market, Market::Spot);
        assert!(!t.is_exchange_listed);
        assert_eq!(t.current_price, 0.0);
    }

    #[tokio::test]
    async fn duplicate_in_same_list_is_rejected() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;
        mgr.add(ListKind::Long, "abc").await.unwrap();
        assert!(matches!(mgr.add(ListKind::Long, "ABCUSDT").await, Err(AppError::InvalidInput(_))));
        // Same symbol in another list is fine.
        assert!(mgr.add(ListKind::Short, "abc").await.is_ok());
    }

    #[tokio::test]
    async fn stars_and_comment_validation() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;
        mgr.add(ListKind::Long, "abc").await.unwrap();

        assert!(matches!(mgr.set_stars(ListKind::Long, "ABCUSDT", 4).await, Err(AppError::InvalidInput(_))));
        mgr.set_stars(ListKind::Long, "ABCUSDT", 3).await.unwrap();
        mgr.set_comment(ListKind::Long, "ABCUSDT", "  breakout  ").await.unwrap();
        assert!(matches!(mgr.set_comment(ListKind::Short, "ABCUSDT", "x").await, Err(AppError::NotFound(_))));

        let t = &mgr.list_all().await.unwrap()[0];
        assert_eq!(t.star_rating, 3);
        assert_eq!(t.comment, "breakout");
    }

    #[tokio::test]
    async fn manual_quote_rejected_for_listed() {
        let server = MockServer::start().await;
        mount_quote(&server, "1.0", "0.0").await;
        let mgr = manager_for(&server).await;
        mgr.add(ListKind::Long, "btc").await.unwrap();
        mgr.add(ListKind::Long, "abc").await.unwrap();

        assert!(matches!(
            mgr.set_manual_quote(ListKind::Long, "BTCUSDT", 2.0, 1.0).await,
            Err(AppError::InvalidInput(_))
        ));
        mgr.set_manual_quote(ListKind::Long, "ABCUSDT", 0.1234567, -3.456).await.unwrap();
        let abc = mgr
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .find(|t| t.symbol == "ABCUSDT")
            .unwrap();
        assert_eq!(abc.current_price, 0.123457);
        assert_eq!(abc.percent_change_24h, -3.46);
    }

    #[tokio::test]
    async fn move_swaps_neighbours_and_stops_at_edges() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;
        for s in ["aaa", "bbb", "ccc"] {
            mgr.add(ListKind::Long, s).await.unwrap();
        }

        assert!(!mgr.move_ticker(ListKind::Long, "AAAUSDT", MoveDirection::Up).await.unwrap());
        assert!(!mgr.move_ticker(ListKind::Long, "CCCUSDT", MoveDirection::Down).await.unwrap());
        assert!(mgr.move_ticker(ListKind::Long, "CCCUSDT", MoveDirection::Up).await.unwrap());

        let order: Vec<String> = mgr.list_all().await.unwrap().into_iter().map(|t| t.symbol).collect();
        assert_eq!(order, vec!["AAAUSDT", "CCCUSDT", "BBBUSDT"]);
        assert!(matches!(
            mgr.move_ticker(ListKind::Long, "ZZZUSDT", MoveDirection::Up).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn move_renumbers_tied_positions() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;
        for (i, s) in ["AAAUSDT", "BBBUSDT", "CCCUSDT"].into_iter().enumerate() {
            let t = WatchlistTicker {
                list: ListKind::Long,
                symbol: s.to_string(),
                display_name: base_name(s),
                market: Market::Spot,
                current_price: 0.0,
                percent_change_24h: 0.0,
                is_exchange_listed: false,
                comment: String::new(),
                star_rating: 0,
                trend: None,
                added_at_ns: i as i64,
                position: 5,
            };
            assert!(mgr.repo.insert(&t).await.unwrap());
        }

        assert!(mgr.move_ticker(ListKind::Long, "CCCUSDT", MoveDirection::Up).await.unwrap());
        let rows: Vec<(String, i64)> = mgr
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|t| (t.symbol, t.position))
            .collect();
        assert_eq!(
            rows,
            vec![
                ("AAAUSDT".to_string(), 0),
                ("CCCUSDT".to_string(), 1),
                ("BBBUSDT".to_string(), 2),
            ]
        );
    }

    #[tokio::test]
    async fn concurrent_adds_of_same_symbol_yield_one_invalid_input() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;

        let (a, b) = tokio::join!(mgr.add(ListKind::Short, "dup"), mgr.add(ListKind::Short, "dup"));
        let oks = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(oks, 1);
        let err = if a.is_err() { a } else { b };
        assert!(matches!(err, Err(AppError::InvalidInput(_))), "got {err:?}");
        assert_eq!(mgr.stats().await.unwrap().short, 1);
    }

    #[tokio::test]
    async fn remove_clear_and_stats() {
        let server = MockServer::start().await;
        let mgr = manager_for(&server).await;
        mgr.add(ListKind::Long, "aaa").await.unwrap();
        mgr.add(ListKind::Long, "bbb").await.unwrap();
        mgr.add(ListKind::LongWait, "ccc").await.unwrap();

        let stats = mgr.stats().await.unwrap();
        assert_eq!((stats.total, stats.long, stats.long_wait), (3, 2, 1));

        mgr.remove(ListKind::Long, "AAAUSDT").await.unwrap();
        assert!(matches!(mgr.remove(ListKind::Long, "AAAUSDT").await, Err(AppError::NotFound(_))));
        assert_eq!(mgr.clear(ListKind::LongWait).await.unwrap(), 1);
        assert_eq!(mgr.stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn refresh_rewrites_only_on_change() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastPrice": "100.0", "priceChangePercent": "1.00"})))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastPrice": "101.0", "priceChangePercent": "2.00"})))
            .mount(&server)
            .await;
        // Trend lookups fail, so the refreshed record must keep no trend rather than error.
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let mgr = manager_for(&server).await;
        let added = mgr.add(ListKind::Long, "btc").await.unwrap();
        assert_eq!(added.current_price, 100.0);

        // Same quote: nothing rewritten.
        assert!(!mgr.refresh_ticker(&added).await.unwrap());
        // Moved quote: rewritten.
        assert!(mgr.refresh_ticker(&added).await.unwrap());

        let t = &mgr.refreshable().await.unwrap()[0];
        assert_eq!(t.current_price, 101.0);
        assert_eq!(t.percent_change_24h, 2.0);
        assert!(t.trend.is_none());
    }

    #[tokio::test]
    async fn failed_trend_keeps_previous_trend() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastPrice": "100.0", "priceChangePercent": "1.00"})))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/ticker/24hr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lastPrice": "90.0", "priceChangePercent": "-9.00"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v3/klines"))
            .respond_with(ResponseTemplate::new(200).set_body_json(klines(&[100.0, 100.0, 100.0, 100.0, 110.0])))
            .up_to_n_times(1)
            .mount(&server)
            .await;

        let mgr = manager_with(&server, |c| c.history_ttl = Duration::from_millis(20)).await;
        let added = mgr.add(ListKind::Long, "btc").await.unwrap();
        let before = added.trend.unwrap();

        // History has expired and the refetch is answered with 404.
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(mgr.refresh_ticker(&added).await.unwrap());
        let t = &mgr.list_all().await.unwrap()[0];
        assert_eq!(t.current_price, 90.0);
        assert_eq!(t.trend, Some(before));
    }
}
