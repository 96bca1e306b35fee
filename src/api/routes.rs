use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::latency::{LatencySnapshot, LatencyStats};
use crate::error::AppError;
use crate::market_data::MarketDataService;
use crate::monitor::ConnectivityMonitor;
use crate::types::{
    Candle, ConnectionSnapshot, InstrumentInfo, ListKind, Market, MoveDirection, Ticker24h, TrendResult, WatchlistStats,
    WatchlistTicker,
};
use crate::watchlist::WatchlistManager;

#[derive(Clone)]
pub struct ApiState {
    pub market_data: Arc<MarketDataService>,
    pub monitor: Arc<ConnectivityMonitor>,
    pub watchlist: WatchlistManager,
    pub latency: Arc<LatencyStats>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/catalog", get(get_catalog))
        .route("/price/:market/:symbol", get(get_price))
        .route("/ticker/:market/:symbol", get(get_ticker))
        .route("/history/:market/:symbol", get(get_history))
        .route("/trend/:market/:symbol", get(get_trend))
        .route("/watchlist", get(get_watchlist))
        .route("/watchlist/:list", post(add_ticker).delete(clear_list))
        .route("/watchlist/:list/:symbol", delete(remove_ticker))
        .route("/watchlist/:list/:symbol/comment", put(set_comment))
        .route("/watchlist/:list/:symbol/stars", put(set_stars))
        .route("/watchlist/:list/:symbol/quote", put(set_quote))
        .route("/watchlist/:list/:symbol/move", post(move_ticker))
        .route("/stats/summary", get(get_stats_summary))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param / body structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct CatalogQuery {
    pub q: Option<String>,
}

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub days: Option<u32>,
}

#[derive(Deserialize)]
pub struct AddTickerBody {
    pub symbol: String,
}

#[derive(Deserialize)]
pub struct CommentBody {
    pub comment: String,
}

#[derive(Deserialize)]
pub struct StarsBody {
    pub stars: u8,
}

#[derive(Deserialize)]
pub struct QuoteBody {
    pub price: f64,
    pub change: f64,
}

#[derive(Deserialize)]
pub struct MoveBody {
    pub direction: MoveDirection,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct CatalogEntry {
    pub symbol: String,
    pub display_name: String,
    pub market: Market,
    /// `SPOT` or `FUTURES`, as shown next to a suggestion.
    pub label: String,
}

impl CatalogEntry {
    fn new(symbol: String, info: &InstrumentInfo) -> Self {
        Self {
            label: info.market.as_str().to_uppercase(),
            symbol,
            display_name: info.display_name.clone(),
            market: info.market,
        }
    }
}

#[derive(Serialize)]
pub struct PriceResponse {
    pub symbol: String,
    pub market: Market,
    pub price: Option<f64>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub removed: u64,
}

#[derive(Serialize)]
pub struct MoveResponse {
    pub moved: bool,
}

#[derive(Serialize)]
pub struct SummaryResponse {
    pub connection: String,
    pub api_available: bool,
    pub catalog_size: usize,
    pub watchlist: WatchlistStats,
}

// ---------------------------------------------------------------------------
// Path parsing
// ---------------------------------------------------------------------------

fn parse_market(raw: &str) -> Result<Market, AppError> {
    Market::parse(raw).ok_or_else(|| AppError::InvalidInput(format!("unknown market {raw:?}")))
}

fn parse_list(raw: &str) -> Result<ListKind, AppError> {
    ListKind::parse(raw).ok_or_else(|| AppError::InvalidInput(format!("unknown list {raw:?}")))
}

// ---------------------------------------------------------------------------
// Handlers: exchange data
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<ConnectionSnapshot> {
    Json(state.monitor.snapshot())
}

/// Whole catalog, or up to ten suggestions when `?q=` is given.
async fn get_catalog(
    State(state): State<ApiState>,
    Query(params): Query<CatalogQuery>,
) -> Json<Vec<CatalogEntry>> {
    if let Some(q) = params.q {
        let entries = state
            .market_data
            .suggest(&q)
            .into_iter()
            .map(|(symbol, info)| CatalogEntry::new(symbol, &info))
            .collect();
        return Json(entries);
    }

    let catalog = state.market_data.catalog();
    let mut entries: Vec<CatalogEntry> = catalog
        .iter()
        .map(|(symbol, info)| CatalogEntry::new(symbol.clone(), info))
        .collect();
    entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
    Json(entries)
}

async fn get_price(
    State(state): State<ApiState>,
    Path((market, symbol)): Path<(String, String)>,
) -> Result<Json<PriceResponse>, AppError> {
    let market = parse_market(&market)?;
    let symbol = symbol.to_uppercase();
    let price = state.market_data.get_current_price(&symbol, market).await;
    Ok(Json(PriceResponse { symbol, market, price }))
}

async fn get_ticker(
    State(state): State<ApiState>,
    Path((market, symbol)): Path<(String, String)>,
) -> Result<Json<Option<Ticker24h>>, AppError> {
    let market = parse_market(&market)?;
    Ok(Json(state.market_data.get_ticker_24h(&symbol.to_uppercase(), market).await))
}

async fn get_history(
    State(state): State<ApiState>,
    Path((market, symbol)): Path<(String, String)>,
    Query(params): Query<HistoryQuery>,
) -> Result<Json<Option<Vec<Candle>>>, AppError> {
    let market = parse_market(&market)?;
    let days = params.days.unwrap_or_else(|| state.market_data.trend_window_days());
    if days == 0 {
        return Err(AppError::InvalidInput("days must be at least 1".to_string()));
    }
    let candles = state
        .market_data
        .get_price_history(&symbol.to_uppercase(), market, days)
        .await;
    Ok(Json(candles.map(|c| c.as_ref().clone())))
}

async fn get_trend(
    State(state): State<ApiState>,
    Path((market, symbol)): Path<(String, String)>,
) -> Result<Json<Option<TrendResult>>, AppError> {
    let market = parse_market(&market)?;
    Ok(Json(state.market_data.analyze_trend(&symbol.to_uppercase(), market).await))
}

// ---------------------------------------------------------------------------
// Handlers: watchlist
// ---------------------------------------------------------------------------

async fn get_watchlist(State(state): State<ApiState>) -> Result<Json<Vec<WatchlistTicker>>, AppError> {
    Ok(Json(state.watchlist.list_all().await?))
}

async fn add_ticker(
    State(state): State<ApiState>,
    Path(list): Path<String>,
    Json(body): Json<AddTickerBody>,
) -> Result<(StatusCode, Json<WatchlistTicker>), AppError> {
    let list = parse_list(&list)?;
    let ticker = state.watchlist.add(list, &body.symbol).await?;
    Ok((StatusCode::CREATED, Json(ticker)))
}

async fn clear_list(
    State(state): State<ApiState>,
    Path(list): Path<String>,
) -> Result<Json<ClearResponse>, AppError> {
    let list = parse_list(&list)?;
    let removed = state.watchlist.clear(list).await?;
    Ok(Json(ClearResponse { removed }))
}

async fn remove_ticker(
    State(state): State<ApiState>,
    Path((list, symbol)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let list = parse_list(&list)?;
    state.watchlist.remove(list, &symbol.to_uppercase()).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_comment(
    State(state): State<ApiState>,
    Path((list, symbol)): Path<(String, String)>,
    Json(body): Json<CommentBody>,
) -> Result<StatusCode, AppError> {
    let list = parse_list(&list)?;
    state
        .watchlist
        .set_comment(list, &symbol.to_uppercase(), &body.comment)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_stars(
    State(state): State<ApiState>,
    Path((list, symbol)): Path<(String, String)>,
    Json(body): Json<StarsBody>,
) -> Result<StatusCode, AppError> {
    let list = parse_list(&list)?;
    state.watchlist.set_stars(list, &symbol.to_uppercase(), body.stars).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_quote(
    State(state): State<ApiState>,
    Path((list, symbol)): Path<(String, String)>,
    Json(body): Json<QuoteBody>,
) -> Result<StatusCode, AppError> {
    let list = parse_list(&list)?;
    state
        .watchlist
        .set_manual_quote(list, &symbol.to_uppercase(), body.price, body.change)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn move_ticker(
    State(state): State<ApiState>,
    Path((list, symbol)): Path<(String, String)>,
    Json(body): Json<MoveBody>,
) -> Result<Json<MoveResponse>, AppError> {
    let list = parse_list(&list)?;
    let moved = state
        .watchlist
        .move_ticker(list, &symbol.to_uppercase(), body.direction)
        .await?;
    Ok(Json(MoveResponse { moved }))
}

// ---------------------------------------------------------------------------
// Handlers: stats
// ---------------------------------------------------------------------------

async fn get_stats_summary(State(state): State<ApiState>) -> Result<Json<SummaryResponse>, AppError> {
    let watchlist = state.watchlist.stats().await?;
    Ok(Json(SummaryResponse {
        connection: state.monitor.snapshot().summary,
        api_available: state.monitor.is_available(),
        catalog_size: state.market_data.catalog().len(),
        watchlist,
    }))
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencySnapshot> {
    Json(state.latency.snapshot())
}
