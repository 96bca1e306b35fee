//! Database row types matching `migrations/0001_watchlist.sql`.
//! Used by sqlx for typed queries.
use crate::error::{AppError, Result};
use crate::types::{ListKind, Market, TrendDirection, TrendResult, WatchlistTicker};

#[derive(Debug, sqlx::FromRow)]
pub struct WatchlistRow {
    pub list_kind: String,
    pub symbol: String,
    pub display_name: String,
    pub market: String,
    pub current_price: f64,
    pub percent_change_24h: f64,
    pub is_exchange_listed: i64,
    pub comment: String,
    pub star_rating: i64,
    pub trend_direction: Option<String>,
    pub trend_confidence: Option<i64>,
    pub added_at: i64,
    pub position: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ListCountRow {
    pub list_kind: String,
    pub n: i64,
}

impl TryFrom<WatchlistRow> for WatchlistTicker {
    type Error = AppError;

    fn try_from(row: WatchlistRow) -> Result<Self> {
        let list = ListKind::parse(&row.list_kind)
            .ok_or_else(|| AppError::InvalidRecord(format!("unknown list kind {:?}", row.list_kind)))?;
        let market = Market::parse(&row.market)
            .ok_or_else(|| AppError::InvalidRecord(format!("unknown market {:?}", row.market)))?;

        // A half-written trend (direction without confidence or vice versa) reads as none.
        let trend = match (row.trend_direction.as_deref().and_then(TrendDirection::parse), row.trend_confidence) {
            (Some(direction), Some(c)) => Some(TrendResult {
                direction,
                confidence: c.clamp(0, 100) as u8,
            }),
            _ => None,
        };

        Ok(WatchlistTicker {
            list,
            symbol: row.symbol,
            display_name: row.display_name,
            market,
            current_price: row.current_price,
            percent_change_24h: row.percent_change_24h,
            is_exchange_listed: row.is_exchange_listed != 0,
            comment: row.comment,
            star_rating: row.star_rating.clamp(0, 3) as u8,
            trend,
            added_at_ns: row.added_at,
            position: row.position,
        })
    }
}
