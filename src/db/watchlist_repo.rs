use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::db::models::{ListCountRow, WatchlistRow};
use crate::error::{AppError, Result};
use crate::types::{ListKind, TrendResult, WatchlistStats, WatchlistTicker};

const SELECT_COLUMNS: &str = "SELECT list_kind, symbol, display_name, market, current_price, \
     percent_change_24h, is_exchange_listed, comment, star_rating, trend_direction, \
     trend_confidence, added_at, position FROM watchlist";

/// SQLite-backed watchlist storage. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct WatchlistRepo {
    pool: SqlitePool,
}

impl WatchlistRepo {
    /// Open (creating if needed) the database file and run migrations.
    pub async fn connect(db_path: &str) -> Result<Self> {
        let pool = SqlitePool::connect(&format!("sqlite:{db_path}?mode=rwc")).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database ready at {db_path}");
        Ok(Self { pool })
    }

    /// Private in-memory database. One connection, since every new
    /// connection to `sqlite::memory:` opens a separate empty database.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Insert a new ticker. Returns false, leaving the stored row untouched,
    /// when the symbol is already in that list.
    pub async fn insert(&self, t: &WatchlistTicker) -> Result<bool> {
        let (direction, confidence) = trend_columns(t.trend.as_ref());
        let res = sqlx::query(
            r#"
            INSERT INTO watchlist (
                list_kind, symbol, display_name, market, current_price,
                percent_change_24h, is_exchange_listed, comment, star_rating,
                trend_direction, trend_confidence, added_at, position
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (list_kind, symbol) DO NOTHING
            "#,
        )
        .bind(t.list.as_str())
        .bind(&t.symbol)
        .bind(&t.display_name)
        .bind(t.market.as_str())
        .bind(t.current_price)
        .bind(t.percent_change_24h)
        .bind(i64::from(t.is_exchange_listed))
        .bind(&t.comment)
        .bind(i64::from(t.star_rating))
        .bind(direction)
        .bind(confidence)
        .bind(t.added_at_ns)
        .bind(t.position)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn exists(&self, list: ListKind, symbol: &str) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM watchlist WHERE list_kind = ? AND symbol = ?")
            .bind(list.as_str())
            .bind(symbol)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    /// One past the largest position in `list`, or 0 for an empty list.
    pub async fn next_position(&self, list: ListKind) -> Result<i64> {
        let max: Option<i64> = sqlx::query_scalar("SELECT MAX(position) FROM watchlist WHERE list_kind = ?")
            .bind(list.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(max.map_or(0, |p| p + 1))
    }

    pub async fn get(&self, list: ListKind, symbol: &str) -> Result<Option<WatchlistTicker>> {
        let row: Option<WatchlistRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE list_kind = ? AND symbol = ?"))
                .bind(list.as_str())
                .bind(symbol)
                .fetch_optional(&self.pool)
                .await?;
        row.map(WatchlistTicker::try_from).transpose()
    }

    /// Every ticker, grouped by list in declaration order, then by position.
    pub async fn list_all(&self) -> Result<Vec<WatchlistTicker>> {
        let rows: Vec<WatchlistRow> = sqlx::query_as(&format!("{SELECT_COLUMNS} ORDER BY position ASC, added_at ASC"))
            .fetch_all(&self.pool)
            .await?;
        let mut tickers = rows
            .into_iter()
            .map(WatchlistTicker::try_from)
            .collect::<Result<Vec<_>>>()?;
        tickers.sort_by_key(|t| ListKind::ALL.iter().position(|k| *k == t.list));
        Ok(tickers)
    }

    /// Tickers eligible for background quote refresh.
    pub async fn list_listed(&self) -> Result<Vec<WatchlistTicker>> {
        let rows: Vec<WatchlistRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE is_exchange_listed = 1 ORDER BY list_kind, position"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WatchlistTicker::try_from).collect()
    }

    /// Returns false when nothing matched.
    pub async fn remove(&self, list: ListKind, symbol: &str) -> Result<bool> {
        let res = sqlx::query("DELETE FROM watchlist WHERE list_kind = ? AND symbol = ?")
            .bind(list.as_str())
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn clear(&self, list: ListKind) -> Result<u64> {
        let res = sqlx::query("DELETE FROM watchlist WHERE list_kind = ?")
            .bind(list.as_str())
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected())
    }

    pub async fn set_comment(&self, list: ListKind, symbol: &str, comment: &str) -> Result<bool> {
        let res = sqlx::query("UPDATE watchlist SET comment = ? WHERE list_kind = ? AND symbol = ?")
            .bind(comment)
            .bind(list.as_str())
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_stars(&self, list: ListKind, symbol: &str, stars: u8) -> Result<bool> {
        let res = sqlx::query("UPDATE watchlist SET star_rating = ? WHERE list_kind = ? AND symbol = ?")
            .bind(i64::from(stars))
            .bind(list.as_str())
            .bind(symbol)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Store a fresh quote. A `None` trend keeps whatever trend is stored.
    pub async fn update_quote(
        &self,
        list: ListKind,
        symbol: &str,
        price: f64,
        change: f64,
        trend: Option<&TrendResult>,
    ) -> Result<bool> {
        let (direction, confidence) = trend_columns(trend);
        let res = sqlx::query(
            r#"
            UPDATE watchlist SET
                current_price = ?,
                percent_change_24h = ?,
                trend_direction = COALESCE(?, trend_direction),
                trend_confidence = COALESCE(?, trend_confidence)
            WHERE list_kind = ? AND symbol = ?
            "#,
        )
        .bind(price)
        .bind(change)
        .bind(direction)
        .bind(confidence)
        .bind(list.as_str())
        .bind(symbol)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Manual price/change for a ticker the exchange does not list.
    pub async fn set_manual_quote(&self, list: ListKind, symbol: &str, price: f64, change: f64) -> Result<bool> {
        let res = sqlx::query(
            "UPDATE watchlist SET current_price = ?, percent_change_24h = ? \
             WHERE list_kind = ? AND symbol = ? AND is_exchange_listed = 0",
        )
        .bind(price)
        .bind(change)
        .bind(list.as_str())
        .bind(symbol)
        .execute(&self.pool)
        .await?;
        Ok(res.rows_affected() > 0)
    }

    /// Renumber `list` so each symbol's position is its index in `symbols`,
    /// in one transaction.
    pub async fn set_order(&self, list: ListKind, symbols: &[String]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (position, symbol) in symbols.iter().enumerate() {
            sqlx::query("UPDATE watchlist SET position = ? WHERE list_kind = ? AND symbol = ?")
                .bind(position as i64)
                .bind(list.as_str())
                .bind(symbol)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn counts(&self) -> Result<WatchlistStats> {
        let rows: Vec<ListCountRow> =
            sqlx::query_as("SELECT list_kind, COUNT(*) AS n FROM watchlist GROUP BY list_kind")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = WatchlistStats::default();
        for row in rows {
            let kind = ListKind::parse(&row.list_kind)
                .ok_or_else(|| AppError::InvalidRecord(format!("unknown list kind {:?}", row.list_kind)))?;
            match kind {
                ListKind::Long => stats.long = row.n,
                ListKind::Short => stats.short = row.n,
                ListKind::LongWait => stats.long_wait = row.n,
                ListKind::ShortWait => stats.short_wait = row.n,
            }
            stats.total += row.n;
        }
        Ok(stats)
    }
}

fn trend_columns(trend: Option<&TrendResult>) -> (Option<String>, Option<i64>) {
    match trend {
        Some(t) => (Some(t.direction.to_string()), Some(i64::from(t.confidence))),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Market, TrendDirection};

    fn ticker(list: ListKind, symbol: &str, position: i64, listed: bool) -> WatchlistTicker {
        WatchlistTicker {
            list,
            symbol: symbol.to_string(),
            display_name: symbol.trim_end_matches("USDT").to_string(),
            market: Market::Spot,
            current_price: 1.0,
            percent_change_24h: 0.0,
            is_exchange_listed: listed,
            comment: String::new(),
            star_rating: 0,
            trend: None,
            added_at_ns: position,
            position,
        }
    }

    #[tokio::test]
    async fn insert_get_and_exists() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        let t = ticker(ListKind::Long, "BTCUSDT", 0, true);
        repo.insert(&t).await.unwrap();

        assert!(repo.exists(ListKind::Long, "BTCUSDT").await.unwrap());
        assert!(!repo.exists(ListKind::Short, "BTCUSDT").await.unwrap());
        assert_eq!(repo.get(ListKind::Long, "BTCUSDT").await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn duplicate_insert_is_ignored() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        let t = ticker(ListKind::Long, "BTCUSDT", 0, true);
        assert!(repo.insert(&t).await.unwrap());

        let mut again = t.clone();
        again.comment = "second".to_string();
        assert!(!repo.insert(&again).await.unwrap());
        assert_eq!(repo.get(ListKind::Long, "BTCUSDT").await.unwrap(), Some(t));
    }

    #[tokio::test]
    async fn next_position_follows_max() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        assert_eq!(repo.next_position(ListKind::Short).await.unwrap(), 0);
        repo.insert(&ticker(ListKind::Short, "AUSDT", 0, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Short, "BUSDT", 4, true)).await.unwrap();
        assert_eq!(repo.next_position(ListKind::Short).await.unwrap(), 5);
        assert_eq!(repo.next_position(ListKind::Long).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_all_groups_by_list_then_position() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        repo.insert(&ticker(ListKind::ShortWait, "ZUSDT", 0, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Long, "BUSDT", 1, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Long, "AUSDT", 0, true)).await.unwrap();

        let symbols: Vec<String> = repo.list_all().await.unwrap().into_iter().map(|t| t.symbol).collect();
        assert_eq!(symbols, vec!["AUSDT", "BUSDT", "ZUSDT"]);
    }

    #[tokio::test]
    async fn update_quote_keeps_trend_when_none() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        repo.insert(&ticker(ListKind::Long, "ETHUSDT", 0, true)).await.unwrap();

        let up = TrendResult {
            direction: TrendDirection::Up,
            confidence: 55,
        };
        assert!(repo.update_quote(ListKind::Long, "ETHUSDT", 10.0, 2.0, Some(&up)).await.unwrap());
        assert!(repo.update_quote(ListKind::Long, "ETHUSDT", 11.0, 3.0, None).await.unwrap());

        let t = repo.get(ListKind::Long, "ETHUSDT").await.unwrap().unwrap();
        assert_eq!(t.current_price, 11.0);
        assert_eq!(t.percent_change_24h, 3.0);
        assert_eq!(t.trend, Some(up));
    }

    #[tokio::test]
    async fn manual_quote_only_touches_unlisted() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        repo.insert(&ticker(ListKind::Long, "BTCUSDT", 0, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Long, "MYCOIN", 1, false)).await.unwrap();

        assert!(!repo.set_manual_quote(ListKind::Long, "BTCUSDT", 5.0, 1.0).await.unwrap());
        assert!(repo.set_manual_quote(ListKind::Long, "MYCOIN", 5.0, 1.0).await.unwrap());
        let t = repo.get(ListKind::Long, "MYCOIN").await.unwrap().unwrap();
        assert_eq!(t.current_price, 5.0);
    }

    #[tokio::test]
    async fn set_order_renumbers_whole_list() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        repo.insert(&ticker(ListKind::Long, "AUSDT", 7, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Long, "BUSDT", 7, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Short, "AUSDT", 3, true)).await.unwrap();

        repo.set_order(ListKind::Long, &["BUSDT".to_string(), "AUSDT".to_string()])
            .await
            .unwrap();
        assert_eq!(repo.get(ListKind::Long, "BUSDT").await.unwrap().unwrap().position, 0);
        assert_eq!(repo.get(ListKind::Long, "AUSDT").await.unwrap().unwrap().position, 1);
        assert_eq!(repo.get(ListKind::Short, "AUSDT").await.unwrap().unwrap().position, 3);
    }

    #[tokio::test]
    async fn remove_clear_and_counts() {
        let repo = WatchlistRepo::in_memory().await.unwrap();
        repo.insert(&ticker(ListKind::Long, "AUSDT", 0, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Long, "BUSDT", 1, true)).await.unwrap();
        repo.insert(&ticker(ListKind::Short, "CUSDT", 0, true)).await.unwrap();
        repo.insert(&ticker(ListKind::ShortWait, "DUSDT", 0, false)).await.unwrap();

        let stats = repo.counts().await.unwrap();
        assert_eq!(stats.total, 4);
        assert_eq!(stats.long, 2);
        assert_eq!(stats.long_wait, 0);

        assert!(repo.remove(ListKind::Short, "CUSDT").await.unwrap());
        assert!(!repo.remove(ListKind::Short, "CUSDT").await.unwrap());
        assert_eq!(repo.clear(ListKind::Long).await.unwrap(), 2);
        assert_eq!(repo.counts().await.unwrap().total, 1);
        assert!(repo.list_listed().await.unwrap().is_empty());
    }
}
