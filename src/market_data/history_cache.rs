use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::types::{Candle, Market};

/// Composite cache key: one entry per (symbol, market, window) combination.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryKey {
    pub symbol: String,
    pub market: Market,
    pub window_days: u32,
}

impl HistoryKey {
    pub fn new(symbol: &str, market: Market, window_days: u32) -> Self {
        Self {
            symbol: symbol.to_string(),
            market,
            window_days,
        }
    }
}

#[derive(Debug)]
struct CacheEntry {
    candles: Arc<Vec<Candle>>,
    fetched_at: Instant,
}

/// In-memory price-history cache with a fixed TTL.
///
/// Entries are never evicted: an expired entry reads as absent and is
/// overwritten by the next successful fetch. Failed fetches are never cached.
/// Two callers missing the same key concurrently will both fetch; the last
/// insert wins.
pub struct HistoryCache {
    entries: DashMap<HistoryKey, CacheEntry>,
    ttl: Duration,
}

impl HistoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Cached candles for `key` if fetched less than one TTL ago.
    pub fn get_fresh(&self, key: &HistoryKey) -> Option<Arc<Vec<Candle>>> {
        self.get_fresh_at(key, Instant::now())
    }

    fn get_fresh_at(&self, key: &HistoryKey, now: Instant) -> Option<Arc<Vec<Candle>>> {
        let entry = self.entries.get(key)?;
        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(Arc::clone(&entry.candles))
        } else {
            None
        }
    }

    /// Store a freshly fetched window, replacing any previous entry.
    pub fn insert(&self, key: HistoryKey, candles: Vec<Candle>) -> Arc<Vec<Candle>> {
        let candles = Arc::new(candles);
        self.entries.insert(
            key,
            CacheEntry {
                candles: Arc::clone(&candles),
                fetched_at: Instant::now(),
            },
        );
        candles
    }

    /// Number of entries, fresh or expired.
    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candle(close: f64) -> Candle {
        Candle {
            open_time_ms: 0,
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
        }
    }

    #[test]
    fn hit_within_ttl_returns_same_allocation() {
        let cache = HistoryCache::new(Duration::from_secs(600));
        let key = HistoryKey::new("BTCUSDT", Market::Spot, 14);
        let stored = cache.insert(key.clone(), vec![candle(1.0), candle(2.0)]);

        let hit = cache.get_fresh(&key).expect("fresh entry");
        assert!(Arc::ptr_eq(&stored, &hit));
    }

    #[test]
    fn entry_expires_after_ttl() {
        let cache = HistoryCache::new(Duration::from_secs(600));
        let key = HistoryKey::new("BTCUSDT", Market::Spot, 14);
        cache.insert(key.clone(), vec![candle(1.0)]);

        let later = Instant::now() + Duration::from_secs(601);
        assert!(cache.get_fresh_at(&key, later).is_none());
        // Expired entries are not evicted, only ignored.
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_differ_by_market_and_window() {
        let cache = HistoryCache::new(Duration::from_secs(600));
        cache.insert(HistoryKey::new("ETHUSDT", Market::Spot, 14), vec![candle(1.0)]);

        assert!(cache.get_fresh(&HistoryKey::new("ETHUSDT", Market::Futures, 14)).is_none());
        assert!(cache.get_fresh(&HistoryKey::new("ETHUSDT", Market::Spot, 30)).is_none());
        assert!(cache.get_fresh(&HistoryKey::new("ETHUSDT", Market::Spot, 14)).is_some());
    }

    #[test]
    fn insert_overwrites_previous_entry() {
        let cache = HistoryCache::new(Duration::from_secs(600));
        let key = HistoryKey::new("SOLUSDT", Market::Futures, 5);
        cache.insert(key.clone(), vec![candle(1.0)]);
        let second = cache.insert(key.clone(), vec![candle(2.0), candle(3.0)]);

        let hit = cache.get_fresh(&key).unwrap();
        assert!(Arc::ptr_eq(&second, &hit));
        assert_eq!(hit.len(), 2);
        assert_eq!(cache.len(), 1);
    }
}
