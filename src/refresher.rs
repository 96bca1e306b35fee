use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, error, warn};

use crate::watchlist::WatchlistManager;

/// Background quote refresh for every exchange-listed watchlist ticker.
pub struct PriceRefresher {
    watchlist: WatchlistManager,
    interval: Duration,
}

impl PriceRefresher {
    pub fn new(watchlist: WatchlistManager, interval: Duration) -> Self {
        Self { watchlist, interval }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        ticker.tick().await; // skip immediate first tick, tickers were quoted on add

        loop {
            ticker.tick().await;
            self.refresh_all().await;
        }
    }

    /// Spawn one refresh per ticker and return without waiting for them.
    /// Returns the number of refreshes started.
    pub async fn refresh_all(&self) -> usize {
        let tickers = match self.watchlist.refreshable().await {
            Ok(t) => t,
            Err(e) => {
                error!("Watchlist read failed: {e}");
                return 0;
            }
        };

        let count = tickers.len();
        for t in tickers {
            let watchlist = self.watchlist.clone();
            tokio::spawn(async move {
                match watchlist.refresh_ticker(&t).await {
                    Ok(true) => debug!(symbol = %t.symbol, list = %t.list, "Ticker updated"),
                    Ok(false) => {}
                    Err(e) => warn!(symbol = %t.symbol, list = %t.list, "Ticker refresh failed: {e}"),
                }
            });
        }
        count
    }
}
