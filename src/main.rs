mod analysis;
mod api;
mod config;
mod db;
mod error;
mod exchange;
mod market_data;
mod monitor;
mod refresher;
mod types;
mod watchlist;

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::latency::LatencyStats;
use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::db::WatchlistRepo;
use crate::error::Result;
use crate::exchange::ExchangeClient;
use crate::market_data::MarketDataService;
use crate::monitor::{ConnectivityMonitor, StatusCallback};
use crate::refresher::PriceRefresher;
use crate::types::{ConnectionPhase, ConnectionSnapshot};
use crate::watchlist::WatchlistManager;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Exchange client + connectivity ---
    let latency = Arc::new(LatencyStats::new());
    let client = Arc::new(ExchangeClient::new(&cfg, Arc::clone(&latency))?);

    let on_status: StatusCallback = Arc::new(log_connection_status);
    let monitor = Arc::new(ConnectivityMonitor::new(&cfg, Arc::clone(&client)).with_status_callback(on_status));
    if !monitor.check_connection().await {
        warn!("Exchange unreachable at startup, continuing with retries");
    }
    monitor.start();

    // --- Market data + catalog ---
    let market_data = Arc::new(MarketDataService::new(&cfg, client).with_monitor(Arc::clone(&monitor)));
    market_data.refresh_catalog().await;

    // --- Watchlist storage ---
    let repo = WatchlistRepo::connect(&cfg.db_path).await?;
    let watchlist = WatchlistManager::new(repo, Arc::clone(&market_data));
    let stats = watchlist.stats().await?;
    info!(
        "Watchlist loaded: {} tickers (long={} short={} long-wait={} short-wait={})",
        stats.total, stats.long, stats.short, stats.long_wait, stats.short_wait,
    );

    // Price refresher (background, every PRICE_REFRESH_INTERVAL_SECS)
    let refresher = PriceRefresher::new(watchlist.clone(), cfg.price_refresh_interval);
    tokio::spawn(async move { refresher.run().await });

    // --- HTTP API server ---
    let app = router(ApiState {
        market_data,
        monitor,
        watchlist,
        latency,
    });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}

fn log_connection_status(snapshot: &ConnectionSnapshot) {
    match snapshot.phase {
        ConnectionPhase::Connected | ConnectionPhase::Unchecked => {
            info!(event = "CONNECTION", phase = %snapshot.phase, "{}", snapshot.summary)
        }
        ConnectionPhase::Retrying => {
            warn!(event = "CONNECTION", phase = %snapshot.phase, "{}", snapshot.summary)
        }
        ConnectionPhase::Fatal => {
            error!(event = "CONNECTION", phase = %snapshot.phase, "{}", snapshot.summary)
        }
    }
}
