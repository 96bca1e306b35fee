use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppError, Result};

pub const SPOT_API_URL: &str = "https://api.binance.com";
pub const FUTURES_API_URL: &str = "https://fapi.binance.com";

/// Every exchange request is aborted after this long and treated as a network failure.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Delay before the single self-scheduled retry after a failed health check.
pub const RECONNECT_INTERVAL_MS: u64 = 5_000;

/// Consecutive failed health checks before the monitor stops self-scheduling retries.
pub const MAX_RETRIES: u32 = 3;

/// Background health check interval (seconds). Also the only way out of the fatal state.
pub const HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

/// Watchlist price refresh interval (seconds).
pub const PRICE_REFRESH_INTERVAL_SECS: u64 = 10;

/// Price-history cache entries older than this are refetched.
pub const HISTORY_TTL_SECS: u64 = 600;

/// Window (days) of candles used by the trend classifier.
pub const TREND_WINDOW_DAYS: u32 = 14;

/// Hard cap on rows per klines request imposed by the exchange.
pub const KLINES_MAX_LIMIT: u32 = 1000;

/// Only instruments quoted in this asset are kept in the catalog.
pub const QUOTE_ASSET_SUFFIX: &str = "USDT";

/// Exchange status string for instruments that are currently trading.
pub const TRADING_STATUS: &str = "TRADING";

/// Catalog search needs at least this many characters.
pub const SUGGEST_MIN_QUERY_LEN: usize = 2;

/// Catalog search returns at most this many matches.
pub const SUGGEST_MAX_RESULTS: usize = 10;

/// Capacity of the monitor's retry request channel.
pub const RETRY_CHANNEL_CAPACITY: usize = 16;

/// Band-threshold trend classifier constants.
pub mod trend_thresholds {
    /// Latest close above `mean * UPPER_BAND` is an uptrend.
    pub const UPPER_BAND: f64 = 1.05;
    /// Latest close below `mean * LOWER_BAND` is a downtrend.
    pub const LOWER_BAND: f64 = 0.95;
    /// Relative deviation is multiplied by this before clamping, so ~10% saturates.
    pub const CONFIDENCE_SCALE: f64 = 1000.0;
    pub const MAX_CONFIDENCE: f64 = 100.0;
}

#[derive(Debug, Clone)]
pub struct Config {
    pub spot_api_url: String,
    pub futures_api_url: String,
    pub log_level: String,
    pub db_path: String,
    pub api_port: u16,
    pub request_timeout: Duration,
    pub reconnect_interval: Duration,
    pub max_retries: u32,
    pub health_check_interval: Duration,
    pub price_refresh_interval: Duration,
    pub history_ttl: Duration,
    pub trend_window_days: u32,
    /// Start a fresh retry episode (retry_count = 0) when the periodic check
    /// fires while fatal (RESET_RETRIES_ON_PERIODIC). Off by default.
    pub reset_retries_on_periodic: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spot_api_url: SPOT_API_URL.to_string(),
            futures_api_url: FUTURES_API_URL.to_string(),
            log_level: "info".to_string(),
            db_path: "watchlist.db".to_string(),
            api_port: 3000,
            request_timeout: Duration::from_millis(REQUEST_TIMEOUT_MS),
            reconnect_interval: Duration::from_millis(RECONNECT_INTERVAL_MS),
            max_retries: MAX_RETRIES,
            health_check_interval: Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS),
            price_refresh_interval: Duration::from_secs(PRICE_REFRESH_INTERVAL_SECS),
            history_ttl: Duration::from_secs(HISTORY_TTL_SECS),
            trend_window_days: TREND_WINDOW_DAYS,
            reset_retries_on_periodic: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            spot_api_url: std::env::var("SPOT_API_URL").unwrap_or_else(|_| SPOT_API_URL.to_string()),
            futures_api_url: std::env::var("FUTURES_API_URL")
                .unwrap_or_else(|_| FUTURES_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "watchlist.db".to_string()),
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            request_timeout: Duration::from_millis(env_or("REQUEST_TIMEOUT_MS", REQUEST_TIMEOUT_MS)),
            reconnect_interval: Duration::from_millis(env_or(
                "RECONNECT_INTERVAL_MS",
                RECONNECT_INTERVAL_MS,
            )),
            max_retries: env_or("MAX_RETRIES", MAX_RETRIES),
            health_check_interval: Duration::from_secs(env_or(
                "HEALTH_CHECK_INTERVAL_SECS",
                HEALTH_CHECK_INTERVAL_SECS,
            )),
            price_refresh_interval: Duration::from_secs(env_or(
                "PRICE_REFRESH_INTERVAL_SECS",
                PRICE_REFRESH_INTERVAL_SECS,
            )),
            history_ttl: Duration::from_secs(env_or("HISTORY_TTL_SECS", HISTORY_TTL_SECS)),
            trend_window_days: env_or("TREND_WINDOW_DAYS", TREND_WINDOW_DAYS),
            reset_retries_on_periodic: env_or("RESET_RETRIES_ON_PERIODIC", false),
        })
    }
}

/// Parse an env var, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}
