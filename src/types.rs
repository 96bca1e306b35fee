use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Market / instruments
// ---------------------------------------------------------------------------

/// Trading venue classification. Each has its own REST base URL and paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Market {
    Spot,
    Futures,
}

impl Market {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "spot" => Some(Market::Spot),
            "futures" => Some(Market::Futures),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Market::Spot => "spot",
            Market::Futures => "futures",
        }
    }
}

impl std::fmt::Display for Market {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One instrument catalog entry. Keyed by symbol in the catalog map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentInfo {
    pub display_name: String,
    pub market: Market,
}

// ---------------------------------------------------------------------------
// Candles
// ---------------------------------------------------------------------------

/// One OHLCV bucket, parsed from a klines row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle bucket width requested from the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KlineInterval {
    OneHour,
    FourHours,
    OneDay,
}

impl KlineInterval {
    /// <= 7 days → hourly, <= 30 days → 4-hourly, otherwise daily.
    pub fn for_window(window_days: u32) -> Self {
        if window_days <= 7 {
            KlineInterval::OneHour
        } else if window_days <= 30 {
            KlineInterval::FourHours
        } else {
            KlineInterval::OneDay
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            KlineInterval::OneHour => "1h",
            KlineInterval::FourHours => "4h",
            KlineInterval::OneDay => "1d",
        }
    }
}

impl std::fmt::Display for KlineInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Last price and 24h percent change from the 24h ticker endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker24h {
    pub last_price: f64,
    pub price_change_percent: f64,
}

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Neutral,
}

impl TrendDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "up" => Some(TrendDirection::Up),
            "down" => Some(TrendDirection::Down),
            "neutral" => Some(TrendDirection::Neutral),
            _ => None,
        }
    }
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Neutral => "neutral",
        };
        write!(f, "{s}")
    }
}

/// Direction plus a [0, 100] deviation score. Not a probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    pub confidence: u8,
}

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Mutated only by the connectivity monitor's health-check result handler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConnectionState {
    pub connected: bool,
    /// Nanosecond UTC epoch of the last completed health check.
    pub last_check_at_ns: Option<u64>,
    pub retry_count: u32,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionPhase {
    Unchecked,
    Connected,
    Retrying,
    /// Retry budget exhausted; only the periodic check will try again.
    Fatal,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionPhase::Unchecked => "unchecked",
            ConnectionPhase::Connected => "connected",
            ConnectionPhase::Retrying => "retrying",
            ConnectionPhase::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

impl ConnectionState {
    pub fn phase(&self, max_retries: u32) -> ConnectionPhase {
        if self.connected {
            ConnectionPhase::Connected
        } else if self.last_check_at_ns.is_none() {
            ConnectionPhase::Unchecked
        } else if self.retry_count >= max_retries {
            ConnectionPhase::Fatal
        } else {
            ConnectionPhase::Retrying
        }
    }
}

/// Full state handed to the status callback and served on `/health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    #[serde(flatten)]
    pub state: ConnectionState,
    pub max_retries: u32,
    pub phase: ConnectionPhase,
    pub summary: String,
}

impl ConnectionSnapshot {
    pub fn new(state: ConnectionState, max_retries: u32) -> Self {
        let phase = state.phase(max_retries);
        let summary = match phase {
            ConnectionPhase::Unchecked => "Connection not checked yet".to_string(),
            ConnectionPhase::Connected => format!(
                "Connected to exchange ({})",
                state.last_check_at_ns.map(format_clock_ns).unwrap_or_default()
            ),
            ConnectionPhase::Retrying | ConnectionPhase::Fatal => format!(
                "Connection error: {} [Retry {}/{}]",
                state.last_error.as_deref().unwrap_or("Unknown error"),
                state.retry_count,
                max_retries
            ),
        };
        Self { state, max_retries, phase, summary }
    }
}

/// Nanosecond epoch timestamp → UTC `HH:MM:SS`.
pub fn format_clock_ns(ns: u64) -> String {
    let secs = ns / 1_000_000_000;
    let h = (secs / 3600) % 24;
    let m = (secs / 60) % 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

// ---------------------------------------------------------------------------
// Watchlist
// ---------------------------------------------------------------------------

/// The four interest buckets a ticker can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListKind {
    Long,
    Short,
    LongWait,
    ShortWait,
}

impl ListKind {
    pub const ALL: [ListKind; 4] = [
        ListKind::Long,
        ListKind::Short,
        ListKind::LongWait,
        ListKind::ShortWait,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "long" => Some(ListKind::Long),
            "short" => Some(ListKind::Short),
            "long-wait" => Some(ListKind::LongWait),
            "short-wait" => Some(ListKind::ShortWait),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ListKind::Long => "long",
            ListKind::Short => "short",
            ListKind::LongWait => "long-wait",
            ListKind::ShortWait => "short-wait",
        }
    }
}

impl std::fmt::Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchlistTicker {
    pub list: ListKind,
    pub symbol: String,
    pub display_name: String,
    pub market: Market,
    pub current_price: f64,
    pub percent_change_24h: f64,
    /// False for manually entered tickers; those are never refreshed.
    pub is_exchange_listed: bool,
    pub comment: String,
    /// 0-3
    pub star_rating: u8,
    pub trend: Option<TrendResult>,
    /// Nanosecond UTC epoch.
    pub added_at_ns: i64,
    /// Order within the list, ascending.
    pub position: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistStats {
    pub total: i64,
    pub long: i64,
    pub short: i64,
    pub long_wait: i64,
    pub short_wait: i64,
}
