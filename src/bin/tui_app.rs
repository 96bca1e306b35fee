use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror routes.rs shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct WatchlistCounts {
    pub total: i64,
    pub long: i64,
    pub short: i64,
    pub long_wait: i64,
    pub short_wait: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct SummaryResponse {
    pub connection: String,
    pub api_available: bool,
    pub catalog_size: usize,
    pub watchlist: WatchlistCounts,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub connected: bool,
    pub retry_count: u32,
    pub max_retries: u32,
    pub phase: String,
    pub summary: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: Option<i64>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TrendResponse {
    pub direction: String,
    pub confidence: u8,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct TickerResponse {
    pub list: String,
    pub symbol: String,
    pub display_name: String,
    pub market: String,
    pub current_price: f64,
    pub percent_change_24h: f64,
    pub is_exchange_listed: bool,
    pub comment: String,
    pub star_rating: u8,
    pub trend: Option<TrendResponse>,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

/// Which list the table shows. Tab cycles through these in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFilter {
    All,
    Long,
    Short,
    LongWait,
    ShortWait,
}

impl ListFilter {
    pub fn next(self) -> Self {
        match self {
            ListFilter::All => ListFilter::Long,
            ListFilter::Long => ListFilter::Short,
            ListFilter::Short => ListFilter::LongWait,
            ListFilter::LongWait => ListFilter::ShortWait,
            ListFilter::ShortWait => ListFilter::All,
        }
    }

    /// Wire name of the list, None for the combined view.
    pub fn list_name(self) -> Option<&'static str> {
        match self {
            ListFilter::All => None,
            ListFilter::Long => Some("long"),
            ListFilter::Short => Some("short"),
            ListFilter::LongWait => Some("long-wait"),
            ListFilter::ShortWait => Some("short-wait"),
        }
    }

    pub fn label(self) -> &'static str {
        self.list_name().unwrap_or("all")
    }

    pub fn matches(self, list: &str) -> bool {
        self.list_name().map_or(true, |name| name == list)
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub summary: SummaryResponse,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub tickers: Vec<TickerResponse>,
    pub filter: ListFilter,
    pub last_refresh: std::time::Instant,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            summary: SummaryResponse::default(),
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            tickers: Vec::new(),
            filter: ListFilter::All,
            last_refresh: std::time::Instant::now(),
            base_url,
        }
    }

    /// Tickers visible under the current filter, in server order.
    pub fn visible_tickers(&self) -> Vec<&TickerResponse> {
        self.tickers.iter().filter(|t| self.filter.matches(&t.list)).collect()
    }

    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let summary_url = format!("{}/stats/summary", self.base_url);
        let watchlist_url = format!("{}/watchlist", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (summary_res, watchlist_res, health_res, latency_res) = tokio::join!(
            client.get(&summary_url).send(),
            client.get(&watchlist_url).send(),
            client.get(&health_url).send(),
            client.get(&latency_url).send(),
        );

        let (summary_resp, watchlist_resp) = match (summary_res, watchlist_res) {
            (Ok(s), Ok(w)) => (s, w),
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("{e}"));
                return;
            }
        };

        let (summary, tickers) = tokio::join!(
            summary_resp.json::<SummaryResponse>(),
            watchlist_resp.json::<Vec<TickerResponse>>(),
        );

        match (summary, tickers) {
            (Ok(s), Ok(t)) => {
                self.summary = s;
                self.tickers = t;
                self.status = ConnectionStatus::Connected;
                self.last_refresh = std::time::Instant::now();

                if let Ok(h) = health_res {
                    if let Ok(health) = h.json::<HealthResponse>().await {
                        self.health = health;
                    }
                }
                if let Ok(l) = latency_res {
                    if let Ok(latency) = l.json::<LatencyResponse>().await {
                        self.latency = latency;
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                self.status = ConnectionStatus::Error(format!("parse error: {e}"));
            }
        }
    }

    /// PUT a new star rating. Errors land in the status line.
    pub async fn set_stars(&mut self, client: &reqwest::Client, list: &str, symbol: &str, stars: u8) {
        let url = format!("{}/watchlist/{}/{}/stars", self.base_url, list, symbol);
        let res = client
            .put(&url)
            .json(&serde_json::json!({ "stars": stars }))
            .send()
            .await;
        match res {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => self.status = ConnectionStatus::Error(format!("stars: HTTP {}", resp.status())),
            Err(e) => self.status = ConnectionStatus::Error(format!("{e}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Pressing the current rating clears it.
pub fn toggled_stars(current: u8, pressed: u8) -> u8 {
    if current == pressed {
        0
    } else {
        pressed
    }
}

/// Fewer decimals for large prices, six for sub-dollar ones.
pub fn format_price(v: f64) -> String {
    if v >= 1000.0 {
        format!("{v:.2}")
    } else if v >= 1.0 {
        format!("{v:.4}")
    } else {
        format!("{v:.6}")
    }
}

pub fn format_change(pct: f64) -> String {
    if pct > 0.0 {
        format!("+{pct:.2}%")
    } else {
        format!("{pct:.2}%")
    }
}

pub fn format_trend(trend: Option<&TrendResponse>) -> String {
    match trend {
        Some(t) => {
            let arrow = match t.direction.as_str() {
                "up" => "↑",
                "down" => "↓",
                _ => "↔",
            };
            format!("{arrow} {}%", t.confidence)
        }
        None => "—".to_string(),
    }
}

pub fn format_stars(n: u8) -> String {
    let filled = n.min(3) as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(3 - filled))
}

pub fn format_latency(ms: Option<f64>) -> String {
    ms.map_or("—".to_string(), |v| format!("{v:.0}ms"))
}

/// Truncate to at most `max` characters, marking the cut with an ellipsis.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{kept}…")
    }
}
