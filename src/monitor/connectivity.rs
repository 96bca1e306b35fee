use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use tokio::time::{interval, sleep_until, Instant};
use tracing::{debug, error, info, warn};

use crate::config::{Config, RETRY_CHANNEL_CAPACITY};
use crate::exchange::ExchangeClient;
use crate::types::{ConnectionPhase, ConnectionSnapshot, ConnectionState};

/// Invoked with the full snapshot on every state transition.
pub type StatusCallback = Arc<dyn Fn(&ConnectionSnapshot) + Send + Sync>;

const FATAL_ERROR: &str = "Fatal connection error";

/// Tracks whether the exchange API is reachable.
///
/// State machine:
/// - `Unchecked` → `Connected` | `Retrying`
/// - `Retrying` → `Connected` | `Retrying` (one self-scheduled retry per failure)
/// - `Retrying` → `Fatal` once `retry_count` reaches `max_retries`
/// - `Fatal` is left only through the periodic health check.
///
/// The periodic check only pings while disconnected, in any phase; a connected
/// monitor stays connected until a check it was asked to run fails.
///
/// A success always resets `retry_count` to 0.
pub struct ConnectivityMonitor {
    client: Arc<ExchangeClient>,
    state: Mutex<ConnectionState>,
    max_retries: u32,
    reconnect_interval: Duration,
    health_check_interval: Duration,
    reset_retries_on_periodic: bool,
    on_change: Option<StatusCallback>,
    retry_tx: mpsc::Sender<()>,
    /// Taken by the health loop on `start`.
    retry_rx: Mutex<Option<mpsc::Receiver<()>>>,
}

impl ConnectivityMonitor {
    pub fn new(cfg: &Config, client: Arc<ExchangeClient>) -> Self {
        let (retry_tx, retry_rx) = mpsc::channel(RETRY_CHANNEL_CAPACITY);
        Self {
            client,
            state: Mutex::new(ConnectionState::default()),
            max_retries: cfg.max_retries,
            reconnect_interval: cfg.reconnect_interval,
            health_check_interval: cfg.health_check_interval,
            reset_retries_on_periodic: cfg.reset_retries_on_periodic,
            on_change: None,
            retry_tx,
            retry_rx: Mutex::new(Some(retry_rx)),
        }
    }

    pub fn with_status_callback(mut self, callback: StatusCallback) -> Self {
        self.on_change = Some(callback);
        self
    }

    /// Current `connected` flag. Never triggers a check.
    pub fn is_available(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }

    pub fn snapshot(&self) -> ConnectionSnapshot {
        let state = self.state.lock().map(|s| s.clone()).unwrap_or_default();
        ConnectionSnapshot::new(state, self.max_retries)
    }

    /// Probe the liveness endpoint once and apply the result.
    ///
    /// Timeouts, transport errors and non-2xx statuses all take the same
    /// failure path. A non-fatal failure schedules exactly one retry after the
    /// reconnect interval; a fatal one schedules nothing.
    pub async fn check_connection(&self) -> bool {
        match self.client.ping().await {
            Ok(()) => {
                self.record_success();
                true
            }
            Err(e) => {
                self.record_failure(&e.to_string());
                false
            }
        }
    }

    fn record_success(&self) {
        let snapshot = {
            let Ok(mut state) = self.state.lock() else { return };
            let was_connected = state.connected;
            state.connected = true;
            state.retry_count = 0;
            state.last_error = None;
            state.last_check_at_ns = Some(now_ns());
            if !was_connected {
                info!("Exchange API reachable");
            }
            ConnectionSnapshot::new(state.clone(), self.max_retries)
        };
        self.notify(&snapshot);
    }

    fn record_failure(&self, error: &str) {
        let snapshot = {
            let Ok(mut state) = self.state.lock() else { return };
            state.connected = false;
            state.retry_count = state.retry_count.saturating_add(1);
            let fatal = state.retry_count >= self.max_retries;
            state.last_error = Some(if fatal { FATAL_ERROR.to_string() } else { error.to_string() });
            state.last_check_at_ns = Some(now_ns());
            ConnectionSnapshot::new(state.clone(), self.max_retries)
        };

        if snapshot.phase == ConnectionPhase::Fatal {
            error!(
                retry_count = snapshot.state.retry_count,
                max_retries = self.max_retries,
                "Exchange API unreachable, giving up until next periodic check: {error}"
            );
        } else {
            warn!(
                retry_count = snapshot.state.retry_count,
                max_retries = self.max_retries,
                "Exchange API check failed, retrying in {}ms: {error}",
                self.reconnect_interval.as_millis()
            );
            if let Err(e) = self.retry_tx.try_send(()) {
                debug!("Retry already queued: {e}");
            }
        }

        self.notify(&snapshot);
    }

    fn notify(&self, snapshot: &ConnectionSnapshot) {
        if let Some(cb) = &self.on_change {
            cb(snapshot);
        }
    }

    /// Spawn the background health loop. Only the first call has an effect.
    pub fn start(self: &Arc<Self>) -> bool {
        let retry_rx = match self.retry_rx.lock() {
            Ok(mut slot) => slot.take(),
            Err(_) => None,
        };
        let Some(retry_rx) = retry_rx else {
            warn!("Connectivity monitor already started");
            return false;
        };

        let monitor = Arc::clone(self);
        tokio::spawn(async move { monitor.run(retry_rx).await });
        true
    }

    async fn run(self: Arc<Self>, mut retry_rx: mpsc::Receiver<()>) {
        let mut ticker = interval(self.health_check_interval);
        ticker.tick().await; // consume immediate first tick, startup already checked

        let mut retry_at: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.periodic_check().await;
                }

                Some(()) = retry_rx.recv() => {
                    // At most one pending retry; later requests keep the earlier deadline.
                    retry_at.get_or_insert_with(|| Instant::now() + self.reconnect_interval);
                }

                _ = sleep_until(retry_at.unwrap_or_else(Instant::now)), if retry_at.is_some() => {
                    retry_at = None;
                    debug!("Running scheduled connection retry");
                    self.check_connection().await;
                }
            }
        }
    }

    async fn periodic_check(&self) {
        if self.is_available() {
            return;
        }
        if self.reset_retries_on_periodic {
            if let Ok(mut state) = self.state.lock() {
                if state.phase(self.max_retries) == ConnectionPhase::Fatal {
                    debug!("Starting a fresh retry episode");
                    state.retry_count = 0;
                }
            }
        }
        self.check_connection().await;
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}
