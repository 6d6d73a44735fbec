use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::api::FeedClient;
use crate::classifier::RouteReference;
use crate::fetch::Transport;
use crate::models::{Vehicle, VehicleFeed};

pub const DEFAULT_PERIOD: Duration = Duration::from_millis(5000);

pub const TRANSIENT_ERROR_MESSAGE: &str =
    "Could not refresh vehicle positions; showing last known data.";
pub const FATAL_ERROR_MESSAGE: &str = "Could not load the route reference; reload to try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    pub period: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self { period: DEFAULT_PERIOD }
    }
}

/// What the presentation layer reads: the latest vehicle snapshot and the pipeline status
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    pub vehicles: Arc<Vec<Vehicle>>,
    /// Freshness timestamp as reported by the feed
    pub last_update: Option<String>,
    pub is_initial_loading: bool,
    /// Set once the route reference is known to be unavailable; never cleared
    pub fatal_error: Option<String>,
    /// Set when the most recent tick failed
    pub transient_error: Option<String>,
    /// Bumped on every snapshot replacement
    pub generation: u64,
}

impl Default for RefreshState {
    fn default() -> Self {
        Self {
            vehicles: Arc::new(Vec::new()),
            last_update: None,
            is_initial_loading: true,
            fatal_error: None,
            transient_error: None,
            generation: 0,
        }
    }
}

impl RefreshState {
    /// Replace the snapshot with a freshly fetched feed
    pub fn apply_success(&mut self, feed: VehicleFeed, reference: &RouteReference) {
        let vehicles: Vec<Vehicle> = feed.vehicles
            .into_iter()
            .map(|record| reference.enrich(record))
            .collect();

        self.vehicles = Arc::new(vehicles);
        if let Some(last_update) = feed.last_update {
            self.last_update = Some(last_update);
        }
        self.transient_error = None;
        self.is_initial_loading = false;
        self.generation += 1;
    }

    /// Record a failed tick, keeping the previous snapshot
    pub fn apply_failure(&mut self, message: impl Into<String>) {
        self.transient_error = Some(message.into());
        self.is_initial_loading = false;
    }

    pub fn apply_fatal(&mut self, message: impl Into<String>) {
        self.fatal_error = Some(message.into());
        self.is_initial_loading = false;
    }
}

/// Stops the pipeline task. Dropping the handle stops it too.
pub struct RefreshHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl RefreshHandle {
    /// Cancel the timer. A request already in flight finishes but its result is discarded.
    pub fn stop(&self) {
        // fails only when the task already ended
        let _ = self.stop.send(true);
    }

    pub async fn shutdown(self) -> Result<(), JoinError> {
        self.stop();
        self.task.await
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

fn is_stopped(stop: &watch::Receiver<bool>) -> bool {
    *stop.borrow() || stop.has_changed().is_err()
}

/// Load the route reference, then poll the vehicle feed until stopped.
///
/// Returns immediately; progress is published on the returned receiver. The
/// channel closes once the pipeline can produce no further updates, either
/// because it was stopped or because the route reference failed to load.
pub fn start_pipeline<T>(
    client: FeedClient<T>,
    settings: RefreshSettings,
) -> (RefreshHandle, watch::Receiver<RefreshState>)
where
    T: Transport + 'static,
{
    let (state_tx, state_rx) = watch::channel(RefreshState::default());
    let (stop_tx, stop_rx) = watch::channel(false);

    let task = tokio::spawn(run_pipeline(Arc::new(client), settings, state_tx, stop_rx));

    (RefreshHandle { stop: stop_tx, task }, state_rx)
}

async fn run_pipeline<T: Transport>(
    client: Arc<FeedClient<T>>,
    settings: RefreshSettings,
    state: watch::Sender<RefreshState>,
    stop: watch::Receiver<bool>,
) {
    let reference = client.fetch_route_reference().await;
    if is_stopped(&stop) {
        tracing::debug!("Stopped while loading route reference");
        return;
    }

    let reference = match reference {
        Ok(reference) => reference,
        Err(e) => {
            let e = anyhow::Error::new(e);
            tracing::error!("Route reference unavailable, not polling vehicles: {:#}", e);
            state.send_modify(|s| s.apply_fatal(format!("{} ({:#})", FATAL_ERROR_MESSAGE, e)));
            return;
        }
    };

    run_refresh_loop(client, reference, settings, state, stop).await;
}

async fn run_refresh_loop<T: Transport>(
    client: Arc<FeedClient<T>>,
    reference: RouteReference,
    settings: RefreshSettings,
    state: watch::Sender<RefreshState>,
    mut stop: watch::Receiver<bool>,
) {
    // the first tick completes immediately; ticks missed during a slow cycle are skipped
    let mut interval = tokio::time::interval(settings.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut tick_count: u64 = 0;

    tracing::info!(period_ms = settings.period.as_millis() as u64, "Starting refresh loop");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = stop.changed() => break,
        }
        tick_count += 1;

        let outcome = client.fetch_vehicles().await;
        if is_stopped(&stop) {
            tracing::debug!(tick = tick_count, "Discarding refresh result after stop");
            break;
        }

        match outcome {
            Ok(feed) => {
                let count = feed.vehicles.len();
                state.send_modify(|s| s.apply_success(feed, &reference));
                tracing::info!(tick = tick_count, count, "Vehicle snapshot replaced");
            }
            Err(e) => {
                tracing::warn!(
                    tick = tick_count,
                    "Refresh failed, keeping previous vehicles: {:#}",
                    anyhow::Error::new(e)
                );
                state.send_modify(|s| s.apply_failure(TRANSIENT_ERROR_MESSAGE));
            }
        }
    }

    tracing::info!(ticks = tick_count, "Refresh loop stopped");
}
