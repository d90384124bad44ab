//! Periodic retention sweep.

use crate::{app::AppState, error::PersistenceError, util::retention_threshold};
use chrono::Utc;
use std::time::Duration;
use tokio::{
  task::JoinHandle,
  time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::{error, info, warn};

/// Time between sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Spawn the sweep loop on its own task; it runs until the runtime shuts down.
pub fn spawn(state: AppState) -> JoinHandle<()> {
  tokio::spawn(run(state, SWEEP_INTERVAL))
}

/// Sweep every `period`, starting one period from now. A failed sweep is
/// logged and the loop waits for the next tick.
pub async fn run(state: AppState, period: Duration) {
  info!(
    retention_days = state.config.retention_days,
    period_secs = period.as_secs(),
    "retention sweep scheduled"
  );
  let mut ticker = interval_at(Instant::now() + period, period);
  ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
  loop {
    ticker.tick().await;
    if let Err(e) = sweep_once(&state).await {
      error!("retention sweep failed: {e}");
    }
  }
}

/// Delete expired records with their files, then reload the cache.
pub async fn sweep_once(state: &AppState) -> Result<u64, PersistenceError> {
  let Some(threshold) = retention_threshold(Utc::now(), state.config.retention_days) else {
    warn!(
      retention_days = state.config.retention_days,
      "retention window exceeds the date range; nothing expires"
    );
    return Ok(0);
  };
  let deleted = state.store.delete_older_than(&threshold).await?;
  state.cache.reload(&state.store).await?;
  info!(deleted, threshold = %threshold, "retention sweep finished");
  Ok(deleted)
}
