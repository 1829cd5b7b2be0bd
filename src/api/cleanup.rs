//! Scheduled sweep of expired refresh credentials.
//!
//! Revoked rows are kept while unexpired so the audit trail survives until
//! the credential would have died anyway; only rows past their expiry are
//! deleted. The sweep is idempotent and safe to run on every instance.

use chrono::Utc;
use sqlx::PgPool;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::api::handlers::auth::storage::delete_expired;

#[derive(Clone, Copy, Debug)]
pub struct CleanupConfig {
    interval: Duration,
}

impl CleanupConfig {
    /// Default config: sweep once per hour.
    #[must_use]
    pub fn new() -> Self {
        Self {
            interval: Duration::from_secs(3600),
        }
    }

    #[must_use]
    pub fn with_interval_seconds(mut self, seconds: u64) -> Self {
        self.interval = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn normalize(self) -> Self {
        let interval = if self.interval.is_zero() {
            Duration::from_secs(1)
        } else {
            self.interval
        };
        Self { interval }
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background task that periodically deletes expired refresh
/// credentials.
pub fn spawn_cleanup_worker(pool: PgPool, config: CleanupConfig) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let config = config.normalize();
        let interval = config.interval();

        loop {
            match delete_expired(&pool, Utc::now()).await {
                Ok(0) => debug!("cleanup sweep: nothing to delete"),
                Ok(deleted) => info!("cleanup sweep deleted {deleted} expired refresh credentials"),
                Err(err) => error!("cleanup sweep failed: {err}"),
            }

            sleep(interval).await;
        }
    })
}
