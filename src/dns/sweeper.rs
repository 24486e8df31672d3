//! Periodic retention sweeps
//!
//! Records and logged requests are only kept for a bounded window; without
//! the sweep the request log in particular grows without limit and the
//! deletes stop being cheap. The sweeper runs on its own timer, independent
//! of request traffic, and a failed sweep is reported and retried on the
//! next tick rather than taking the process down.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::dns::errors::Result;
use crate::dns::store::ZoneStore;

/// Retention windows and sweep cadence.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Records older than this are deleted.
    pub record_max_age: Duration,
    /// Logged requests older than this are deleted.
    pub request_max_age: Duration,
    /// How often the sweep runs.
    pub interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> RetentionConfig {
        RetentionConfig {
            record_max_age: Duration::from_secs(7 * 24 * 3600),
            request_max_age: Duration::from_secs(24 * 3600),
            interval: Duration::from_secs(3600),
        }
    }
}

pub struct RetentionSweeper {
    store: Arc<ZoneStore>,
    config: RetentionConfig,
}

impl RetentionSweeper {
    pub fn new(store: Arc<ZoneStore>, config: RetentionConfig) -> RetentionSweeper {
        RetentionSweeper { store, config }
    }

    /// Run one sweep, returning (records removed, requests removed).
    pub async fn sweep(&self) -> Result<(u64, u64)> {
        let records = self.store.delete_old_records(self.config.record_max_age).await?;
        let requests = self
            .store
            .delete_old_requests(self.config.request_max_age)
            .await?;
        Ok((records, requests))
    }

    /// Run the sweep on its configured interval until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            // the first tick fires immediately; skip it so startup is quiet
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match self.sweep().await {
                    Ok((records, requests)) => {
                        if records > 0 || requests > 0 {
                            log::info!(
                                "retention sweep removed {} records, {} requests",
                                records,
                                requests
                            );
                        }
                    }
                    Err(e) => {
                        log::error!("retention sweep failed: {}", e);
                    }
                }
            }
        })
    }
}
