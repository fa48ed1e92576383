use anyhow::Context;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use super::ViewDirtyFlag;
use crate::ports::outbound::{MaterializedView, ScanStore};
use crate::shared::error::ReconcileError;
use crate::shared::Result;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// ViewRefreshScheduler - periodically rebuilds the aggregate views when a
/// commit has marked them stale
///
/// Readers of the views see data at most one interval plus one refresh
/// behind the base tables. A refresh failure stops the scheduler and is
/// returned to whoever runs it.
pub struct ViewRefreshScheduler<S> {
    store: Arc<S>,
    dirty: Arc<ViewDirtyFlag>,
    interval: Duration,
}

impl<S: ScanStore + 'static> ViewRefreshScheduler<S> {
    pub fn new(store: Arc<S>, dirty: Arc<ViewDirtyFlag>) -> Self {
        Self {
            store,
            dirty,
            interval: DEFAULT_REFRESH_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        // tokio rejects a zero period
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// One scheduler tick: refreshes every view if the flag was set.
    ///
    /// Returns whether a refresh ran.
    pub async fn refresh_if_dirty(&self) -> Result<bool> {
        if !self.dirty.get_and_set_false() {
            return Ok(false);
        }
        self.refresh_all().await?;
        Ok(true)
    }

    /// Refreshes the four views one after another, stopping at the first failure.
    pub async fn refresh_all(&self) -> Result<()> {
        let started = Instant::now();
        for view in MaterializedView::ALL {
            let store = Arc::clone(&self.store);
            let view_started = Instant::now();
            tokio::task::spawn_blocking(move || store.refresh_materialized_view(view))
                .await
                .context("view refresh worker panicked")?
                .map_err(|e| ReconcileError::RefreshFailure {
                    view: view.name().to_string(),
                    details: format!("{:#}", e),
                })?;
            debug!(
                view = %view,
                elapsed_ms = view_started.elapsed().as_millis() as u64,
                "refreshed view"
            );
        }
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "aggregate views refreshed"
        );
        Ok(())
    }

    /// Runs until a refresh fails. The first tick fires immediately.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Runs until `shutdown` resolves or a refresh fails. A refresh in
    /// progress is never interrupted; once `shutdown` fires, pending
    /// changes are flushed with one last tick.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(interval_ms = self.interval.as_millis() as u64, "view refresh scheduler started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = &mut shutdown => break,
            }
            self.tick().await?;
        }
        self.tick().await?;
        info!("view refresh scheduler stopped");
        Ok(())
    }

    async fn tick(&self) -> Result<()> {
        if let Err(e) = self.refresh_if_dirty().await {
            error!(error = %format!("{:#}", e), "view refresh failed; stopping scheduler");
            return Err(e);
        }
        Ok(())
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }
}
