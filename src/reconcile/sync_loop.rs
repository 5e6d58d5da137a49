use super::plan::{ReconcilePlan, ReconcileReport};
use super::store::TargetStore;
use super::ReconcileError;
use crate::clock::{Clock, SystemClock};
use crate::fleet::ClusterSecretSpec;
use crate::protection::{ProtectedFetcher, RecordSource};
use crate::timeouts::DEFAULT_RECONCILE_INTERVAL;
use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};

/// Periodic fetch-and-reconcile driver for one record stream. Cycles run
/// one at a time.
pub struct SyncLoop<S: RecordSource, T, F, C = SystemClock> {
    fetcher: ProtectedFetcher<S, C>,
    store: T,
    render: F,
    interval: Duration,
}

impl<S, T, F, C> SyncLoop<S, T, F, C>
where
    S: RecordSource,
    T: TargetStore,
    F: Fn(&[S::Record]) -> Vec<ClusterSecretSpec> + Send + Sync,
    C: Clock,
{
    /// `render` derives the desired credential objects from a record set.
    pub fn new(fetcher: ProtectedFetcher<S, C>, store: T, render: F) -> Self {
        Self {
            fetcher,
            store,
            render,
            interval: DEFAULT_RECONCILE_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn fetcher(&self) -> &ProtectedFetcher<S, C> {
        &self.fetcher
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    pub async fn run_once(&self) -> Result<ReconcileReport, ReconcileError> {
        let outcome = self.fetcher.fetch().await?;
        let reason = outcome.degraded().map(|degraded| degraded.cause.reason());
        let (records, degraded) = outcome.into_parts();
        let desired = (self.render)(&records);
        let existing = self.store.list_objects().await?;
        let plan = ReconcilePlan::build(desired, &existing, degraded);

        for object in &plan.apply {
            self.store.upsert(object).await?;
        }

        let mut report = ReconcileReport {
            applied: plan.apply.len(),
            degraded,
            ..ReconcileReport::default()
        };
        if plan.prunes_allowed() {
            for name in &plan.prune {
                self.store.delete(name).await?;
                info!(
                    "event=object_pruned stream={} name={}",
                    self.fetcher.stream(),
                    name
                );
            }
            report.pruned = plan.prune.len();
        } else if !plan.prune.is_empty() {
            warn!(
                "event=prune_deferred stream={} candidates={:?} reason=\"{}\"",
                self.fetcher.stream(),
                plan.prune,
                reason.unwrap_or_default()
            );
            report.deferred_prunes = plan.prune.len();
        }
        debug!(
            "event=reconcile_cycle stream={} applied={} pruned={} deferred={} degraded={}",
            self.fetcher.stream(),
            report.applied,
            report.pruned,
            report.deferred_prunes,
            report.degraded
        );
        Ok(report)
    }

    /// Runs a cycle per tick until `shutdown` resolves. Cycle errors are
    /// logged and the loop continues on the next tick.
    pub async fn run_until(&self, shutdown: impl Future<Output = ()>) {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("event=sync_loop_stopped stream={}", self.fetcher.stream());
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        warn!(
                            "event=reconcile_failed stream={} error={}",
                            self.fetcher.stream(),
                            err
                        );
                    }
                }
            }
        }
    }
}
