//! Periodic folding of cache counters into durable visit totals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::domain::repositories::MappingRepository;
use crate::infrastructure::cache::{CacheError, CacheService};

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Mappings read from the store.
    pub scanned: usize,
    /// Mappings whose pending visits were added to the durable total.
    pub synced: usize,
    /// Visits moved from counters into durable totals.
    pub visits_synced: i64,
    /// Mappings with no counter or nothing pending.
    pub unchanged: usize,
    /// Mappings whose store write failed; their counter is kept for next pass.
    pub failed: usize,
    /// Negative counters that were brought back to zero.
    pub discarded: usize,
    /// The cache could not be read; the pass stopped early.
    pub cache_unavailable: bool,
    /// Another pass was already running.
    pub skipped: bool,
}

impl ReconcileReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Folds `counter:<code>` values back into `ShortMapping.visits`.
///
/// A counter holds the visits not yet written to the store. Each pass adds
/// it to the durable total, then subtracts exactly that amount from the
/// counter, so hits that land in between stay pending for the next pass.
/// Neither cache key is ever deleted.
///
/// At most one pass runs at a time per job. Store faults are absorbed per
/// mapping and cache faults end the pass without touching the store.
pub struct ReconciliationJob {
    mappings: Arc<dyn MappingRepository>,
    cache: Arc<dyn CacheService>,
    batch_size: i64,
    running: AtomicBool,
}

/// Releases the single-flight flag on drop, including on panic.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ReconciliationJob {
    pub fn new(
        mappings: Arc<dyn MappingRepository>,
        cache: Arc<dyn CacheService>,
        batch_size: i64,
    ) -> Self {
        Self {
            mappings,
            cache,
            batch_size: batch_size.max(1),
            running: AtomicBool::new(false),
        }
    }

    /// Runs a single pass over every mapping in the store.
    ///
    /// Returns immediately with `skipped = true` if a pass is in flight.
    pub async fn run_once(&self) -> ReconcileReport {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Reconciliation already running, skipping");
            return ReconcileReport::skipped();
        }
        let _guard = RunGuard(&self.running);

        let mut report = ReconcileReport::default();
        let mut after_id = 0;

        loop {
            let page = match self.mappings.page_after(after_id, self.batch_size).await {
                Ok(page) => page,
                Err(e) => {
                    error!("Reconciliation could not page store after id {}: {}", after_id, e);
                    break;
                }
            };

            let Some(last) = page.last() else {
                break;
            };
            after_id = last.id;
            report.scanned += page.len();

            let codes: Vec<String> = page.iter().map(|m| m.code.clone()).collect();
            let counters = match self.cache.get_counters(&codes).await {
                Ok(counters) => counters,
                Err(CacheError::Disabled) => {
                    debug!("Cache disabled, nothing to reconcile");
                    report.cache_unavailable = true;
                    break;
                }
                Err(e) => {
                    warn!("Cache unavailable, ending reconciliation pass: {}", e);
                    report.cache_unavailable = true;
                    break;
                }
            };

            for (mapping, counter) in page.iter().zip(counters) {
                self.reconcile_one(&mapping.code, counter, &mut report).await;
            }

            if (page.len() as i64) < self.batch_size {
                break;
            }
        }

        metrics::counter!("reconcile_synced_total").increment(report.synced as u64);
        metrics::counter!("reconcile_visits_synced_total").increment(report.visits_synced as u64);
        metrics::counter!("reconcile_failed_total").increment(report.failed as u64);

        info!(
            "Reconciliation pass: scanned={} synced={} visits={} unchanged={} failed={} discarded={} cache_unavailable={}",
            report.scanned,
            report.synced,
            report.visits_synced,
            report.unchanged,
            report.failed,
            report.discarded,
            report.cache_unavailable
        );

        report
    }

    async fn reconcile_one(
        &self,
        code: &str,
        counter: Option<i64>,
        report: &mut ReconcileReport,
    ) {
        let pending = match counter {
            None | Some(0) => {
                report.unchanged += 1;
                return;
            }
            Some(n) if n < 0 => {
                // Only reachable if the counter was written outside this crate.
                warn!("Counter for {} is negative ({}), resetting", code, n);
                report.discarded += 1;
                if let Err(e) = self.cache.subtract_counter(code, n).await {
                    warn!("Failed to reset counter for {}: {}", code, e);
                }
                return;
            }
            Some(n) => n,
        };

        if let Err(e) = self.mappings.increment_visits(code, pending).await {
            error!("Failed to write visits for {}, retrying next pass: {}", code, e);
            report.failed += 1;
            return;
        }

        report.synced += 1;
        report.visits_synced += pending;

        match self.cache.subtract_counter(code, pending).await {
            Ok(Some(left)) => {
                debug!("Synced {} visits for {}, {} still pending", pending, code, left)
            }
            Ok(None) => debug!("Synced {} visits for {}, counter already gone", pending, code),
            Err(e) => error!(
                "Synced {} visits for {} but could not subtract them from the counter, they will be counted again: {}",
                pending, code, e
            ),
        }
    }

    /// Runs passes every `interval` until `shutdown` flips to `true`, then
    /// runs one final pass.
    ///
    /// Each pass runs in its own task; a panicking pass is logged and the
    /// loop continues.
    pub async fn run(self: Arc<Self>, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately.
        ticker.tick().await;

        info!("Reconciliation loop started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.clone().spawn_pass().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Reconciliation loop stopping, running final pass");
        self.spawn_pass().await;
    }

    async fn spawn_pass(self: Arc<Self>) {
        let handle = tokio::spawn(async move { self.run_once().await });

        if let Err(e) = handle.await {
            error!("Reconciliation pass aborted: {}", e);
        }
    }
}
