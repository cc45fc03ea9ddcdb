//! PollingScheduler: drives the scanner on a fixed interval, one cycle at a time.
//!
//! A cycle runs immediately on start (backfill), then once per tick. Ticks that fire
//! while a cycle is still running are skipped. Cycle errors are logged here and never
//! stop polling; the unadvanced range is retried on a later tick.

use crate::scanner::{CycleError, CycleOutcome, RangeScanner};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};

/// Held for the duration of a cycle; releases the in-flight flag on drop, including on
/// error and panic unwinding.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PollingScheduler {
    scanner: RangeScanner,
    poll_interval: Duration,
    in_flight: AtomicBool,
    consecutive_failures: AtomicU32,
}

impl PollingScheduler {
    pub fn new(scanner: RangeScanner, poll_interval: Duration) -> Self {
        Self {
            scanner,
            poll_interval,
            in_flight: AtomicBool::new(false),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    pub fn scanner(&self) -> &RangeScanner {
        &self.scanner
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// True while a cycle holds the single-flight guard.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Run one cycle unless another is in flight. `None` means the call was skipped.
    pub async fn run_cycle_once(&self) -> Option<Result<CycleOutcome, CycleError>> {
        let _guard = FlightGuard::acquire(&self.in_flight)?;
        Some(self.scanner.run_cycle().await)
    }

    /// One tick: run a cycle and log its result.
    pub async fn tick(&self) {
        let Some(result) = self.run_cycle_once().await else {
            tracing::warn!("previous cycle still running, skipping tick");
            return;
        };
        match result {
            Ok(CycleOutcome::UpToDate { last_block, head }) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                tracing::debug!(last_block, head, "no new blocks to index");
            }
            Ok(CycleOutcome::Advanced(report)) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
                tracing::info!(
                    from = report.from_block,
                    to = report.to_block,
                    chunks = report.chunks,
                    logs = report.stats.logs,
                    inserted = report.stats.inserted,
                    duplicates = report.stats.duplicates,
                    skipped = report.stats.skipped,
                    "synced vault events"
                );
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(kind = e.kind(), reason = %e, failures, "indexing cycle failed");
            }
        }
    }

    /// Backfill once, then tick every `poll_interval` until `shutdown` resolves.
    /// Each tick runs on its own task so a slow cycle makes later ticks skip rather than queue.
    /// On shutdown no new tick starts; a cycle already running is awaited before returning.
    pub async fn start_polling<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        tracing::info!(
            source_id = %self.scanner.config().source_id,
            interval = ?self.poll_interval,
            "starting vault polling indexer"
        );
        self.tick().await;

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; the backfill above already covered it.
        ticker.tick().await;

        let mut ticks = JoinSet::new();
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {
                    while ticks.try_join_next().is_some() {}
                    let this = Arc::clone(&self);
                    ticks.spawn(async move { this.tick().await });
                }
            }
        }

        if !ticks.is_empty() {
            tracing::info!("shutdown requested, waiting for the running cycle");
        }
        while let Some(res) = ticks.join_next().await {
            if let Err(e) = res {
                tracing::error!(reason = %e, "polling tick task failed");
            }
        }
        tracing::info!("polling stopped");
    }
}
