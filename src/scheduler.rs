//! Fixed-period poll scheduler
//!
//! Drives a cycle function on a fixed period until stopped. Each cycle runs
//! in its own task, and at most one cycle is in flight: a tick that fires
//! while the previous cycle is still running is skipped, not queued.
//!
//! Stopping is cooperative. The tick loop exits at the next opportunity and
//! then waits for the in-flight cycle to finish on its own.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::Result;

/// Shortest period the scheduler will tick at
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Poll scheduling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Time between ticks
    pub interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Set the poll interval, raised to at least [`MIN_INTERVAL`]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(MIN_INTERVAL);
        self
    }
}

/// Scheduler counters
#[derive(Debug, Default)]
pub struct SchedulerStats {
    cycles_started: AtomicU64,
    cycles_failed: AtomicU64,
    ticks_skipped: AtomicU64,
}

impl SchedulerStats {
    /// Cycles that were started
    pub fn cycles_started(&self) -> u64 {
        self.cycles_started.load(Ordering::Relaxed)
    }

    /// Cycles that returned an error or panicked
    pub fn cycles_failed(&self) -> u64 {
        self.cycles_failed.load(Ordering::Relaxed)
    }

    /// Ticks dropped because a cycle was still running
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }
}

/// Fixed-period scheduler
pub struct Scheduler;

impl Scheduler {
    /// Start invoking `cycle` every `interval`
    ///
    /// The first tick fires immediately. Cycle errors are logged and do not
    /// stop the schedule. An interval below [`MIN_INTERVAL`] is raised to it.
    pub fn start<F, Fut>(interval: Duration, cycle: F) -> SchedulerHandle
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        if interval < MIN_INTERVAL {
            tracing::warn!(
                requested = ?interval,
                "Poll interval too short, using minimum"
            );
        }
        let interval = interval.max(MIN_INTERVAL);

        let cancel = CancellationToken::new();
        let stats = Arc::new(SchedulerStats::default());

        let task = tokio::spawn(Self::run(
            interval,
            cycle,
            cancel.clone(),
            Arc::clone(&stats),
        ));

        tracing::info!(interval_secs = interval.as_secs_f64(), "Scheduler started");

        SchedulerHandle {
            cancel,
            stats,
            task,
        }
    }

    async fn run<F, Fut>(
        interval: Duration,
        mut cycle: F,
        cancel: CancellationToken,
        stats: Arc<SchedulerStats>,
    ) where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: Option<JoinHandle<()>> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if let Some(ref handle) = in_flight {
                if !handle.is_finished() {
                    stats.ticks_skipped.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!("Previous cycle still running, tick skipped");
                    continue;
                }
            }

            if let Some(handle) = in_flight.take() {
                Self::reap(handle, &stats).await;
            }

            stats.cycles_started.fetch_add(1, Ordering::Relaxed);
            let run = cycle();
            let cycle_stats = Arc::clone(&stats);

            in_flight = Some(tokio::spawn(async move {
                if let Err(e) = run.await {
                    cycle_stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(error = %e, "Poll cycle failed");
                }
            }));
        }

        if let Some(handle) = in_flight.take() {
            tracing::debug!("Waiting for in-flight cycle");
            Self::reap(handle, &stats).await;
        }

        tracing::info!("Scheduler stopped");
    }

    /// Collect a finished cycle task, logging a panic if there was one
    async fn reap(handle: JoinHandle<()>, stats: &SchedulerStats) {
        if let Err(e) = handle.await {
            stats.cycles_failed.fetch_add(1, Ordering::Relaxed);
            tracing::error!(error = %e, "Poll cycle panicked");
        }
    }
}

/// Handle to a running scheduler
pub struct SchedulerHandle {
    cancel: CancellationToken,
    stats: Arc<SchedulerStats>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Signal the scheduler to stop; does not interrupt a running cycle
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Check if stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Scheduler counters
    pub fn stats(&self) -> &Arc<SchedulerStats> {
        &self.stats
    }

    /// Stop and wait for the in-flight cycle to finish
    pub async fn shutdown(self) {
        self.stop();
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task failed");
        }
    }
}

impl fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use super::*;
    use crate::error::Error;

    fn counter() -> Arc<AtomicU64> {
        Arc::new(AtomicU64::new(0))
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_is_immediate_then_periodic() {
        let runs = counter();
        let seen = Arc::clone(&runs);

        let handle = Scheduler::start(Duration::from_secs(60), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_ticking() {
        let handle = Scheduler::start(Duration::from_secs(10), || async {
            Err(Error::InvalidConfig("boom".into()))
        });

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(handle.stats().cycles_started(), 4);
        assert_eq!(handle.stats().cycles_failed(), 4);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_cycle_is_contained() {
        let handle = Scheduler::start(Duration::from_secs(10), || async {
            if true {
                panic!("cycle exploded");
            }
            Ok(())
        });

        tokio::time::sleep(Duration::from_secs(25)).await;

        assert_eq!(handle.stats().cycles_started(), 3);
        assert!(handle.stats().cycles_failed() >= 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_ticks_are_skipped() {
        let running = Arc::new(AtomicBool::new(false));
        let overlapped = Arc::new(AtomicBool::new(false));
        let (r, o) = (Arc::clone(&running), Arc::clone(&overlapped));

        let handle = Scheduler::start(Duration::from_secs(10), move || {
            let (running, overlapped) = (Arc::clone(&r), Arc::clone(&o));
            async move {
                if running.swap(true, Ordering::SeqCst) {
                    overlapped.store(true, Ordering::SeqCst);
                }
                tokio::time::sleep(Duration::from_secs(25)).await;
                running.store(false, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(95)).await;
        handle.shutdown().await;

        assert!(!overlapped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skip_counts() {
        let handle = Scheduler::start(Duration::from_secs(10), || async {
            tokio::time::sleep(Duration::from_secs(25)).await;
            Ok(())
        });

        // Cycle at t=0 runs until t=25: ticks at 10 and 20 are skipped,
        // the tick at 30 starts the next cycle.
        tokio::time::sleep(Duration::from_secs(31)).await;

        assert_eq!(handle.stats().cycles_started(), 2);
        assert_eq!(handle.stats().ticks_skipped(), 2);
        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_for_in_flight_cycle() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);

        let handle = Scheduler::start(Duration::from_secs(60), move || {
            let flag = Arc::clone(&flag);
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                flag.store(true, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!finished.load(Ordering::SeqCst));

        handle.shutdown().await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_still_ticks() {
        let runs = counter();
        let seen = Arc::clone(&runs);

        let handle = Scheduler::start(Duration::ZERO, move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(runs.load(Ordering::SeqCst) >= 2);
        assert!(!handle.is_stopped());
        handle.shutdown().await;
    }

    #[test]
    fn test_poll_interval_has_a_floor() {
        let config = PollConfig::default().interval(Duration::ZERO);
        assert_eq!(config.interval, MIN_INTERVAL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_cycles_after_stop() {
        let runs = counter();
        let seen = Arc::clone(&runs);

        let handle = Scheduler::start(Duration::from_secs(10), move || {
            let seen = Arc::clone(&seen);
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.shutdown().await;
        let after_stop = runs.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }
}
