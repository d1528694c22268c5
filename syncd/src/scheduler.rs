//! Fixed-interval pass scheduling.
//!
//! Passes run back to back on a single thread: a pass always finishes
//! before the next one starts, and the wait before the next pass is the
//! remainder of the interval. A pass that overruns its interval is followed
//! immediately by the next one.

use crate::checkpoint::CheckpointStore;
use crate::orchestrator::{PassOutcome, Synchronizer};
use std::time::{Duration, Instant};

/// Blocks the scheduling thread between passes.
#[cfg_attr(test, mockall::automock)]
pub trait Sleeper {
    /// Waits for `duration`.
    fn sleep(&self, duration: Duration);
}

/// [`Sleeper`] using [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Counts of passes run by [`Scheduler::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes started.
    pub passes: usize,
    /// Passes that ended with an error.
    pub failures: usize,
}

/// Runs passes on a fixed interval.
pub struct Scheduler<'a> {
    interval: Duration,
    sleeper: &'a dyn Sleeper,
}

impl<'a> Scheduler<'a> {
    /// Creates a scheduler starting a pass every `interval`.
    #[must_use]
    pub const fn new(interval: Duration, sleeper: &'a dyn Sleeper) -> Self {
        Self { interval, sleeper }
    }

    /// Runs passes until `max_passes` have run, or forever when `None`.
    ///
    /// The first pass starts immediately. Pass errors are logged and never
    /// stop the loop.
    pub fn run<C: CheckpointStore>(
        &self,
        synchronizer: &mut Synchronizer<'_, C>,
        max_passes: Option<usize>,
    ) -> RunSummary {
        let mut summary = RunSummary::default();
        loop {
            let started = Instant::now();
            summary.passes += 1;
            if !run_logged(synchronizer) {
                summary.failures += 1;
            }
            if max_passes.is_some_and(|max| summary.passes >= max) {
                return summary;
            }
            let delay = next_delay(self.interval, started.elapsed());
            log::debug!("next pass in {}s", delay.as_secs());
            self.sleeper.sleep(delay);
        }
    }
}

/// Runs one pass and logs its outcome. Returns `true` on success.
pub fn run_logged<C: CheckpointStore>(synchronizer: &mut Synchronizer<'_, C>) -> bool {
    match synchronizer.run_pass() {
        Ok(PassOutcome::Unchanged { .. }) => true,
        Ok(PassOutcome::Committed { previous, current }) => {
            log::info!(
                "checkpoint advanced from {} to {}",
                previous.as_ref().map_or("<none>", |commit| commit.short()),
                current.short()
            );
            true
        }
        Err(err) => {
            log::error!("{err}");
            false
        }
    }
}

/// Time left in the interval after a pass that took `elapsed`.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use syncd::scheduler::next_delay;
///
/// let interval = Duration::from_secs(60);
/// assert_eq!(next_delay(interval, Duration::from_secs(15)), Duration::from_secs(45));
/// assert_eq!(next_delay(interval, Duration::from_secs(90)), Duration::ZERO);
/// ```
#[must_use]
pub const fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}
