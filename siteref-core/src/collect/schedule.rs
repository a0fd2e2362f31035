//! Fixed-interval scheduler for the collection job.
//!
//! Ticks are anchored to when the scheduler started, not to wall-clock
//! boundaries: with a 24h interval a run fires at startup and then every 24h
//! after it. Runs execute one at a time on the calling thread; a run that
//! overruns one or more ticks is followed by the next future tick, never by a
//! burst of catch-up runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Granularity at which a sleeping scheduler notices a stop request.
const DEFAULT_POLL: Duration = Duration::from_millis(250);

/// Runs a task at startup and then on a fixed interval.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    poll: Duration,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            poll: DEFAULT_POLL,
        }
    }

    /// Change how often a sleeping scheduler checks for a stop request.
    pub fn with_poll(mut self, poll: Duration) -> Self {
        self.poll = poll;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Call `task` once per tick until `running` is cleared.
    ///
    /// `task` receives the 1-based iteration number. Returns the number of
    /// iterations run.
    pub fn run<F>(&self, running: &AtomicBool, mut task: F) -> u64
    where
        F: FnMut(u64),
    {
        let started = Instant::now();
        let mut iteration = 0u64;

        while running.load(Ordering::SeqCst) {
            iteration += 1;
            task(iteration);

            let deadline = next_deadline(started, self.interval, Instant::now());
            tracing::debug!(
                iteration,
                wait_secs = deadline.saturating_duration_since(Instant::now()).as_secs(),
                "Waiting for next scheduled run"
            );

            while running.load(Ordering::SeqCst) {
                let now = Instant::now();
                if now >= deadline {
                    break;
                }
                thread::sleep(self.poll.min(deadline - now));
            }
        }

        iteration
    }
}

/// The first tick strictly after `now` for a schedule anchored at `started`.
pub fn next_deadline(started: Instant, interval: Duration, now: Instant) -> Instant {
    if interval.is_zero() {
        return now;
    }
    let elapsed = now.saturating_duration_since(started);
    let ticks = elapsed.as_nanos() / interval.as_nanos() + 1;
    let ticks = u32::try_from(ticks).unwrap_or(u32::MAX);
    started + interval.saturating_mul(ticks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_deadline_anchored_to_start() {
        let start = Instant::now();
        let hour = Duration::from_secs(3600);

        assert_eq!(next_deadline(start, hour, start), start + hour);
        assert_eq!(
            next_deadline(start, hour, start + Duration::from_secs(10)),
            start + hour
        );
        assert_eq!(next_deadline(start, hour, start + hour), start + hour * 2);
    }

    #[test]
    fn test_overrun_skips_missed_ticks() {
        let start = Instant::now();
        let hour = Duration::from_secs(3600);

        // A run that ended 3.5 intervals in waits for the 4th tick
        let now = start + hour * 3 + Duration::from_secs(1800);
        assert_eq!(next_deadline(start, hour, now), start + hour * 4);
    }

    #[test]
    fn test_run_stops_when_cleared() {
        let running = AtomicBool::new(true);
        let scheduler =
            Scheduler::new(Duration::from_millis(5)).with_poll(Duration::from_millis(1));
        let mut seen = Vec::new();

        let iterations = scheduler.run(&running, |iteration| {
            seen.push(iteration);
            if iteration == 3 {
                running.store(false, Ordering::SeqCst);
            }
        });

        assert_eq!(iterations, 3);
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_run_does_nothing_when_already_stopped() {
        let running = AtomicBool::new(false);
        let scheduler = Scheduler::new(Duration::from_secs(3600));

        let iterations = scheduler.run(&running, |_| panic!("should not run"));
        assert_eq!(iterations, 0);
    }
}
