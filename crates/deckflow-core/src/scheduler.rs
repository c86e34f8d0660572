//! Elapsed-time gating for the poll context
//!
//! The poll loop may call in as often as it likes; [`RenderScheduler`]
//! decides which periodic jobs are due. Visual feeds run at ~60 Hz, timer
//! work (tap expiry, analysis pickup) every 100 ms.

use std::time::{Duration, Instant};

use crate::config::PollingConfig;

/// Which jobs are due on this poll
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DueWork {
    /// Recompute frequency bins and meters
    pub visuals: bool,
    /// Expire taps and pick up analysis results
    pub timers: bool,
}

impl DueWork {
    pub fn any(&self) -> bool {
        self.visuals || self.timers
    }
}

#[derive(Debug, Clone)]
struct Gate {
    interval: Duration,
    last: Option<Instant>,
}

impl Gate {
    fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    fn check(&mut self, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    visuals: Gate,
    timers: Gate,
}

impl RenderScheduler {
    pub fn new(config: &PollingConfig) -> Self {
        Self {
            visuals: Gate::new(Duration::from_millis(config.visual_ms.max(1))),
            timers: Gate::new(Duration::from_millis(config.timer_ms.max(1))),
        }
    }

    /// Mark due jobs as run at `now` and report them
    pub fn poll(&mut self, now: Instant) -> DueWork {
        DueWork {
            visuals: self.visuals.check(now),
            timers: self.timers.check(now),
        }
    }

    pub fn visual_interval(&self) -> Duration {
        self.visuals.interval
    }

    pub fn timer_interval(&self) -> Duration {
        self.timers.interval
    }

    /// Next instant at which some job becomes due
    pub fn next_due(&self, now: Instant) -> Instant {
        let next = |gate: &Gate| gate.last.map_or(now, |last| last + gate.interval);
        next(&self.visuals).min(next(&self.timers))
    }
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(&PollingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_poll_runs_everything() {
        let mut scheduler = RenderScheduler::default();
        let due = scheduler.poll(Instant::now());
        assert!(due.visuals && due.timers);
    }

    #[test]
    fn test_gates_by_elapsed_time() {
        let mut scheduler = RenderScheduler::default();
        let t0 = Instant::now();
        scheduler.poll(t0);

        let due = scheduler.poll(t0 + Duration::from_millis(5));
        assert!(!due.any());

        let due = scheduler.poll(t0 + Duration::from_millis(16));
        assert!(due.visuals);
        assert!(!due.timers);

        let due = scheduler.poll(t0 + Duration::from_millis(100));
        assert!(due.visuals && due.timers);
    }

    #[test]
    fn test_visuals_run_about_60_times_per_second() {
        let mut scheduler = RenderScheduler::default();
        let t0 = Instant::now();
        let mut visuals = 0;
        let mut timers = 0;
        for ms in 0..1000 {
            let due = scheduler.poll(t0 + Duration::from_millis(ms));
            visuals += due.visuals as u32;
            timers += due.timers as u32;
        }
        assert!((60..=63).contains(&visuals), "visuals ran {} times", visuals);
        assert_eq!(timers, 10);
    }

    #[test]
    fn test_next_due() {
        let mut scheduler = RenderScheduler::default();
        let t0 = Instant::now();
        assert_eq!(scheduler.next_due(t0), t0);
        scheduler.poll(t0);
        assert_eq!(scheduler.next_due(t0), t0 + Duration::from_millis(16));
    }
}
