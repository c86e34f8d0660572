//! Tap tempo estimator
//!
//! Keeps the last few tap instants. Once the window is full the mean
//! interval gives the BPM; a value outside the accepted range is ignored and
//! the previous BPM stays. A pause longer than the reset time starts a new
//! measurement session.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::AnalysisError;

/// Tap estimator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TapTempoConfig {
    /// Taps kept for the mean (intervals = window - 1)
    pub window: usize,
    /// Idle time after which the tap buffer is cleared
    pub reset_ms: u64,
    pub min_bpm: f64,
    pub max_bpm: f64,
}

impl Default for TapTempoConfig {
    fn default() -> Self {
        Self {
            window: 4,
            reset_ms: 2000,
            min_bpm: 40.0,
            max_bpm: 250.0,
        }
    }
}

impl TapTempoConfig {
    pub fn accepts(&self, bpm: f64) -> bool {
        bpm.is_finite() && bpm >= self.min_bpm && bpm <= self.max_bpm
    }

    fn reset_after(&self) -> Duration {
        Duration::from_millis(self.reset_ms)
    }
}

/// Result of one tap
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapOutcome {
    /// Tap stored, window not yet full
    Recorded { taps: usize },
    /// A new BPM was computed and published
    Bpm(f64),
    /// The computed BPM was out of range; previous BPM retained
    Rejected(f64),
}

#[derive(Debug, Clone)]
pub struct TapTempo {
    config: TapTempoConfig,
    taps: VecDeque<Instant>,
    bpm: Option<f64>,
}

impl TapTempo {
    pub fn new(config: TapTempoConfig) -> Self {
        let window = config.window.max(2);
        Self {
            config: TapTempoConfig { window, ..config },
            taps: VecDeque::with_capacity(window),
            bpm: None,
        }
    }

    /// Register a tap at `now`
    pub fn tap(&mut self, now: Instant) -> TapOutcome {
        self.expire(now);
        if self.taps.len() == self.config.window {
            self.taps.pop_front();
        }
        self.taps.push_back(now);

        if self.taps.len() < self.config.window {
            return TapOutcome::Recorded {
                taps: self.taps.len(),
            };
        }

        let (Some(first), Some(last)) = (self.taps.front(), self.taps.back()) else {
            return TapOutcome::Recorded { taps: 0 };
        };
        let span_ms = last.duration_since(*first).as_secs_f64() * 1000.0;
        let mean_ms = span_ms / (self.taps.len() - 1) as f64;
        if mean_ms <= 0.0 {
            return TapOutcome::Rejected(f64::INFINITY);
        }
        let bpm = (60_000.0 / mean_ms).round();
        if self.config.accepts(bpm) {
            self.bpm = Some(bpm);
            log::debug!("Tap tempo: {} BPM", bpm);
            TapOutcome::Bpm(bpm)
        } else {
            log::debug!("Tap tempo {} BPM out of range, ignored", bpm);
            TapOutcome::Rejected(bpm)
        }
    }

    /// Clear the tap buffer if the last tap is older than the reset time
    ///
    /// Returns true when taps were discarded.
    pub fn expire(&mut self, now: Instant) -> bool {
        match self.taps.back() {
            Some(last) if now.saturating_duration_since(*last) > self.config.reset_after() => {
                self.taps.clear();
                true
            }
            _ => false,
        }
    }

    /// Set the tempo directly (typed BPM)
    pub fn set_bpm(&mut self, bpm: f64) -> Result<f64, AnalysisError> {
        if !self.config.accepts(bpm) {
            return Err(AnalysisError::BpmOutOfRange(bpm));
        }
        self.bpm = Some(bpm);
        Ok(bpm)
    }

    pub fn bpm(&self) -> Option<f64> {
        self.bpm
    }

    pub fn tap_count(&self) -> usize {
        self.taps.len()
    }

    pub fn config(&self) -> &TapTempoConfig {
        &self.config
    }
}

impl Default for TapTempo {
    fn default() -> Self {
        Self::new(TapTempoConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taps_at(tempo: &mut TapTempo, start: Instant, interval_ms: u64, count: u64) -> TapOutcome {
        let mut outcome = TapOutcome::Recorded { taps: 0 };
        for i in 0..count {
            outcome = tempo.tap(start + Duration::from_millis(i * interval_ms));
        }
        outcome
    }

    #[test]
    fn test_four_taps_500ms_is_120() {
        let mut tempo = TapTempo::default();
        let outcome = taps_at(&mut tempo, Instant::now(), 500, 4);
        assert_eq!(outcome, TapOutcome::Bpm(120.0));
        assert_eq!(tempo.bpm(), Some(120.0));
    }

    #[test]
    fn test_fewer_taps_do_not_publish() {
        let mut tempo = TapTempo::default();
        let outcome = taps_at(&mut tempo, Instant::now(), 500, 3);
        assert_eq!(outcome, TapOutcome::Recorded { taps: 3 });
        assert_eq!(tempo.bpm(), None);
    }

    #[test]
    fn test_constant_interval_within_one_bpm() {
        for interval in [240u64, 333, 428, 500, 612, 750, 1000, 1400] {
            let mut tempo = TapTempo::default();
            taps_at(&mut tempo, Instant::now(), interval, 6);
            let expected = (60_000.0 / interval as f64).round();
            let bpm = tempo.bpm().unwrap();
            assert!((bpm - expected).abs() <= 1.0, "{}ms -> {}", interval, bpm);
        }
    }

    #[test]
    fn test_out_of_range_keeps_previous() {
        let mut tempo = TapTempo::default();
        let start = Instant::now();
        taps_at(&mut tempo, start, 500, 4);

        // 100 ms taps = 600 BPM, rejected
        let later = start + Duration::from_secs(10);
        let outcome = taps_at(&mut tempo, later, 100, 4);
        assert_eq!(outcome, TapOutcome::Rejected(600.0));
        assert_eq!(tempo.bpm(), Some(120.0));
    }

    #[test]
    fn test_pause_resets_session() {
        let mut tempo = TapTempo::default();
        let start = Instant::now();
        taps_at(&mut tempo, start, 500, 3);
        assert_eq!(tempo.tap_count(), 3);

        let outcome = tempo.tap(start + Duration::from_millis(1000 + 2500));
        assert_eq!(outcome, TapOutcome::Recorded { taps: 1 });

        assert!(!tempo.expire(start + Duration::from_millis(4000)));
        assert!(tempo.expire(start + Duration::from_millis(7000)));
        assert_eq!(tempo.tap_count(), 0);
    }

    #[test]
    fn test_set_bpm_range() {
        let mut tempo = TapTempo::default();
        assert_eq!(tempo.set_bpm(128.0), Ok(128.0));
        assert_eq!(tempo.set_bpm(300.0), Err(AnalysisError::BpmOutOfRange(300.0)));
        assert_eq!(tempo.bpm(), Some(128.0));
    }
}
