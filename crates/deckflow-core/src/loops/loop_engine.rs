//! Per-deck loop state machine
//!
//! `Idle → InSet → Active ⇄ Idle`. Bounds are seconds on the track timeline.
//! Invalid transitions are rejected and leave the state untouched; a loop
//! never exists with `end <= start`.

use super::LoopError;

/// Active loop bounds (seconds), always `start < end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    pub fn new(start: f64, end: f64) -> Result<Self, LoopError> {
        if !(start.is_finite() && end.is_finite()) || start < 0.0 {
            return Err(LoopError::InvalidPosition);
        }
        if end <= start {
            return Err(LoopError::OutBeforeIn { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Frame bounds at a sample rate
    pub fn frames(&self, sample_rate: u32) -> (usize, usize) {
        let sr = sample_rate as f64;
        ((self.start * sr).round() as usize, (self.end * sr).round() as usize)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    /// Loop-in recorded, waiting for loop-out
    InSet { start: f64 },
    Active(LoopRegion),
}

#[derive(Debug, Clone, Default)]
pub struct LoopEngine {
    state: LoopState,
}

impl LoopEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, LoopState::Active(_))
    }

    pub fn region(&self) -> Option<LoopRegion> {
        match self.state {
            LoopState::Active(region) => Some(region),
            _ => None,
        }
    }

    /// Record the loop-in point
    ///
    /// While active, a new start before the end moves the loop start; a start
    /// at or after the end drops back to `InSet`.
    pub fn set_loop_in(&mut self, position: f64) -> Result<LoopState, LoopError> {
        if !position.is_finite() || position < 0.0 {
            return Err(LoopError::InvalidPosition);
        }
        self.state = match self.state {
            LoopState::Active(region) if position < region.end => LoopState::Active(LoopRegion {
                start: position,
                end: region.end,
            }),
            _ => LoopState::InSet { start: position },
        };
        Ok(self.state)
    }

    /// Record the loop-out point and activate the loop
    pub fn set_loop_out(&mut self, position: f64) -> Result<LoopRegion, LoopError> {
        let start = match self.state {
            LoopState::Idle => return Err(LoopError::NoLoopIn),
            LoopState::InSet { start } => start,
            LoopState::Active(region) => region.start,
        };
        let region = LoopRegion::new(start, position)?;
        self.state = LoopState::Active(region);
        Ok(region)
    }

    /// Beat-length loop from `position`, replacing any manual bounds
    pub fn set_auto_loop(&mut self, position: f64, beats: f64, bpm: Option<f64>) -> Result<LoopRegion, LoopError> {
        let bpm = bpm.filter(|b| b.is_finite() && *b > 0.0).ok_or(LoopError::BpmUnknown)?;
        if !(beats.is_finite() && beats > 0.0) {
            return Err(LoopError::InvalidBeats(beats));
        }
        let region = LoopRegion::new(position, position + beats * 60.0 / bpm)?;
        self.state = LoopState::Active(region);
        Ok(region)
    }

    /// Leave the loop and clear its bounds
    pub fn exit_loop(&mut self) {
        self.state = LoopState::Idle;
    }

    /// Position to jump to if `position` has reached the loop end
    pub fn wrap_target(&self, position: f64) -> Option<f64> {
        match self.state {
            LoopState::Active(region) if position >= region.end => Some(region.start),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_then_out_activates() {
        let mut engine = LoopEngine::new();
        assert_eq!(engine.set_loop_in(10.0), Ok(LoopState::InSet { start: 10.0 }));
        let region = engine.set_loop_out(14.0).unwrap();
        assert_eq!(region, LoopRegion { start: 10.0, end: 14.0 });
        assert!(engine.is_active());
    }

    #[test]
    fn test_out_without_in_is_rejected() {
        let mut engine = LoopEngine::new();
        assert_eq!(engine.set_loop_out(5.0), Err(LoopError::NoLoopIn));
        assert_eq!(engine.state(), LoopState::Idle);
    }

    #[test]
    fn test_inverted_out_is_rejected_without_state_change() {
        let mut engine = LoopEngine::new();
        engine.set_loop_in(10.0).unwrap();
        assert!(matches!(engine.set_loop_out(8.0), Err(LoopError::OutBeforeIn { .. })));
        assert!(matches!(engine.set_loop_out(10.0), Err(LoopError::OutBeforeIn { .. })));
        assert_eq!(engine.state(), LoopState::InSet { start: 10.0 });
    }

    #[test]
    fn test_loop_in_while_active() {
        let mut engine = LoopEngine::new();
        engine.set_loop_in(10.0).unwrap();
        engine.set_loop_out(14.0).unwrap();

        engine.set_loop_in(12.0).unwrap();
        assert_eq!(engine.region(), Some(LoopRegion { start: 12.0, end: 14.0 }));

        engine.set_loop_in(15.0).unwrap();
        assert_eq!(engine.state(), LoopState::InSet { start: 15.0 });
    }

    #[test]
    fn test_auto_loop_at_120() {
        let mut engine = LoopEngine::new();
        engine.set_loop_in(3.0).unwrap();
        let region = engine.set_auto_loop(20.0, 4.0, Some(120.0)).unwrap();
        assert_eq!(region, LoopRegion { start: 20.0, end: 22.0 });
    }

    #[test]
    fn test_auto_loop_length_is_exact() {
        let mut engine = LoopEngine::new();
        for bpm in [87.0, 120.0, 128.0, 174.0] {
            for beats in [0.25, 1.0, 4.0, 16.0] {
                let region = engine.set_auto_loop(33.3, beats, Some(bpm)).unwrap();
                assert_eq!(region.end - region.start, (33.3 + beats * 60.0 / bpm) - 33.3);
            }
        }
    }

    #[test]
    fn test_auto_loop_needs_bpm() {
        let mut engine = LoopEngine::new();
        engine.set_loop_in(1.0).unwrap();
        assert_eq!(engine.set_auto_loop(5.0, 4.0, None), Err(LoopError::BpmUnknown));
        assert_eq!(engine.set_auto_loop(5.0, 4.0, Some(0.0)), Err(LoopError::BpmUnknown));
        assert_eq!(engine.state(), LoopState::InSet { start: 1.0 });
    }

    #[test]
    fn test_exit_and_wrap() {
        let mut engine = LoopEngine::new();
        engine.set_auto_loop(1.0, 2.0, Some(120.0)).unwrap();
        assert_eq!(engine.wrap_target(1.5), None);
        assert_eq!(engine.wrap_target(2.0), Some(1.0));
        engine.exit_loop();
        assert_eq!(engine.region(), None);
        assert_eq!(engine.wrap_target(5.0), None);
    }
}
