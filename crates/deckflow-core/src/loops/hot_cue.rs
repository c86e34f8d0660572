//! Hot cue slots for one deck
//!
//! Slots are numbered 1..=8. An empty slot is marked by the first press;
//! a set slot jumps.

use crate::error::{EngineError, EngineResult};

pub const HOT_CUE_SLOTS: usize = 8;

/// What a hot cue press did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HotCueAction {
    /// Slot was set; playback should move here (seconds)
    Jumped(f64),
    /// Slot was empty and now holds this position (seconds)
    Marked(f64),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HotCues {
    slots: [Option<f64>; HOT_CUE_SLOTS],
}

impl HotCues {
    pub fn new() -> Self {
        Self::default()
    }

    fn index(slot: u8) -> EngineResult<usize> {
        match slot as usize {
            s @ 1..=HOT_CUE_SLOTS => Ok(s - 1),
            _ => Err(EngineError::InvalidArgument(format!(
                "hot cue slot {} (expected 1-{})",
                slot, HOT_CUE_SLOTS
            ))),
        }
    }

    pub fn get(&self, slot: u8) -> Option<f64> {
        Self::index(slot).ok().and_then(|i| self.slots[i])
    }

    /// Jump to a set slot, or mark `position` into an empty one
    pub fn press(&mut self, slot: u8, position: f64) -> EngineResult<HotCueAction> {
        let i = Self::index(slot)?;
        match self.slots[i] {
            Some(time) => Ok(HotCueAction::Jumped(time)),
            None => {
                self.mark(slot, position)?;
                Ok(HotCueAction::Marked(position))
            }
        }
    }

    /// Store `position` in a slot, overwriting any previous cue
    pub fn mark(&mut self, slot: u8, position: f64) -> EngineResult<()> {
        let i = Self::index(slot)?;
        if !position.is_finite() || position < 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "hot cue position {}",
                position
            )));
        }
        self.slots[i] = Some(position);
        Ok(())
    }

    /// Clear a slot; returns the cue it held
    pub fn delete(&mut self, slot: u8) -> EngineResult<Option<f64>> {
        let i = Self::index(slot)?;
        Ok(self.slots[i].take())
    }

    pub fn clear(&mut self) {
        self.slots = [None; HOT_CUE_SLOTS];
    }

    /// `(slot, seconds)` for every set slot, ascending by slot
    pub fn iter(&self) -> impl Iterator<Item = (u8, f64)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, cue)| cue.map(|t| (i as u8 + 1, t)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_press_marks_then_jumps() {
        let mut cues = HotCues::new();
        assert_eq!(cues.press(3, 12.5).unwrap(), HotCueAction::Marked(12.5));
        assert_eq!(cues.press(3, 40.0).unwrap(), HotCueAction::Jumped(12.5));
        assert_eq!(cues.get(3), Some(12.5));
    }

    #[test]
    fn test_mark_overwrites_and_delete_clears() {
        let mut cues = HotCues::new();
        cues.mark(1, 1.0).unwrap();
        cues.mark(1, 2.0).unwrap();
        assert_eq!(cues.get(1), Some(2.0));
        assert_eq!(cues.delete(1).unwrap(), Some(2.0));
        assert_eq!(cues.get(1), None);
        assert_eq!(cues.delete(1).unwrap(), None);
    }

    #[test]
    fn test_slot_bounds() {
        let mut cues = HotCues::new();
        assert!(cues.press(0, 1.0).is_err());
        assert!(cues.press(9, 1.0).is_err());
        assert!(cues.mark(8, 1.0).is_ok());
        assert!(cues.mark(2, f64::NAN).is_err());
        assert_eq!(cues.get(2), None);
    }

    #[test]
    fn test_iter_lists_set_slots() {
        let mut cues = HotCues::new();
        cues.mark(5, 50.0).unwrap();
        cues.mark(2, 20.0).unwrap();
        let set: Vec<_> = cues.iter().collect();
        assert_eq!(set, vec![(2, 20.0), (5, 50.0)]);
        cues.clear();
        assert_eq!(cues.iter().count(), 0);
    }
}
