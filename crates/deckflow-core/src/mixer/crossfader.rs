//! Crossfader curve and deck grouping

use serde::{Deserialize, Serialize};

use crate::types::DeckId;

pub const CROSSFADER_MIN: f32 = 0.0;
pub const CROSSFADER_MAX: f32 = 100.0;
pub const CROSSFADER_CENTER: f32 = 50.0;

/// Telemetry zone boundaries
const ZONE_LEFT_BELOW: f32 = 45.0;
const ZONE_RIGHT_ABOVE: f32 = 55.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossfaderSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossfaderZone {
    Left,
    Center,
    Right,
}

/// How decks are grouped onto the crossfader sides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeckMode {
    /// A left, B right; C and D bypass the crossfader
    #[default]
    TwoDeck,
    /// A and C left, B and D right
    FourDeck,
}

impl DeckMode {
    /// Crossfader side of a deck, `None` if unaffected
    pub fn side(self, deck: DeckId) -> Option<CrossfaderSide> {
        match (self, deck) {
            (_, DeckId::A) => Some(CrossfaderSide::Left),
            (_, DeckId::B) => Some(CrossfaderSide::Right),
            (DeckMode::FourDeck, DeckId::C) => Some(CrossfaderSide::Left),
            (DeckMode::FourDeck, DeckId::D) => Some(CrossfaderSide::Right),
            (DeckMode::TwoDeck, _) => None,
        }
    }

    pub fn deck_count(self) -> usize {
        match self {
            DeckMode::TwoDeck => 2,
            DeckMode::FourDeck => 4,
        }
    }
}

/// Left-side attenuation: full up to the centre, linear down to 0 at 100
#[inline]
pub fn left_attenuation(value: f32) -> f32 {
    if value <= CROSSFADER_CENTER {
        1.0
    } else {
        (CROSSFADER_MAX - value) / CROSSFADER_CENTER
    }
}

/// Right-side attenuation: linear up from 0 at 0, full from the centre
#[inline]
pub fn right_attenuation(value: f32) -> f32 {
    if value >= CROSSFADER_CENTER {
        1.0
    } else {
        value / CROSSFADER_CENTER
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossfader {
    value: f32,
}

impl Crossfader {
    pub fn new() -> Self {
        Self {
            value: CROSSFADER_CENTER,
        }
    }

    /// Move the fader; the value is clamped to 0..100
    pub fn set(&mut self, value: f32) -> f32 {
        self.value = value.clamp(CROSSFADER_MIN, CROSSFADER_MAX);
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn attenuation(&self, side: CrossfaderSide) -> f32 {
        match side {
            CrossfaderSide::Left => left_attenuation(self.value),
            CrossfaderSide::Right => right_attenuation(self.value),
        }
    }

    pub fn zone(&self) -> CrossfaderZone {
        if self.value < ZONE_LEFT_BELOW {
            CrossfaderZone::Left
        } else if self.value > ZONE_RIGHT_ABOVE {
            CrossfaderZone::Right
        } else {
            CrossfaderZone::Center
        }
    }
}

impl Default for Crossfader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extremes_and_centre() {
        assert_eq!(left_attenuation(0.0), 1.0);
        assert_eq!(right_attenuation(0.0), 0.0);
        assert_eq!(left_attenuation(100.0), 0.0);
        assert_eq!(right_attenuation(100.0), 1.0);
        assert_eq!(left_attenuation(50.0), 1.0);
        assert_eq!(right_attenuation(50.0), 1.0);
    }

    #[test]
    fn test_curves_are_monotonic_and_continuous() {
        let mut prev_left = left_attenuation(0.0);
        let mut prev_right = right_attenuation(0.0);
        for step in 1..=1000 {
            let v = step as f32 * 0.1;
            let (l, r) = (left_attenuation(v), right_attenuation(v));
            assert!(l <= prev_left, "left rose at {}", v);
            assert!(r >= prev_right, "right fell at {}", v);
            assert!((l - prev_left).abs() < 0.0021 && (r - prev_right).abs() < 0.0021);
            prev_left = l;
            prev_right = r;
        }
    }

    #[test]
    fn test_deck_grouping() {
        assert_eq!(DeckMode::TwoDeck.side(DeckId::A), Some(CrossfaderSide::Left));
        assert_eq!(DeckMode::TwoDeck.side(DeckId::C), None);
        assert_eq!(DeckMode::FourDeck.side(DeckId::C), Some(CrossfaderSide::Left));
        assert_eq!(DeckMode::FourDeck.side(DeckId::D), Some(CrossfaderSide::Right));
    }

    #[test]
    fn test_zone_labels() {
        let mut fader = Crossfader::new();
        assert_eq!(fader.zone(), CrossfaderZone::Center);
        fader.set(44.9);
        assert_eq!(fader.zone(), CrossfaderZone::Left);
        fader.set(55.1);
        assert_eq!(fader.zone(), CrossfaderZone::Right);
        assert_eq!(fader.set(140.0), 100.0);
    }
}
