//! Deck-level gain automation: crossfader, fader volumes, tempo sync

pub mod crossfader;
pub mod deck_mixer;

pub use crossfader::{
    left_attenuation, right_attenuation, Crossfader, CrossfaderSide, CrossfaderZone, DeckMode,
};
pub use deck_mixer::DeckMixer;
