//! Read-only state for the visualization/telemetry collaborator
//!
//! Built by the poll context from control-side state and the render-side
//! atomics. Nothing here feeds back into the engine.

use crate::graph::{MixerState, EQ_BAND_COUNT};
use crate::mixer::{CrossfaderZone, DeckMode};
use crate::types::{DeckId, PlayState, NUM_DECKS};

/// Per-deck state
#[derive(Debug, Clone, PartialEq)]
pub struct DeckSnapshot {
    pub deck: DeckId,
    /// Track URL or name, if loaded
    pub track: Option<String>,
    pub state: PlayState,
    /// Playback position (seconds); lags the render thread by at most one block
    pub position: f64,
    pub duration: f64,
    /// Playback rate (1.0 = original tempo)
    pub rate: f32,
    /// Pitch fader (percent)
    pub pitch: f32,
    /// Displayed tempo: BPM × rate
    pub tempo: Option<f64>,
    /// Loop bounds as seen by the render thread
    pub loop_bounds: Option<(f64, f64)>,
    /// Beat grid timestamps (seconds), empty until analysed
    pub grid_beats: Vec<f64>,
    pub grid_offset: Option<f64>,
    /// Fader volume
    pub volume: f32,
    /// Volume × crossfader attenuation
    pub gain: f32,
    /// Low/mid/high dB
    pub eq: [f32; 3],
    /// Bit N set = hot cue N + 1 is set
    pub hot_cues_set: u8,
    pub slice_count: usize,
}

impl DeckSnapshot {
    pub fn loop_active(&self) -> bool {
        self.loop_bounds.is_some()
    }
}

/// Everything the telemetry side reads in one poll
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub bpm: Option<f64>,
    /// Taps recorded in the current tap session
    pub tap_count: usize,
    pub decks: [DeckSnapshot; NUM_DECKS],
    pub mixer: MixerState,
    pub eq_bands: [f32; EQ_BAND_COUNT],
    pub crossfader: f32,
    pub crossfader_zone: CrossfaderZone,
    pub deck_mode: DeckMode,
    /// Master RMS (left, right); zero in silent mode
    pub vu: (f32, f32),
    /// Latest frequency bins, byte-scaled
    pub spectrum: Vec<u8>,
    pub active_voices: usize,
    /// No audio backend; commands still update state
    pub silent: bool,
}

impl EngineSnapshot {
    pub fn deck(&self, deck: DeckId) -> &DeckSnapshot {
        &self.decks[deck.index()]
    }
}
