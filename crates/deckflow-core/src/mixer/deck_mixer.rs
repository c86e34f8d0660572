//! Deck mixer: fader volumes × crossfader attenuation, pitch and tempo sync
//!
//! The effective gain of a deck is always recomputed from both inputs and
//! written to the deck's gain parameter; the render side ramps to it.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::crossfader::{Crossfader, CrossfaderZone, DeckMode};
use crate::error::{EngineError, EngineResult};
use crate::graph::GraphParams;
use crate::types::{DeckId, NUM_DECKS};

pub struct DeckMixer {
    params: Arc<GraphParams>,
    crossfader: Crossfader,
    mode: DeckMode,
    volumes: [f32; NUM_DECKS],
    /// Pitch fader per deck (percent)
    pitch: [f32; NUM_DECKS],
    pitch_range: f32,
}

fn finite(value: f32, what: &str) -> EngineResult<f32> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidArgument(format!("{} must be finite", what)))
    }
}

impl DeckMixer {
    pub fn new(params: Arc<GraphParams>, mode: DeckMode, default_volume: f32, pitch_range: f32) -> Self {
        let mixer = Self {
            params,
            crossfader: Crossfader::new(),
            mode,
            volumes: [default_volume.clamp(0.0, 1.0); NUM_DECKS],
            pitch: [0.0; NUM_DECKS],
            pitch_range: pitch_range.abs(),
        };
        mixer.apply_all();
        mixer
    }

    /// Effective gain of a deck: fader volume × its side's attenuation
    pub fn effective_gain(&self, deck: DeckId) -> f32 {
        let attenuation = self
            .mode
            .side(deck)
            .map_or(1.0, |side| self.crossfader.attenuation(side));
        self.volumes[deck.index()] * attenuation
    }

    fn apply(&self, deck: DeckId) {
        self.params
            .deck(deck)
            .gain
            .store(self.effective_gain(deck), Ordering::Relaxed);
    }

    fn apply_all(&self) {
        DeckId::ALL.iter().for_each(|d| self.apply(*d));
    }

    /// Move the crossfader (0..100, clamped)
    pub fn set_crossfader(&mut self, value: f32) -> EngineResult<f32> {
        let value = self.crossfader.set(finite(value, "crossfader")?);
        self.apply_all();
        Ok(value)
    }

    /// Set a deck's fader volume (0..1, clamped)
    pub fn set_deck_volume(&mut self, deck: DeckId, value: f32) -> EngineResult<f32> {
        let value = finite(value, "volume")?.clamp(0.0, 1.0);
        self.volumes[deck.index()] = value;
        self.apply(deck);
        Ok(value)
    }

    pub fn set_mode(&mut self, mode: DeckMode) {
        self.mode = mode;
        self.apply_all();
    }

    /// Give `target` the playback rate of `source` (tempo only, not phase)
    pub fn sync_deck(&mut self, source: DeckId, target: DeckId) -> f32 {
        let rate = self.params.deck(source).rate();
        self.params.deck(target).rate.store(rate, Ordering::Relaxed);
        self.pitch[target.index()] = (rate - 1.0) * 100.0;
        log::debug!("Synced deck {} to deck {} (rate {:.4})", target, source, rate);
        rate
    }

    /// Set a deck's pitch in percent; returns the resulting playback rate
    pub fn set_pitch(&mut self, deck: DeckId, percent: f32) -> EngineResult<f32> {
        let percent = finite(percent, "pitch")?.clamp(-self.pitch_range, self.pitch_range);
        self.pitch[deck.index()] = percent;
        let rate = 1.0 + percent / 100.0;
        self.params.deck(deck).rate.store(rate, Ordering::Relaxed);
        Ok(rate)
    }

    pub fn rate(&self, deck: DeckId) -> f32 {
        self.params.deck(deck).rate()
    }

    pub fn pitch(&self, deck: DeckId) -> f32 {
        self.pitch[deck.index()]
    }

    pub fn volume(&self, deck: DeckId) -> f32 {
        self.volumes[deck.index()]
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader.value()
    }

    pub fn crossfader_zone(&self) -> CrossfaderZone {
        self.crossfader.zone()
    }

    pub fn mode(&self) -> DeckMode {
        self.mode
    }
}
