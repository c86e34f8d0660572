//! Signal graph: sources, EQ, mixer chain, effect inserts, destination
//!
//! Split the same way as the rest of the engine:
//!
//! - [`SignalGraph`] (control context) owns the routing description and the
//!   knob values, validates and clamps every write, and stores mapped node
//!   parameters into the shared [`GraphParams`].
//! - [`GraphProcessor`] (render context) executes the fixed stage order and
//!   reads those parameters once per block.
//!
//! Steady-state parameter changes never touch topology. The only routing
//! change after a source is attached is an effect insert toggle, and that is
//! rendered as a short crossfade.

pub mod biquad;
pub mod eq;
pub mod mixer_chain;
pub mod params;
pub mod processor;
pub mod tap;
pub mod topology;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::effect::EffectKind;
use crate::error::{EngineError, EngineResult};
use crate::types::{DeckId, NUM_DECKS};

pub use biquad::FilterType;
pub use eq::{DeckEqBand, EQ_BAND_COUNT, EQ_BAND_FREQUENCIES, EQ_GAIN_RANGE_DB};
pub use mixer_chain::{color_to_cutoff, MixerKnob, MixerState, COLOR_MAX_HZ};
pub use params::GraphParams;
pub use processor::GraphProcessor;
pub use tap::{analysis_tap, AnalysisTap, TapReader, TAP_CAPACITY};
pub use topology::{NodeId, SourceId, StageKind, Topology};

/// Handle to an attached source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle {
    pub source: SourceId,
    pub node: NodeId,
}

/// Control-side owner of the graph
pub struct SignalGraph {
    params: Arc<GraphParams>,
    topology: Topology,
    mixer: MixerState,
    eq_gains: [f32; EQ_BAND_COUNT],
    deck_eq: [[f32; 3]; NUM_DECKS],
    backend_available: bool,
}

impl SignalGraph {
    pub fn new(params: Arc<GraphParams>, backend_available: bool) -> Self {
        Self {
            params,
            topology: Topology::new(),
            mixer: MixerState::default(),
            eq_gains: [0.0; EQ_BAND_COUNT],
            deck_eq: [[0.0; 3]; NUM_DECKS],
            backend_available,
        }
    }

    /// Connect a source through its strip into the master chain
    ///
    /// Idempotent per source. Without an audio backend the routing is still
    /// recorded, so every later command keeps updating state.
    pub fn attach_source(&mut self, source: SourceId) -> NodeHandle {
        let already = self.topology.is_attached(source);
        let node = self.topology.attach_source(source);
        if !already {
            if let SourceId::Deck(deck) = source {
                self.params.deck(deck).attached.store(true, Ordering::Relaxed);
            }
            if self.backend_available {
                log::debug!("Attached {:?} to the signal graph", source);
            } else {
                log::warn!(
                    "Audio backend unavailable: {:?} attached without audible output",
                    source
                );
            }
        }
        NodeHandle { source, node }
    }

    /// Set a graphic EQ band gain; out-of-range indices are ignored
    ///
    /// Returns the applied (clamped) gain, or `None` for a bad index.
    pub fn set_eq_band(&mut self, index: usize, gain_db: f32) -> Option<f32> {
        let slot = self.eq_gains.get_mut(index)?;
        let (min, max) = EQ_GAIN_RANGE_DB;
        let gain = if gain_db.is_nan() { 0.0 } else { gain_db.clamp(min, max) };
        *slot = gain;
        self.params.eq_bands[index].store(gain, Ordering::Relaxed);
        Some(gain)
    }

    /// Set a mixer knob; returns the clamped knob value
    pub fn set_mixer_knob(&mut self, knob: MixerKnob, value: f32) -> f32 {
        let value = self.mixer.set(knob, value);
        self.params.mixer.store(knob, knob.node_value(value));
        value
    }

    /// Set a mixer knob by name ("gain", "bass", "color", ...)
    pub fn set_mixer_knob_by_name(&mut self, name: &str, value: f32) -> EngineResult<f32> {
        let knob = MixerKnob::from_name(name)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown mixer knob '{}'", name)))?;
        Ok(self.set_mixer_knob(knob, value))
    }

    /// Set one band of a deck's 3-band EQ; returns the clamped gain
    pub fn set_deck_eq(&mut self, deck: DeckId, band: DeckEqBand, gain_db: f32) -> f32 {
        let (min, max) = EQ_GAIN_RANGE_DB;
        let gain = if gain_db.is_nan() { 0.0 } else { gain_db.clamp(min, max) };
        let params = self.params.deck(deck);
        let (slot, atomic) = match band {
            DeckEqBand::Low => (0, &params.eq_low_db),
            DeckEqBand::Mid => (1, &params.eq_mid_db),
            DeckEqBand::High => (2, &params.eq_high_db),
        };
        self.deck_eq[deck.index()][slot] = gain;
        atomic.store(gain, Ordering::Relaxed);
        gain
    }

    /// Route an effect insert in or out of the master chain
    pub fn set_effect_connected(&mut self, kind: EffectKind, on: bool) {
        self.topology.set_effect_connected(kind, on);
    }

    /// Return the six knobs and the graphic EQ to neutral
    pub fn reset_mixer(&mut self) {
        for knob in MixerKnob::ALL {
            self.mixer.set(knob, 0.0);
            self.params.mixer.store(knob, knob.neutral_node_value());
        }
        for band in 0..EQ_BAND_COUNT {
            self.set_eq_band(band, 0.0);
        }
        log::debug!("Mixer reset to neutral");
    }

    pub fn mixer_state(&self) -> &MixerState {
        &self.mixer
    }

    pub fn eq_gains(&self) -> &[f32; EQ_BAND_COUNT] {
        &self.eq_gains
    }

    /// Low/mid/high gains of a deck's EQ
    pub fn deck_eq(&self, deck: DeckId) -> [f32; 3] {
        self.deck_eq[deck.index()]
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn params(&self) -> &Arc<GraphParams> {
        &self.params
    }

    /// Whether the graph renders without an audio backend
    pub fn is_silent(&self) -> bool {
        !self.backend_available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph() -> SignalGraph {
        SignalGraph::new(Arc::new(GraphParams::new()), true)
    }

    #[test]
    fn test_attach_marks_deck_attached() {
        let mut graph = graph();
        let handle = graph.attach_source(SourceId::Deck(DeckId::C));
        assert!(graph.params().deck(DeckId::C).is_attached());
        assert_eq!(graph.attach_source(SourceId::Deck(DeckId::C)), handle);
    }

    #[test]
    fn test_eq_band_bounds() {
        let mut graph = graph();
        assert_eq!(graph.set_eq_band(10, 6.0), None);
        assert_eq!(graph.set_eq_band(3, 30.0), Some(12.0));
        assert_eq!(graph.params().eq_band_db(3), 12.0);
        assert_eq!(graph.eq_gains()[3], 12.0);
    }

    #[test]
    fn test_mixer_knob_mapping() {
        let mut graph = graph();
        assert_eq!(graph.set_mixer_knob(MixerKnob::Color, -100.0), -100.0);
        assert_eq!(graph.params().mixer.color_hz.load(Ordering::Relaxed), 500.0);

        graph.set_mixer_knob(MixerKnob::Gain, 20.0);
        let linear = graph.params().mixer.master_gain.load(Ordering::Relaxed);
        assert!((linear - 10f32.powf(12.0 / 20.0)).abs() < 1e-4);

        assert!(graph.set_mixer_knob_by_name("loudness", 1.0).is_err());
    }

    #[test]
    fn test_reset_mixer_returns_to_neutral() {
        let mut graph = graph();
        graph.set_mixer_knob(MixerKnob::Bass, 6.0);
        graph.set_mixer_knob(MixerKnob::Color, -100.0);
        graph.set_eq_band(0, -9.0);
        graph.reset_mixer();
        assert_eq!(*graph.mixer_state(), MixerState::default());
        assert!(graph.eq_gains().iter().all(|g| *g == 0.0));
        assert_eq!(graph.params().mixer.color_hz.load(Ordering::Relaxed), COLOR_MAX_HZ);
    }

    #[test]
    fn test_deck_eq_clamps() {
        let mut graph = graph();
        assert_eq!(graph.set_deck_eq(DeckId::A, DeckEqBand::High, -40.0), -12.0);
        assert_eq!(graph.deck_eq(DeckId::A), [0.0, 0.0, -12.0]);
    }
}
