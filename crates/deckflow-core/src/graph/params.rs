//! Lock-free parameter stores shared between control and render contexts
//!
//! The control context writes node parameters with relaxed stores; the render
//! thread reads them once per block. Scalars are last-write-wins, no locks
//! span both contexts. Gains are smoothed on the render side with
//! [`LinearRamp`] so jumps in a stored value never click.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use atomic_float::AtomicF32;

use super::eq::EQ_BAND_COUNT;
use super::mixer_chain::MixerKnob;
use crate::effect::EffectParams;
use crate::types::{DeckId, NUM_DECKS};

/// Per-deck node parameters (3-band EQ, effective gain, playback rate)
pub struct DeckParams {
    pub eq_low_db: AtomicF32,
    pub eq_mid_db: AtomicF32,
    pub eq_high_db: AtomicF32,
    /// Effective gain (deck volume × crossfader attenuation)
    pub gain: AtomicF32,
    /// Playback rate (1.0 = original tempo)
    pub rate: AtomicF32,
    /// Whether the deck's source node is attached to the graph
    pub attached: AtomicBool,
}

impl DeckParams {
    fn new() -> Self {
        Self {
            eq_low_db: AtomicF32::new(0.0),
            eq_mid_db: AtomicF32::new(0.0),
            eq_high_db: AtomicF32::new(0.0),
            gain: AtomicF32::new(1.0),
            rate: AtomicF32::new(1.0),
            attached: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn rate(&self) -> f32 {
        self.rate.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Relaxed)
    }
}

/// Post-mix chain node parameters, already mapped from knob values
pub struct MixerParams {
    pub bass_db: AtomicF32,
    pub mid_db: AtomicF32,
    pub treble_db: AtomicF32,
    /// Low-pass cutoff derived from the color knob
    pub color_hz: AtomicF32,
    pub presence_db: AtomicF32,
    /// Linear master amplitude derived from the gain knob
    pub master_gain: AtomicF32,
}

impl MixerParams {
    fn new() -> Self {
        Self {
            bass_db: AtomicF32::new(MixerKnob::Bass.neutral_node_value()),
            mid_db: AtomicF32::new(MixerKnob::Mid.neutral_node_value()),
            treble_db: AtomicF32::new(MixerKnob::Treble.neutral_node_value()),
            color_hz: AtomicF32::new(MixerKnob::Color.neutral_node_value()),
            presence_db: AtomicF32::new(MixerKnob::Presence.neutral_node_value()),
            master_gain: AtomicF32::new(MixerKnob::Gain.neutral_node_value()),
        }
    }

    /// Store a knob's node value (already clamped and mapped)
    pub fn store(&self, knob: MixerKnob, node_value: f32) {
        let slot = match knob {
            MixerKnob::Gain => &self.master_gain,
            MixerKnob::Bass => &self.bass_db,
            MixerKnob::Mid => &self.mid_db,
            MixerKnob::Treble => &self.treble_db,
            MixerKnob::Color => &self.color_hz,
            MixerKnob::Presence => &self.presence_db,
        };
        slot.store(node_value, Ordering::Relaxed);
    }
}

/// Output level meter written by the render thread
pub struct VuLevels {
    pub left: AtomicF32,
    pub right: AtomicF32,
}

impl VuLevels {
    fn new() -> Self {
        Self {
            left: AtomicF32::new(0.0),
            right: AtomicF32::new(0.0),
        }
    }

    pub fn levels(&self) -> (f32, f32) {
        (
            self.left.load(Ordering::Relaxed),
            self.right.load(Ordering::Relaxed),
        )
    }
}

/// The complete node-parameter set of one graph instance
pub struct GraphParams {
    pub eq_bands: [AtomicF32; EQ_BAND_COUNT],
    pub mixer: MixerParams,
    pub decks: [DeckParams; NUM_DECKS],
    pub effects: EffectParams,
    pub vu: VuLevels,
    /// Slice voices currently sounding
    pub active_voices: AtomicUsize,
    /// Whether the render thread feeds the analysis tap and meters
    pub analysis_enabled: AtomicBool,
}

impl GraphParams {
    pub fn new() -> Self {
        Self {
            eq_bands: std::array::from_fn(|_| AtomicF32::new(0.0)),
            mixer: MixerParams::new(),
            decks: std::array::from_fn(|_| DeckParams::new()),
            effects: EffectParams::new(),
            vu: VuLevels::new(),
            active_voices: AtomicUsize::new(0),
            analysis_enabled: AtomicBool::new(true),
        }
    }

    #[inline]
    pub fn deck(&self, deck: DeckId) -> &DeckParams {
        &self.decks[deck.index()]
    }

    #[inline]
    pub fn eq_band_db(&self, index: usize) -> f32 {
        self.eq_bands
            .get(index)
            .map(|b| b.load(Ordering::Relaxed))
            .unwrap_or(0.0)
    }

    #[inline]
    pub fn analysis_enabled(&self) -> bool {
        self.analysis_enabled.load(Ordering::Relaxed)
    }
}

impl Default for GraphParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Per-sample linear ramp toward a target value
///
/// Used for every gain stage on the render side: a new target is reached
/// over `ramp_len` samples instead of jumping.
#[derive(Debug, Clone)]
pub struct LinearRamp {
    current: f32,
    target: f32,
    step: f32,
    remaining: u32,
    ramp_len: u32,
}

impl LinearRamp {
    pub fn new(value: f32, ramp_len: u32) -> Self {
        Self {
            current: value,
            target: value,
            step: 0.0,
            remaining: 0,
            ramp_len: ramp_len.max(1),
        }
    }

    /// Ramp length for a duration at a sample rate
    pub fn with_duration(value: f32, seconds: f32, sample_rate: u32) -> Self {
        Self::new(value, (seconds * sample_rate as f32) as u32)
    }

    #[inline]
    pub fn set_target(&mut self, target: f32) {
        if target != self.target {
            self.target = target;
            self.remaining = self.ramp_len;
            self.step = (target - self.current) / self.ramp_len as f32;
        }
    }

    /// Jump to a value without ramping
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.remaining = 0;
        self.step = 0.0;
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining > 0 {
            self.remaining -= 1;
            self.current = if self.remaining == 0 {
                self.target
            } else {
                self.current + self.step
            };
        }
        self.current
    }

    #[inline]
    pub fn is_ramping(&self) -> bool {
        self.remaining > 0
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }
}
