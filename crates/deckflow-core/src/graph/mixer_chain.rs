//! Shared post-mix chain: bass → mid → treble → color → presence → master gain
//!
//! Knob values live control-side in [`MixerState`]; the render-side
//! [`MixerChain`] only sees the mapped node parameters (dB gains, a cutoff
//! frequency and a linear master amplitude).

use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use super::biquad::{FilterStage, FilterType};
use super::params::{LinearRamp, MixerParams};
use crate::types::{db_to_linear, StereoBuffer};

pub const BASS_HZ: f32 = 100.0;
pub const MID_HZ: f32 = 1000.0;
pub const MID_Q: f32 = 1.0;
pub const TREBLE_HZ: f32 = 8000.0;
pub const PRESENCE_HZ: f32 = 5000.0;
pub const COLOR_Q: f32 = 0.7;
pub const COLOR_MIN_HZ: f32 = 500.0;
pub const COLOR_MAX_HZ: f32 = 20000.0;

/// The six mixing-board knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MixerKnob {
    Gain,
    Bass,
    Mid,
    Treble,
    Color,
    Presence,
}

impl MixerKnob {
    pub const ALL: [MixerKnob; 6] = [
        MixerKnob::Gain,
        MixerKnob::Bass,
        MixerKnob::Mid,
        MixerKnob::Treble,
        MixerKnob::Color,
        MixerKnob::Presence,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            MixerKnob::Gain => "gain",
            MixerKnob::Bass => "bass",
            MixerKnob::Mid => "mid",
            MixerKnob::Treble => "treble",
            MixerKnob::Color => "color",
            MixerKnob::Presence => "presence",
        }
    }

    /// Valid knob range
    pub fn range(self) -> (f32, f32) {
        match self {
            MixerKnob::Color => (-100.0, 100.0),
            _ => (-12.0, 12.0),
        }
    }

    pub fn clamp(self, value: f32) -> f32 {
        let (min, max) = self.range();
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(min, max)
    }

    /// Map a clamped knob value to the node parameter it drives
    pub fn node_value(self, value: f32) -> f32 {
        match self {
            MixerKnob::Gain => db_to_linear(value),
            MixerKnob::Color => color_to_cutoff(value),
            _ => value,
        }
    }

    /// Node parameter of an untouched board. The color low-pass starts
    /// fully open rather than at the centre of its sweep.
    pub fn neutral_node_value(self) -> f32 {
        match self {
            MixerKnob::Gain => 1.0,
            MixerKnob::Color => COLOR_MAX_HZ,
            _ => 0.0,
        }
    }
}

/// Color knob (-100..100) to low-pass cutoff (500 Hz .. 20 kHz), linear
pub fn color_to_cutoff(value: f32) -> f32 {
    let t = (value.clamp(-100.0, 100.0) + 100.0) / 200.0;
    COLOR_MIN_HZ + t * (COLOR_MAX_HZ - COLOR_MIN_HZ)
}

/// Knob positions of the mixing board
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MixerState {
    pub gain: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub color: f32,
    pub presence: f32,
}

impl MixerState {
    pub fn get(&self, knob: MixerKnob) -> f32 {
        match knob {
            MixerKnob::Gain => self.gain,
            MixerKnob::Bass => self.bass,
            MixerKnob::Mid => self.mid,
            MixerKnob::Treble => self.treble,
            MixerKnob::Color => self.color,
            MixerKnob::Presence => self.presence,
        }
    }

    /// Store a knob value, clamped; returns the applied value
    pub fn set(&mut self, knob: MixerKnob, value: f32) -> f32 {
        let value = knob.clamp(value);
        let slot = match knob {
            MixerKnob::Gain => &mut self.gain,
            MixerKnob::Bass => &mut self.bass,
            MixerKnob::Mid => &mut self.mid,
            MixerKnob::Treble => &mut self.treble,
            MixerKnob::Color => &mut self.color,
            MixerKnob::Presence => &mut self.presence,
        };
        *slot = value;
        value
    }
}

/// Render-side filters of the post-mix chain
pub struct MixerChain {
    bass: FilterStage,
    mid: FilterStage,
    treble: FilterStage,
    color: FilterStage,
    presence: FilterStage,
    master: LinearRamp,
}

impl MixerChain {
    pub fn new(sample_rate: u32, ramp_seconds: f32) -> Self {
        let sr = sample_rate as f32;
        Self {
            bass: FilterStage::new(FilterType::Lowshelf, BASS_HZ, 1.0, 0.0, sr),
            mid: FilterStage::new(FilterType::Peaking, MID_HZ, MID_Q, 0.0, sr),
            treble: FilterStage::new(FilterType::Highshelf, TREBLE_HZ, 1.0, 0.0, sr),
            color: FilterStage::new(FilterType::Lowpass, COLOR_MAX_HZ, COLOR_Q, 0.0, sr),
            presence: FilterStage::new(FilterType::Highshelf, PRESENCE_HZ, 1.0, 0.0, sr),
            master: LinearRamp::with_duration(1.0, ramp_seconds, sample_rate),
        }
    }

    pub fn process(&mut self, params: &MixerParams, buffer: &mut StereoBuffer) {
        self.bass.set_gain_db(params.bass_db.load(Ordering::Relaxed));
        self.mid.set_gain_db(params.mid_db.load(Ordering::Relaxed));
        self.treble.set_gain_db(params.treble_db.load(Ordering::Relaxed));
        self.color.update(
            FilterType::Lowpass,
            params.color_hz.load(Ordering::Relaxed),
            COLOR_Q,
            0.0,
        );
        self.presence.set_gain_db(params.presence_db.load(Ordering::Relaxed));
        self.master.set_target(params.master_gain.load(Ordering::Relaxed));

        for sample in buffer.iter_mut() {
            let (l, r) = self.bass.process(sample.left, sample.right);
            let (l, r) = self.mid.process(l, r);
            let (l, r) = self.treble.process(l, r);
            let (l, r) = self.color.process(l, r);
            let (l, r) = self.presence.process(l, r);
            let g = self.master.next();
            sample.left = l * g;
            sample.right = r * g;
        }
    }

    pub fn reset(&mut self) {
        self.bass.reset();
        self.mid.reset();
        self.treble.reset();
        self.color.reset();
        self.presence.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::params::GraphParams;
    use crate::types::StereoSample;

    #[test]
    fn test_color_mapping_is_linear() {
        assert_eq!(color_to_cutoff(-100.0), 500.0);
        assert_eq!(color_to_cutoff(100.0), 20000.0);
        assert_eq!(color_to_cutoff(0.0), 10250.0);
        assert_eq!(color_to_cutoff(500.0), 20000.0);
    }

    #[test]
    fn test_knob_clamping() {
        let mut state = MixerState::default();
        assert_eq!(state.set(MixerKnob::Bass, 40.0), 12.0);
        assert_eq!(state.set(MixerKnob::Color, -250.0), -100.0);
        assert_eq!(state.set(MixerKnob::Mid, f32::NAN), 0.0);
        assert_eq!(state.get(MixerKnob::Bass), 12.0);
    }

    #[test]
    fn test_gain_is_converted_to_linear() {
        assert!((MixerKnob::Gain.node_value(-6.0) - 0.501).abs() < 0.001);
        assert_eq!(MixerKnob::Treble.node_value(-6.0), -6.0);
    }

    #[test]
    fn test_master_gain_ramps_to_target() {
        let params = GraphParams::new();
        params.mixer.store(MixerKnob::Gain, 0.5);
        let mut chain = MixerChain::new(48000, 0.005);
        let mut buf = StereoBuffer::silence(1024);
        for s in buf.iter_mut() {
            *s = StereoSample::mono(0.2);
        }
        chain.process(&params.mixer, &mut buf);
        // DC passes the filters; after the 240-sample ramp gain is 0.5
        let last = buf[1023];
        assert!((last.left - 0.1).abs() < 0.005, "got {}", last.left);
        assert!(buf[0].left > last.left);
    }

    fn sine_peak(chain: &mut MixerChain, params: &MixerParams, freq: f32) -> f32 {
        let mut buf = StereoBuffer::silence(4800);
        for (i, s) in buf.iter_mut().enumerate() {
            *s = StereoSample::mono((2.0 * std::f32::consts::PI * freq * i as f32 / 48000.0).sin());
        }
        chain.process(params, &mut buf);
        // Skip the filter transient
        buf.as_slice()[2400..].iter().map(|s| s.left.abs()).fold(0.0, f32::max)
    }

    #[test]
    fn test_neutral_board_passes_highs() {
        let params = GraphParams::new();
        assert_eq!(params.mixer.color_hz.load(Ordering::Relaxed), COLOR_MAX_HZ);
        let mut chain = MixerChain::new(48000, 0.005);
        let peak = sine_peak(&mut chain, &params.mixer, 16000.0);
        assert!(peak > 0.9, "16 kHz peak {}", peak);
    }

    #[test]
    fn test_color_knob_darkens_highs() {
        let params = GraphParams::new();
        params
            .mixer
            .store(MixerKnob::Color, MixerKnob::Color.node_value(-100.0));
        let mut chain = MixerChain::new(48000, 0.005);
        let peak = sine_peak(&mut chain, &params.mixer, 16000.0);
        assert!(peak < 0.05, "16 kHz peak {}", peak);
    }
}
