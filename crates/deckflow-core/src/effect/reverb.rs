//! Reverb effect: wet-mix stage with a Freeverb-style tail
//!
//! Eight damped comb filters in parallel feed four allpass diffusers per
//! channel; the right channel's delay lines are offset for stereo spread.

use crate::effect::{Effect, EffectInfo, EffectSlotParams, ParamInfo};
use crate::types::StereoBuffer;

pub const PARAM_MIX: usize = 0;
pub const PARAM_ROOM_SIZE: usize = 1;
pub const PARAM_DAMPING: usize = 2;

/// Comb delay lengths in samples at 44.1 kHz
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass delay lengths in samples at 44.1 kHz
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

/// Right-channel length offset
const STEREO_SPREAD: usize = 23;

const ALLPASS_FEEDBACK: f32 = 0.5;

/// Comb output scaling before diffusion
const COMB_GAIN: f32 = 0.2;

fn scaled_len(length: usize, sample_rate: u32) -> usize {
    ((length as f32 * sample_rate as f32 / 44100.0) as usize).max(1)
}

struct CombFilter {
    buffer: Vec<f32>,
    pos: usize,
    filter_state: f32,
}

impl CombFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
            filter_state: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.buffer[self.pos];
        // One-pole low-pass in the loop darkens the tail
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;
        self.buffer[self.pos] = input + self.filter_state * feedback;
        self.pos = (self.pos + 1) % self.buffer.len();
        output
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    buffer: Vec<f32>,
    pos: usize,
}

impl AllpassFilter {
    fn new(length: usize) -> Self {
        Self {
            buffer: vec![0.0; length],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.buffer[self.pos];
        self.buffer[self.pos] = input + buffered * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buffer.len();
        buffered - input
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
    }
}

/// One channel's comb bank and diffusers
struct Tank {
    combs: Vec<CombFilter>,
    allpasses: Vec<AllpassFilter>,
}

impl Tank {
    fn new(sample_rate: u32, spread: usize) -> Self {
        Self {
            combs: COMB_LENGTHS
                .iter()
                .map(|&len| CombFilter::new(scaled_len(len + spread, sample_rate)))
                .collect(),
            allpasses: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllpassFilter::new(scaled_len(len + spread, sample_rate)))
                .collect(),
        }
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let mut out = 0.0;
        for comb in &mut self.combs {
            out += comb.process(input, feedback, damp);
        }
        out *= COMB_GAIN;
        for ap in &mut self.allpasses {
            out = ap.process(out);
        }
        out
    }

    fn reset(&mut self) {
        self.combs.iter_mut().for_each(CombFilter::reset);
        self.allpasses.iter_mut().for_each(AllpassFilter::reset);
    }
}

/// Reverb insert
pub struct ReverbEffect {
    info: EffectInfo,
    left: Tank,
    right: Tank,
    mix: f32,
    room_size: f32,
    damping: f32,
}

impl ReverbEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = Self::describe();
        Self {
            left: Tank::new(sample_rate, 0),
            right: Tank::new(sample_rate, STEREO_SPREAD),
            mix: info.params[PARAM_MIX].default,
            room_size: info.params[PARAM_ROOM_SIZE].default,
            damping: info.params[PARAM_DAMPING].default,
            info,
        }
    }

    pub fn describe() -> EffectInfo {
        EffectInfo::new("reverb", "Reverb")
            .with_param(ParamInfo::new("mix", 0.3).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("room", 0.5).with_range(0.0, 1.0))
            .with_param(ParamInfo::new("damping", 0.5).with_range(0.0, 1.0))
    }

    /// Comb feedback for the room size (0.7..0.98)
    fn feedback(&self) -> f32 {
        0.7 + self.room_size * 0.28
    }
}

impl Effect for ReverbEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let feedback = self.feedback();
        let damp = self.damping;
        let wet = self.mix;
        let dry = 1.0 - wet;
        for sample in buffer.iter_mut() {
            let input = (sample.left + sample.right) * 0.5;
            let out_l = self.left.process(input, feedback, damp);
            let out_r = self.right.process(input, feedback, damp);
            sample.left = sample.left * dry + out_l * wet;
            sample.right = sample.right * dry + out_r * wet;
        }
    }

    fn sync_params(&mut self, slot: &EffectSlotParams) {
        self.mix = slot.value(PARAM_MIX).clamp(0.0, 1.0);
        self.room_size = slot.value(PARAM_ROOM_SIZE).clamp(0.0, 1.0);
        self.damping = slot.value(PARAM_DAMPING).clamp(0.0, 1.0);
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_reverb_creation() {
        let effect = ReverbEffect::new(48000);
        assert_eq!(effect.info().name, "reverb");
        assert_eq!(effect.info().param_count(), 3);
    }

    #[test]
    fn test_reverb_produces_tail() {
        let mut effect = ReverbEffect::new(48000);
        let mut buffer = StereoBuffer::silence(8192);
        buffer.as_mut_slice()[0] = StereoSample::new(1.0, 1.0);
        effect.process(&mut buffer);
        let tail: f32 = buffer.as_slice()[2000..].iter().map(|s| s.left.abs()).sum();
        assert!(tail > 0.01, "tail energy {}", tail);
    }

    #[test]
    fn test_reverb_reset() {
        let mut effect = ReverbEffect::new(48000);
        let mut buffer = StereoBuffer::silence(4096);
        for s in buffer.iter_mut() {
            *s = StereoSample::mono(0.5);
        }
        effect.process(&mut buffer);
        effect.reset();

        let mut buffer = StereoBuffer::silence(512);
        effect.process(&mut buffer);
        assert!(buffer.iter().all(|s| s.left == 0.0 && s.right == 0.0));
    }
}
