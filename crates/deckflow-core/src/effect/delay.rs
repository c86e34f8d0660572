//! Feedback delay effect
//!
//! Delay line → feedback gain → back into the delay line, mixed with the dry
//! signal. Feedback is clamped below unity so the loop can never run away.

use crate::effect::{Effect, EffectInfo, EffectSlotParams, ParamInfo};
use crate::types::StereoBuffer;

pub const PARAM_TIME: usize = 0;
pub const PARAM_FEEDBACK: usize = 1;
pub const PARAM_MIX: usize = 2;

/// Highest feedback gain accepted
pub const MAX_FEEDBACK: f32 = 0.95;

/// Stereo delay line with a fixed capacity
struct DelayLine {
    buffer_l: Vec<f32>,
    buffer_r: Vec<f32>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_pos: 0,
            delay_samples: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.buffer_l.len()
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.min(self.capacity() - 1);
    }

    #[inline]
    fn read(&self) -> (f32, f32) {
        let cap = self.capacity();
        let read_pos = (self.write_pos + cap - self.delay_samples) % cap;
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    /// One sample through the feedback loop; returns the delayed signal
    #[inline]
    fn process(&mut self, left: f32, right: f32, feedback: f32) -> (f32, f32) {
        // A zero-length delay reads what is about to be written
        let (delayed_l, delayed_r) = if self.delay_samples == 0 {
            (left, right)
        } else {
            self.read()
        };
        self.buffer_l[self.write_pos] = left + delayed_l * feedback;
        self.buffer_r[self.write_pos] = right + delayed_r * feedback;
        self.write_pos = (self.write_pos + 1) % self.capacity();
        (delayed_l, delayed_r)
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Delay with feedback and dry/wet mix
pub struct DelayEffect {
    info: EffectInfo,
    line: DelayLine,
    sample_rate: f32,
    feedback: f32,
    mix: f32,
}

impl DelayEffect {
    /// `max_seconds` bounds the delay time (and the memory reserved for it)
    pub fn new(sample_rate: u32, max_seconds: f32) -> Self {
        let info = Self::describe();
        let capacity = (max_seconds.max(0.01) * sample_rate as f32) as usize + 1;
        let mut effect = Self {
            line: DelayLine::new(capacity),
            sample_rate: sample_rate as f32,
            feedback: info.params[PARAM_FEEDBACK].default,
            mix: info.params[PARAM_MIX].default,
            info,
        };
        effect.set_time(effect.info.params[PARAM_TIME].default);
        effect
    }

    pub fn describe() -> EffectInfo {
        EffectInfo::new("delay", "Delay")
            .with_param(ParamInfo::new("time", 0.5).with_range(0.0, 5.0).with_unit("s"))
            .with_param(ParamInfo::new("feedback", 0.4).with_range(0.0, MAX_FEEDBACK))
            .with_param(ParamInfo::new("mix", 0.5).with_range(0.0, 1.0))
    }

    fn set_time(&mut self, seconds: f32) {
        self.line
            .set_delay_samples((seconds.max(0.0) * self.sample_rate).round() as usize);
    }

    /// Current delay in samples
    pub fn delay_samples(&self) -> usize {
        self.line.delay_samples
    }
}

impl Effect for DelayEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let wet = self.mix;
        let dry = 1.0 - wet;
        for sample in buffer.iter_mut() {
            let (delayed_l, delayed_r) = self.line.process(sample.left, sample.right, self.feedback);
            sample.left = sample.left * dry + delayed_l * wet;
            sample.right = sample.right * dry + delayed_r * wet;
        }
    }

    fn sync_params(&mut self, slot: &EffectSlotParams) {
        self.set_time(slot.value(PARAM_TIME));
        self.feedback = slot.value(PARAM_FEEDBACK).clamp(0.0, MAX_FEEDBACK);
        self.mix = slot.value(PARAM_MIX).clamp(0.0, 1.0);
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}
