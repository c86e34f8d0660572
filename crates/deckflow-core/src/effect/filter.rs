//! Parametric filter effect
//!
//! A single biquad with a switchable response type. Frequency, Q and gain
//! are independent parameters; gain only matters for shelf and peaking.

use crate::effect::{Effect, EffectInfo, EffectSlotParams, ParamInfo};
use crate::graph::biquad::{FilterStage, FilterType};
use crate::types::StereoBuffer;

pub const PARAM_TYPE: usize = 0;
pub const PARAM_FREQUENCY: usize = 1;
pub const PARAM_Q: usize = 2;
pub const PARAM_GAIN: usize = 3;

/// Switchable biquad filter
pub struct FilterEffect {
    info: EffectInfo,
    stage: FilterStage,
}

impl FilterEffect {
    pub fn new(sample_rate: u32) -> Self {
        let info = Self::describe();
        let stage = FilterStage::new(
            FilterType::Lowpass,
            info.params[PARAM_FREQUENCY].default,
            info.params[PARAM_Q].default,
            info.params[PARAM_GAIN].default,
            sample_rate as f32,
        );
        Self { info, stage }
    }

    pub fn describe() -> EffectInfo {
        EffectInfo::new("filter", "Filter")
            .with_param(
                ParamInfo::new("type", 0.0).with_range(0.0, (FilterType::ALL.len() - 1) as f32),
            )
            .with_param(
                ParamInfo::new("frequency", 1000.0)
                    .with_range(20.0, 20000.0)
                    .with_unit("Hz"),
            )
            .with_param(ParamInfo::new("q", 1.0).with_range(0.0001, 30.0))
            .with_param(
                ParamInfo::new("gain", 0.0)
                    .with_range(-12.0, 12.0)
                    .with_unit("dB"),
            )
    }

    pub fn kind(&self) -> FilterType {
        self.stage.kind()
    }
}

impl Effect for FilterEffect {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        for sample in buffer.iter_mut() {
            let (l, r) = self.stage.process(sample.left, sample.right);
            sample.left = l;
            sample.right = r;
        }
    }

    fn sync_params(&mut self, slot: &EffectSlotParams) {
        let kind = FilterType::from_u8(slot.value(PARAM_TYPE).round() as u8);
        self.stage.update(
            kind,
            slot.value(PARAM_FREQUENCY),
            slot.value(PARAM_Q),
            slot.value(PARAM_GAIN),
        );
    }

    fn info(&self) -> &EffectInfo {
        &self.info
    }

    fn reset(&mut self) {
        self.stage.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{EffectKind, EffectParams};
    use crate::types::StereoSample;
    use std::sync::atomic::Ordering;

    #[test]
    fn test_filter_creation() {
        let effect = FilterEffect::new(48000);
        assert_eq!(effect.info().name, "filter");
        assert_eq!(effect.info().param_count(), 4);
        assert_eq!(effect.info().param_index("Frequency"), Some(PARAM_FREQUENCY));
    }

    #[test]
    fn test_type_switch_follows_slot() {
        let params = EffectParams::new();
        let slot = params.slot(EffectKind::Filter);
        slot.values[PARAM_TYPE].store(FilterType::Highpass.as_u8() as f32, Ordering::Relaxed);

        let mut effect = FilterEffect::new(48000);
        effect.sync_params(slot);
        assert_eq!(effect.kind(), FilterType::Highpass);

        // DC is blocked by a high-pass
        let mut buf = StereoBuffer::silence(4800);
        for s in buf.iter_mut() {
            *s = StereoSample::mono(0.5);
        }
        effect.process(&mut buf);
        assert!(buf[4799].left.abs() < 0.01);
    }
}
