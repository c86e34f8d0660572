//! Effects chain - parametric filter, feedback delay and reverb
//!
//! The chain has a fixed order (filter → delay → reverb). Each effect is an
//! insert that can be switched in or out of the signal path. Switching never
//! rewires the render path abruptly: the insert's wet share is ramped over a
//! few milliseconds (see [`EffectsRack`]), so a toggle during playback is a
//! short crossfade rather than a click.
//!
//! Control side: [`EffectsChain`] validates names/values and writes the
//! shared [`EffectParams`]. Render side: [`EffectsRack`] pulls those values
//! once per block.

pub mod delay;
pub mod filter;
pub mod reverb;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::graph::biquad::FilterType;
use crate::graph::params::{GraphParams, LinearRamp};
use crate::types::{StereoBuffer, MAX_BUFFER_SIZE};

pub use delay::DelayEffect;
pub use filter::FilterEffect;
pub use reverb::ReverbEffect;

/// Maximum parameters per effect slot
pub const MAX_EFFECT_PARAMS: usize = 4;

/// Effects in chain order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectKind {
    Filter,
    Delay,
    Reverb,
}

impl EffectKind {
    /// Chain order
    pub const ALL: [EffectKind; 3] = [EffectKind::Filter, EffectKind::Delay, EffectKind::Reverb];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|k| k.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Filter => "filter",
            EffectKind::Delay => "delay",
            EffectKind::Reverb => "reverb",
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Parameter descriptors of this effect
    pub fn info(self) -> EffectInfo {
        match self {
            EffectKind::Filter => filter::FilterEffect::describe(),
            EffectKind::Delay => delay::DelayEffect::describe(),
            EffectKind::Reverb => reverb::ReverbEffect::describe(),
        }
    }
}

/// Information about an effect parameter
#[derive(Debug, Clone)]
pub struct ParamInfo {
    /// Parameter name, matched case-insensitively by `setEffectParam`
    pub name: String,
    /// Default value in parameter units
    pub default: f32,
    pub min: f32,
    pub max: f32,
    /// Unit label (e.g., "s", "Hz", "dB")
    pub unit: String,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, default: f32) -> Self {
        Self {
            name: name.into(),
            default,
            min: 0.0,
            max: 1.0,
            unit: String::new(),
        }
    }

    /// Set the value range
    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    /// Set the unit label
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Clamp a value into range (NaN becomes the default)
    pub fn clamp(&self, value: f32) -> f32 {
        if value.is_nan() {
            self.default
        } else {
            value.clamp(self.min, self.max)
        }
    }
}

/// Information about an effect
#[derive(Debug, Clone)]
pub struct EffectInfo {
    pub name: String,
    pub category: String,
    pub params: Vec<ParamInfo>,
}

impl EffectInfo {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: category.into(),
            params: Vec::new(),
        }
    }

    /// Add a parameter to this effect
    pub fn with_param(mut self, param: ParamInfo) -> Self {
        debug_assert!(self.params.len() < MAX_EFFECT_PARAMS);
        self.params.push(param);
        self
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Index of a parameter by name
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// The render-side effect trait
///
/// Effects process stereo blocks in place and pull their parameter values
/// from the shared store once per block.
pub trait Effect: Send {
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Pull current parameter values from the slot
    fn sync_params(&mut self, slot: &EffectSlotParams);

    fn info(&self) -> &EffectInfo;

    /// Clear internal state (delay lines, filter memory)
    fn reset(&mut self);
}

/// Shared parameter slot for one effect
pub struct EffectSlotParams {
    pub enabled: AtomicBool,
    pub values: [AtomicF32; MAX_EFFECT_PARAMS],
}

impl EffectSlotParams {
    fn new(info: &EffectInfo) -> Self {
        Self {
            enabled: AtomicBool::new(false),
            values: std::array::from_fn(|i| {
                AtomicF32::new(info.params.get(i).map(|p| p.default).unwrap_or(0.0))
            }),
        }
    }

    #[inline]
    pub fn value(&self, index: usize) -> f32 {
        self.values[index].load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }
}

/// Parameter slots of all effects, in chain order
pub struct EffectParams {
    slots: [EffectSlotParams; 3],
}

impl EffectParams {
    pub fn new() -> Self {
        Self {
            slots: EffectKind::ALL.map(|k| EffectSlotParams::new(&k.info())),
        }
    }

    #[inline]
    pub fn slot(&self, kind: EffectKind) -> &EffectSlotParams {
        &self.slots[kind.index()]
    }
}

impl Default for EffectParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Control-side view of the effects chain
pub struct EffectsChain {
    params: Arc<GraphParams>,
    infos: [EffectInfo; 3],
}

impl EffectsChain {
    pub fn new(params: Arc<GraphParams>) -> Self {
        Self {
            params,
            infos: EffectKind::ALL.map(EffectKind::info),
        }
    }

    fn resolve(name: &str) -> EngineResult<EffectKind> {
        EffectKind::from_name(name).ok_or_else(|| EngineError::UnknownEffect(name.to_string()))
    }

    /// Switch an effect in or out of the chain
    pub fn toggle_effect(&mut self, name: &str, on: bool) -> EngineResult<EffectKind> {
        let kind = Self::resolve(name)?;
        self.params.effects.slot(kind).enabled.store(on, Ordering::Relaxed);
        log::debug!("Effect {} {}", kind.name(), if on { "enabled" } else { "disabled" });
        Ok(kind)
    }

    /// Set a parameter by name; returns the clamped value that was stored
    pub fn set_effect_param(&mut self, name: &str, param: &str, value: f32) -> EngineResult<f32> {
        let kind = Self::resolve(name)?;
        let info = &self.infos[kind.index()];
        let index = info.param_index(param).ok_or_else(|| EngineError::UnknownParam {
            effect: kind.name().to_string(),
            param: param.to_string(),
        })?;
        let value = info.params[index].clamp(value);
        self.params.effects.slot(kind).values[index].store(value, Ordering::Relaxed);
        Ok(value)
    }

    /// Switch the filter response type
    pub fn set_filter_type(&mut self, kind: FilterType) {
        self.params.effects.slot(EffectKind::Filter).values[filter::PARAM_TYPE]
            .store(kind.as_u8() as f32, Ordering::Relaxed);
    }

    pub fn is_enabled(&self, kind: EffectKind) -> bool {
        self.params.effects.slot(kind).is_enabled()
    }

    /// Current value of a parameter
    pub fn param(&self, kind: EffectKind, index: usize) -> Option<f32> {
        (index < self.infos[kind.index()].param_count())
            .then(|| self.params.effects.slot(kind).value(index))
    }

    pub fn info(&self, kind: EffectKind) -> &EffectInfo {
        &self.infos[kind.index()]
    }
}

/// One insert of the render-side rack
struct Insert {
    effect: Box<dyn Effect>,
    mix: LinearRamp,
}

/// Render-side chain of effect inserts
pub struct EffectsRack {
    inserts: [Insert; 3],
    scratch: StereoBuffer,
}

impl EffectsRack {
    pub fn new(sample_rate: u32, ramp_seconds: f32, max_delay_seconds: f32) -> Self {
        let insert = |effect: Box<dyn Effect>| Insert {
            effect,
            mix: LinearRamp::with_duration(0.0, ramp_seconds, sample_rate),
        };
        Self {
            inserts: [
                insert(Box::new(FilterEffect::new(sample_rate))),
                insert(Box::new(DelayEffect::new(sample_rate, max_delay_seconds))),
                insert(Box::new(ReverbEffect::new(sample_rate))),
            ],
            scratch: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn process(&mut self, params: &EffectParams, buffer: &mut StereoBuffer) {
        for (kind, insert) in EffectKind::ALL.iter().zip(self.inserts.iter_mut()) {
            let slot = params.slot(*kind);
            let was_connected = insert.mix.target() > 0.0 || insert.mix.is_ramping();
            insert.mix.set_target(if slot.is_enabled() { 1.0 } else { 0.0 });

            if !insert.mix.is_ramping() && insert.mix.current() == 0.0 {
                if was_connected {
                    // Fully switched out: start clean next time
                    insert.effect.reset();
                }
                continue;
            }

            insert.effect.sync_params(slot);

            if !insert.mix.is_ramping() {
                insert.effect.process(buffer);
                continue;
            }

            // Crossfade between the dry block and the processed block
            self.scratch.set_len_from_capacity(buffer.len());
            self.scratch.as_mut_slice().copy_from_slice(buffer.as_slice());
            insert.effect.process(&mut self.scratch);
            for (dry, wet) in buffer.iter_mut().zip(self.scratch.iter()) {
                let g = insert.mix.next();
                *dry = *dry * (1.0 - g) + *wet * g;
            }
        }
    }

    /// Whether an insert currently contributes to the output
    pub fn is_active(&self, kind: EffectKind) -> bool {
        let mix = &self.inserts[kind.index()].mix;
        mix.current() > 0.0 || mix.is_ramping()
    }

    pub fn reset(&mut self) {
        for insert in &mut self.inserts {
            insert.effect.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_param_info() {
        let param = ParamInfo::new("Feedback", 0.4).with_range(0.0, 0.95);
        assert_eq!(param.clamp(2.0), 0.95);
        assert_eq!(param.clamp(-1.0), 0.0);
        assert_eq!(param.clamp(f32::NAN), 0.4);
    }

    #[test]
    fn test_effect_names() {
        assert_eq!(EffectKind::from_name("Delay"), Some(EffectKind::Delay));
        assert_eq!(EffectKind::from_name("chorus"), None);
    }

    #[test]
    fn test_chain_validates_names_and_clamps() {
        let params = Arc::new(GraphParams::new());
        let mut chain = EffectsChain::new(Arc::clone(&params));

        assert!(matches!(chain.toggle_effect("flanger", true), Err(EngineError::UnknownEffect(_))));
        assert!(matches!(
            chain.set_effect_param("delay", "wobble", 1.0),
            Err(EngineError::UnknownParam { .. })
        ));

        assert_eq!(chain.set_effect_param("delay", "feedback", 1.5).unwrap(), 0.95);
        assert_eq!(chain.param(EffectKind::Delay, delay::PARAM_FEEDBACK), Some(0.95));

        assert_eq!(chain.toggle_effect("REVERB", true).unwrap(), EffectKind::Reverb);
        assert!(params.effects.slot(EffectKind::Reverb).is_enabled());
    }

    #[test]
    fn test_filter_type_switch() {
        let params = Arc::new(GraphParams::new());
        let mut chain = EffectsChain::new(Arc::clone(&params));
        chain.set_filter_type(FilterType::Highpass);
        let stored = params.effects.slot(EffectKind::Filter).value(filter::PARAM_TYPE);
        assert_eq!(FilterType::from_u8(stored as u8), FilterType::Highpass);
    }

    #[test]
    fn test_disabled_rack_is_transparent() {
        let params = GraphParams::new();
        let mut rack = EffectsRack::new(48000, 0.005, 1.0);
        let mut buf = StereoBuffer::silence(256);
        for s in buf.iter_mut() {
            *s = StereoSample::mono(0.3);
        }
        rack.process(&params.effects, &mut buf);
        assert!(buf.iter().all(|s| s.left == 0.3 && s.right == 0.3));
    }

    #[test]
    fn test_toggle_crossfades_without_jump() {
        let params = GraphParams::new();
        let slot = params.effects.slot(EffectKind::Filter);
        slot.values[filter::PARAM_FREQUENCY].store(200.0, Ordering::Relaxed);
        slot.enabled.store(true, Ordering::Relaxed);

        let mut rack = EffectsRack::new(48000, 0.005, 1.0);
        let mut buf = StereoBuffer::silence(512);
        for (i, s) in buf.iter_mut().enumerate() {
            *s = StereoSample::mono(if i % 2 == 0 { 0.5 } else { -0.5 });
        }
        rack.process(&params.effects, &mut buf);
        assert!(rack.is_active(EffectKind::Filter));
        // The first sample is still almost entirely dry
        assert!((buf[0].left - 0.5).abs() < 0.01);
        // After the 240-sample ramp the Nyquist tone is removed by the low-pass
        assert!(buf.as_slice()[400..].iter().all(|s| s.left.abs() < 0.05));
    }
}
