//! Engine settings
//!
//! Everything here is plain serde data with defaults; a partial YAML file
//! fills the rest from `Default`.

use serde::{Deserialize, Serialize};

use crate::analysis::{BeatDetectionConfig, TapTempoConfig};
use crate::audio::AudioConfig;
use crate::engine::{EngineSettings, DEFAULT_VOICES};
use crate::mixer::DeckMode;

/// Deck and transport settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeckConfig {
    /// Crossfader grouping
    pub mode: DeckMode,
    /// Fader volume every deck starts at
    pub default_volume: f32,
    /// Pitch fader range in percent (±)
    pub pitch_range: f32,
    /// Step of the skip forward/back buttons in seconds
    pub seek_step: f64,
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            mode: DeckMode::TwoDeck,
            default_volume: 0.85,
            pitch_range: 16.0,
            seek_step: 10.0,
        }
    }
}

/// Offline analysis worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub threads: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { threads: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlicerConfig {
    /// Slice count used when none is given
    pub default_divisions: usize,
    /// Simultaneous slice voices
    pub voices: usize,
}

impl Default for SlicerConfig {
    fn default() -> Self {
        Self {
            default_divisions: 8,
            voices: DEFAULT_VOICES,
        }
    }
}

/// Frequency-bin snapshot settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrumConfig {
    /// FFT size (power of two); bins = fft_size / 2
    pub fft_size: usize,
    /// Temporal smoothing 0..1 (0 = none)
    pub smoothing: f32,
    /// dB mapped to byte 0
    pub min_db: f32,
    /// dB mapped to byte 255
    pub max_db: f32,
}

impl Default for SpectrumConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Poll-context cadences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Visual feed interval (~60 Hz)
    pub visual_ms: u64,
    /// Timer work interval (tap expiry, analysis pickup)
    pub timer_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            visual_ms: 16,
            timer_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectsConfig {
    /// Gain and effect toggle ramp in milliseconds
    pub ramp_ms: f32,
    /// Longest delay line in seconds
    pub max_delay_seconds: f32,
}

impl Default for EffectsConfig {
    fn default() -> Self {
        Self {
            ramp_ms: 5.0,
            max_delay_seconds: 5.0,
        }
    }
}

/// Top-level engine configuration (`config.yaml`)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub decks: DeckConfig,
    pub tap: TapTempoConfig,
    pub beat_detection: BeatDetectionConfig,
    pub analysis: AnalysisConfig,
    pub slicer: SlicerConfig,
    pub spectrum: SpectrumConfig,
    pub polling: PollingConfig,
    pub effects: EffectsConfig,
}

impl EngineConfig {
    /// Render-side parameters at the negotiated sample rate
    pub fn engine_settings(&self, sample_rate: u32) -> EngineSettings {
        EngineSettings {
            sample_rate,
            ramp_seconds: self.effects.ramp_ms.max(0.0) / 1000.0,
            max_delay_seconds: self.effects.max_delay_seconds.max(0.0),
            voices: self.slicer.voices.max(1),
        }
    }
}
