//! Audio backend configuration
//!
//! Device selection, buffer size and sample rate preferences for the output
//! stream.

use serde::{Deserialize, Serialize};

/// Common low-latency buffer sizes (frames)
/// - 64 frames @ 48kHz = ~1.3ms
/// - 128 frames @ 48kHz = ~2.7ms
/// - 256 frames @ 48kHz = ~5.3ms
/// - 512 frames @ 48kHz = ~10.7ms (safe default for most systems)
pub const LOW_LATENCY_BUFFER_SIZES: [u32; 4] = [64, 128, 256, 512];

/// Default buffer size when no preference is specified (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Default sample rate for the audio system (48kHz)
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Preferred buffer size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BufferSize {
    /// Let the backend choose
    #[default]
    Default,
    /// Request a specific buffer size in frames (clamped to 64..8192)
    Fixed(u32),
    /// Smallest size known to be stable on common hardware
    LowLatency,
}

impl BufferSize {
    /// Buffer size in frames, or None for backend default
    pub fn as_frames(&self) -> Option<u32> {
        match self {
            BufferSize::Default => None,
            BufferSize::Fixed(frames) => Some(*frames),
            BufferSize::LowLatency => Some(LOW_LATENCY_BUFFER_SIZES[2]),
        }
    }

    /// Latency in milliseconds at a given sample rate
    pub fn latency_ms(&self, sample_rate: u32) -> Option<f32> {
        self.as_frames()
            .map(|frames| (frames as f32 / sample_rate as f32) * 1000.0)
    }
}

/// Audio device identifier
///
/// Includes both the device name and the host backend (ALSA, PipeWire,
/// CoreAudio, ...) so the same name on different hosts can be told apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    /// Device name as reported by the system
    pub name: String,
    /// Audio host identifier; None searches every host
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    /// Display label including the host if known
    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    /// Preferred buffer size
    pub buffer_size: BufferSize,
    /// Preferred sample rate (None = 48kHz)
    pub sample_rate: Option<u32>,
    /// Skip the device entirely and render silently
    pub silent: bool,
}

impl AudioConfig {
    /// Config that never opens a device
    pub fn silent() -> Self {
        Self {
            silent: true,
            ..Default::default()
        }
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_size(mut self, size: BufferSize) -> Self {
        self.buffer_size = size;
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }

    /// Sample rate to request from the device
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Buffer size the engine will render with
    pub fn target_buffer_size(&self) -> u32 {
        self.buffer_size
            .as_frames()
            .unwrap_or(DEFAULT_BUFFER_SIZE)
            .clamp(LOW_LATENCY_BUFFER_SIZES[0], crate::types::MAX_BUFFER_SIZE as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.as_frames(), None);
        assert_eq!(BufferSize::LowLatency.as_frames(), Some(256));
        let latency = BufferSize::Fixed(480).latency_ms(48000).unwrap();
        assert!((latency - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_targets_are_clamped() {
        assert_eq!(AudioConfig::default().target_buffer_size(), DEFAULT_BUFFER_SIZE);
        assert_eq!(AudioConfig::default().with_buffer_frames(16).target_buffer_size(), 64);
        assert_eq!(AudioConfig::default().with_buffer_frames(1 << 20).target_buffer_size(), 8192);
        assert_eq!(AudioConfig::default().target_sample_rate(), 48000);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::with_host("hw:0,0", "ALSA").display_label(), "[ALSA] hw:0,0");
        assert_eq!(DeviceId::new("Speakers").display_label(), "Speakers");
    }
}
