//! CPAL output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ Control context  │───push()───────────►│   Command Queue     │
//! │  (DjController)  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ Relaxed atomics                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ DeckAtomics/VU   │◄────────────────────│  CPAL Audio Thread  │
//! │ Analysis tap     │     block writes    │  (owns AudioEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! The engine and its command consumer are moved into the stream callback;
//! nothing on the render path is shared behind a lock.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::backend::{build_engine, AudioHandle, AudioSystemResult};
use super::config::AudioConfig;
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};
use crate::config::EngineConfig;
use crate::engine::{AudioEngine, EngineCommand};
use crate::types::{StereoBuffer, MAX_BUFFER_SIZE};

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured device and start rendering into it
pub fn start(config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.audio.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported, buffer_size) = get_output_config(&device, &config.audio)?;
    let sample_rate = supported.sample_rate().0;
    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };
    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    let (engine, command_rx, link) = build_engine(config, sample_rate, true);
    let stream = build_output_stream(&device, &stream_config, engine, command_rx)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle::Cpal(CpalAudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        }),
        link,
        buffer_size,
        latency_ms,
    })
}

/// Pick a stream config: f32 stereo at the requested rate if possible
///
/// Returns the config and the buffer size in frames.
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target = config.target_sample_rate();
    let in_range = |c: &&cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    // Streams are built as f32, so only f32 configs are usable
    let best = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .find(in_range)
        .or_else(|| {
            supported
                .iter()
                .filter(|c| c.sample_format() == SampleFormat::F32)
                .find(|c| c.channels() >= 2)
        })
        .or_else(|| supported.iter().find(|c| c.sample_format() == SampleFormat::F32))
        .ok_or_else(|| AudioError::ConfigError("No f32 output configuration".to_string()))?;

    let sample_rate = if in_range(&best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, using {}Hz (tracks are resampled on playback)",
            target,
            fallback.0
        );
        fallback
    };

    let buffer_size = config.target_buffer_size();
    log::debug!(
        "Selected buffer size: {} frames for {:?}",
        buffer_size,
        config.buffer_size
    );
    Ok((best.clone().with_sample_rate(sample_rate), buffer_size))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: AudioEngine,
    mut command_rx: rtrb::Consumer<EngineCommand>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut master = StereoBuffer::silence(MAX_BUFFER_SIZE);

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                engine.process_commands(&mut command_rx);

                for chunk in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
                    let n_frames = chunk.len() / channels;
                    master.set_len_from_capacity(n_frames);
                    engine.process(&mut master);
                    write_frames(&master, chunk, channels);
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}

/// Copy a stereo block into a device buffer with `channels` channels
fn write_frames(master: &StereoBuffer, data: &mut [f32], channels: usize) {
    if channels == 2 {
        let len = data.len().min(master.len() * 2);
        data[..len].copy_from_slice(&master.as_interleaved()[..len]);
        data[len..].fill(0.0);
        return;
    }
    for (frame, sample) in data.chunks_mut(channels).zip(master.iter()) {
        frame[0] = if channels == 1 { sample.mid() } else { sample.left };
        if channels > 1 {
            frame[1] = sample.right;
        }
        for ch in frame.iter_mut().skip(2) {
            *ch = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn block() -> StereoBuffer {
        let mut buf = StereoBuffer::silence(3);
        for (i, s) in buf.iter_mut().enumerate() {
            *s = StereoSample::new(i as f32, -(i as f32));
        }
        buf
    }

    #[test]
    fn test_write_stereo_is_interleaved() {
        let mut data = vec![9.0; 6];
        write_frames(&block(), &mut data, 2);
        assert_eq!(data, vec![0.0, -0.0, 1.0, -1.0, 2.0, -2.0]);
    }

    #[test]
    fn test_write_extra_channels_are_silent() {
        let mut data = vec![9.0; 12];
        write_frames(&block(), &mut data, 4);
        assert_eq!(&data[4..8], &[1.0, -1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_write_mono_downmixes() {
        let mut data = vec![9.0; 3];
        write_frames(&block(), &mut data, 1);
        assert_eq!(data, vec![0.0, 0.0, 0.0]);
    }
}
