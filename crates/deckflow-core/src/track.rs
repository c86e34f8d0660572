//! Track references - decoded PCM borrowed from the track loader
//!
//! Decoding and fetching belong to an external collaborator implementing
//! [`TrackLoader`]. The core only holds [`TrackRef`]s: a handle describing the
//! track plus its decoded PCM in a `basedrop::Shared` so the render thread can
//! drop its reference without freeing a multi-megabyte buffer in the callback.

use basedrop::Shared;
use thiserror::Error;

use crate::engine::gc_handle;
use crate::types::{StereoSample, SAMPLE_RATE};

/// Errors reported by a track loader
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    /// The collaborator could not fetch or decode the track
    #[error("Failed to decode {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Decoded audio contains no channels
    #[error("Decoded track has no audio channels")]
    NoChannels,

    /// Channel buffers have different lengths
    #[error("Channel lengths differ ({expected} vs {found} frames)")]
    ChannelMismatch { expected: usize, found: usize },

    /// Sample rate of zero
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
}

/// Planar decoded PCM with its sample rate
#[derive(Debug, Clone)]
pub struct PcmBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl PcmBuffer {
    /// Create a PCM buffer, validating channel layout
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<Self, LoadError> {
        if sample_rate == 0 {
            return Err(LoadError::InvalidSampleRate(sample_rate));
        }
        let expected = channels.first().map(Vec::len).ok_or(LoadError::NoChannels)?;
        if let Some(bad) = channels.iter().find(|c| c.len() != expected) {
            return Err(LoadError::ChannelMismatch {
                expected,
                found: bad.len(),
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Single-channel buffer (convenience for tests and analysis input)
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, LoadError> {
        Self::new(vec![samples], sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Number of frames per channel
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Borrow one channel's samples
    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Read one frame as stereo (mono is duplicated, extra channels ignored)
    #[inline]
    pub fn frame(&self, index: usize) -> StereoSample {
        match self.channels.as_slice() {
            [mono] => StereoSample::mono(mono.get(index).copied().unwrap_or(0.0)),
            [left, right, ..] => StereoSample::new(
                left.get(index).copied().unwrap_or(0.0),
                right.get(index).copied().unwrap_or(0.0),
            ),
            [] => StereoSample::silence(),
        }
    }

    /// Average of all channels, used by offline analysis
    pub fn mono_mixdown(&self) -> Vec<f32> {
        let count = self.channels.len().max(1) as f32;
        (0..self.frames())
            .map(|i| self.channels.iter().map(|c| c[i]).sum::<f32>() / count)
            .collect()
    }

    /// Copy the frame range `[start, end)` of every channel
    pub fn copy_range(&self, start: usize, end: usize) -> Vec<Vec<f32>> {
        let end = end.min(self.frames());
        let start = start.min(end);
        self.channels.iter().map(|c| c[start..end].to_vec()).collect()
    }
}

impl Default for PcmBuffer {
    fn default() -> Self {
        Self {
            channels: vec![Vec::new()],
            sample_rate: SAMPLE_RATE,
        }
    }
}

/// Identity of a track as supplied by the loader
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHandle {
    /// Location the loader understands (file path, URL, library id)
    pub url: String,
    /// Duration reported by the loader, in seconds
    pub duration: f64,
}

impl TrackHandle {
    pub fn new(url: impl Into<String>, duration: f64) -> Self {
        Self {
            url: url.into(),
            duration,
        }
    }
}

/// Track acquisition collaborator
///
/// Implementations fetch and decode on demand; the core calls this from the
/// control context only, never from the render thread.
pub trait TrackLoader: Send + Sync {
    fn decode(&self, handle: &TrackHandle) -> Result<PcmBuffer, LoadError>;
}

/// A decoded track, shareable between control, render and analysis threads
#[derive(Clone)]
pub struct TrackRef {
    handle: TrackHandle,
    pcm: Shared<PcmBuffer>,
}

impl TrackRef {
    /// Wrap decoded PCM for RT-safe sharing
    pub fn new(handle: TrackHandle, pcm: PcmBuffer) -> Self {
        Self {
            handle,
            pcm: Shared::new(&gc_handle(), pcm),
        }
    }

    /// Decode through a loader and wrap the result
    pub fn load(loader: &dyn TrackLoader, handle: TrackHandle) -> Result<Self, LoadError> {
        let pcm = loader.decode(&handle)?;
        log::info!(
            "Decoded {}: {} ch, {}Hz, {:.1}s",
            handle.url,
            pcm.channel_count(),
            pcm.sample_rate(),
            pcm.duration()
        );
        Ok(Self::new(handle, pcm))
    }

    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }

    pub fn pcm(&self) -> &PcmBuffer {
        &self.pcm
    }

    /// Clone of the shared PCM pointer (for the render thread)
    pub fn shared_pcm(&self) -> Shared<PcmBuffer> {
        Shared::clone(&self.pcm)
    }
}

impl std::fmt::Debug for TrackRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackRef")
            .field("url", &self.handle.url)
            .field("frames", &self.pcm.frames())
            .finish()
    }
}
