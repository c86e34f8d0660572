//! Render-side deck: playhead, transport and sample-accurate loop wrap
//!
//! A deck reads its track's PCM at `rate × track_sr / engine_sr` frames per
//! output frame with linear interpolation. When a loop is active the wrap is
//! checked per output frame, so looping never drifts; only the position
//! published through [`DeckAtomics`] lags, by at most one render block.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use crate::loops::LoopRegion;
use crate::track::PcmBuffer;
use crate::types::{DeckId, PlayState, StereoBuffer, StereoSample};

/// Lock-free deck state for the control and poll contexts
///
/// Written by the render thread once per block, read anywhere with relaxed
/// loads.
pub struct DeckAtomics {
    /// Playhead in track frames
    pub position: AtomicU64,
    pub playing: AtomicBool,
    pub loaded: AtomicBool,
    /// Track length in frames
    pub duration: AtomicU64,
    /// Track sample rate
    pub sample_rate: AtomicU32,
    pub loop_active: AtomicBool,
    pub loop_start: AtomicU64,
    pub loop_end: AtomicU64,
    /// Generation of the load currently on the deck
    pub generation: AtomicU64,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
            duration: AtomicU64::new(0),
            sample_rate: AtomicU32::new(0),
            loop_active: AtomicBool::new(false),
            loop_start: AtomicU64::new(0),
            loop_end: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    fn frames_to_seconds(&self, frames: u64) -> f64 {
        match self.sample_rate.load(Ordering::Relaxed) {
            0 => 0.0,
            sr => frames as f64 / sr as f64,
        }
    }

    /// Playhead in seconds
    #[inline]
    pub fn position_seconds(&self) -> f64 {
        self.frames_to_seconds(self.position.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn duration_seconds(&self) -> f64 {
        self.frames_to_seconds(self.duration.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn play_state(&self) -> PlayState {
        if self.is_playing() {
            PlayState::Playing
        } else {
            PlayState::Stopped
        }
    }

    /// Active loop bounds in seconds
    pub fn loop_bounds(&self) -> Option<(f64, f64)> {
        if !self.loop_active.load(Ordering::Relaxed) {
            return None;
        }
        Some((
            self.frames_to_seconds(self.loop_start.load(Ordering::Relaxed)),
            self.frames_to_seconds(self.loop_end.load(Ordering::Relaxed)),
        ))
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Relaxed)
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Loop bounds in (fractional) track frames
#[derive(Debug, Clone, Copy)]
struct FrameLoop {
    start: f64,
    end: f64,
}

pub struct Deck {
    id: DeckId,
    engine_rate: u32,
    pcm: Option<Shared<PcmBuffer>>,
    generation: u64,
    /// Fractional playhead in track frames
    position: f64,
    state: PlayState,
    looping: Option<FrameLoop>,
    atomics: Arc<DeckAtomics>,
}

impl Deck {
    pub fn new(id: DeckId, engine_rate: u32) -> Self {
        Self {
            id,
            engine_rate,
            pcm: None,
            generation: 0,
            position: 0.0,
            state: PlayState::Stopped,
            looping: None,
            atomics: Arc::new(DeckAtomics::new()),
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn has_track(&self) -> bool {
        self.pcm.is_some()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    /// Playhead in track frames
    pub fn position(&self) -> f64 {
        self.position
    }

    fn track_rate(&self) -> f64 {
        self.pcm.as_ref().map_or(self.engine_rate, |p| p.sample_rate()) as f64
    }

    fn frames(&self) -> f64 {
        self.pcm.as_ref().map_or(0, |p| p.frames()) as f64
    }

    /// Put a new track on the deck; stops playback and clears the loop
    ///
    /// The previous PCM is released through the collector, never freed here.
    pub fn load(&mut self, pcm: Shared<PcmBuffer>, generation: u64) {
        let a = &self.atomics;
        a.duration.store(pcm.frames() as u64, Ordering::Relaxed);
        a.sample_rate.store(pcm.sample_rate(), Ordering::Relaxed);
        a.generation.store(generation, Ordering::Relaxed);
        a.loaded.store(true, Ordering::Relaxed);

        self.pcm = Some(pcm);
        self.generation = generation;
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.looping = None;
        self.sync_atomics();
    }

    pub fn unload(&mut self) {
        self.pcm = None;
        self.position = 0.0;
        self.state = PlayState::Stopped;
        self.looping = None;
        self.atomics.loaded.store(false, Ordering::Relaxed);
        self.atomics.duration.store(0, Ordering::Relaxed);
        self.sync_atomics();
    }

    pub fn play(&mut self) {
        if self.pcm.is_some() {
            self.state = PlayState::Playing;
        }
        self.sync_atomics();
    }

    pub fn pause(&mut self) {
        self.state = PlayState::Stopped;
        self.sync_atomics();
    }

    pub fn toggle_play(&mut self) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Stopped => self.play(),
        }
    }

    /// Move the playhead to `seconds`, clamped to `[0, duration]`
    pub fn seek(&mut self, seconds: f64) {
        if !seconds.is_finite() {
            return;
        }
        self.position = (seconds * self.track_rate()).clamp(0.0, self.frames());
        self.sync_atomics();
    }

    /// Move the playhead by `seconds` relative to where it is now
    pub fn skip(&mut self, seconds: f64) {
        let now = self.position / self.track_rate();
        self.seek(now + seconds);
    }

    /// Set or clear the wrap region
    pub fn set_loop(&mut self, region: Option<LoopRegion>) {
        let sr = self.track_rate();
        self.looping = region.map(|r| FrameLoop {
            start: r.start * sr,
            end: r.end * sr,
        });
        self.sync_atomics();
    }

    pub fn loop_region(&self) -> Option<(f64, f64)> {
        self.looping.map(|l| (l.start, l.end))
    }

    /// Render one block at playback `rate` into `output`
    ///
    /// Writes silence when nothing is playing. Reaching the end of the track
    /// stops the deck.
    pub fn render(&mut self, rate: f32, output: &mut StereoBuffer) {
        output.fill_silence();
        let Some(pcm) = &self.pcm else {
            return;
        };
        if self.state != PlayState::Playing {
            return;
        }

        let frames = pcm.frames();
        let step = rate.max(0.0) as f64 * pcm.sample_rate() as f64 / self.engine_rate as f64;
        let mut position = self.position;
        let mut ended = false;

        for out in output.iter_mut() {
            if let Some(l) = self.looping {
                if position >= l.end {
                    // Carry the overshoot so the wrap is phase-exact
                    let len = l.end - l.start;
                    position = l.start + (position - l.end) % len;
                }
            }
            if position >= frames as f64 {
                ended = true;
                break;
            }

            let index = position as usize;
            let frac = (position - index as f64) as f32;
            let current = pcm.frame(index);
            let next = if index + 1 < frames {
                pcm.frame(index + 1)
            } else {
                StereoSample::silence()
            };
            *out = current.lerp(next, frac);
            position += step;
        }

        self.position = position.min(frames as f64);
        if ended {
            log::debug!("Deck {} reached end of track", self.id);
            self.state = PlayState::Stopped;
        }
        self.sync_atomics();
    }

    fn sync_atomics(&self) {
        let a = &self.atomics;
        a.position.store(self.position as u64, Ordering::Relaxed);
        a.playing
            .store(self.state == PlayState::Playing, Ordering::Relaxed);
        match self.looping {
            Some(l) => {
                a.loop_start.store(l.start.round() as u64, Ordering::Relaxed);
                a.loop_end.store(l.end.round() as u64, Ordering::Relaxed);
                a.loop_active.store(true, Ordering::Relaxed);
            }
            None => a.loop_active.store(false, Ordering::Relaxed),
        }
    }
}
