//! Polyphonic slice voices
//!
//! Each trigger claims a free voice slot holding its own `Shared` reference
//! to the slice set, plays the slice once and releases the slot. Slots are
//! allocated up front, so triggering never allocates on the render thread,
//! and a set replaced while voices still play stays alive until they finish.

use basedrop::Shared;

use crate::loops::SliceSet;
use crate::types::StereoBuffer;

/// Default number of simultaneous slice voices
pub const DEFAULT_VOICES: usize = 16;

struct Voice {
    set: Shared<SliceSet>,
    slice: usize,
    /// Fractional read position in slice frames
    position: f64,
}

pub struct VoicePool {
    voices: Vec<Option<Voice>>,
    engine_rate: u32,
}

impl VoicePool {
    pub fn new(capacity: usize, engine_rate: u32) -> Self {
        Self {
            voices: (0..capacity.max(1)).map(|_| None).collect(),
            engine_rate,
        }
    }

    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Number of voices currently playing
    pub fn active(&self) -> usize {
        self.voices.iter().filter(|v| v.is_some()).count()
    }

    /// Start slice `index` of `set` on a free voice
    ///
    /// Returns false if the index is out of range or every voice is busy.
    pub fn trigger(&mut self, set: &Shared<SliceSet>, index: usize) -> bool {
        if index >= set.len() {
            return false;
        }
        let Some(slot) = self.voices.iter_mut().find(|v| v.is_none()) else {
            log::debug!("Slice voice pool exhausted ({} voices)", self.voices.len());
            return false;
        };
        *slot = Some(Voice {
            set: Shared::clone(set),
            slice: index,
            position: 0.0,
        });
        true
    }

    /// Mix every playing voice into `output`, releasing finished ones
    pub fn render(&mut self, output: &mut StereoBuffer) {
        for slot in self.voices.iter_mut() {
            let Some(voice) = slot else {
                continue;
            };
            let finished = {
                let Some(slice) = voice.set.slice(voice.slice) else {
                    *slot = None;
                    continue;
                };
                let frames = slice.frames();
                let step = voice.set.sample_rate() as f64 / self.engine_rate as f64;
                let mut position = voice.position;
                for out in output.iter_mut() {
                    if position >= frames as f64 {
                        break;
                    }
                    let index = position as usize;
                    let frac = (position - index as f64) as f32;
                    let next = if index + 1 < frames {
                        slice.frame(index + 1)
                    } else {
                        slice.frame(index)
                    };
                    *out += slice.frame(index).lerp(next, frac);
                    position += step;
                }
                voice.position = position;
                position >= frames as f64
            };
            if finished {
                // Drops the Shared; the collector frees the set if this was the last user
                *slot = None;
            }
        }
    }

    pub fn stop_all(&mut self) {
        self.voices.iter_mut().for_each(|v| *v = None);
    }
}
