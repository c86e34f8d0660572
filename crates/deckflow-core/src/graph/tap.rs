//! Analysis tap at the end of the master chain
//!
//! The render thread pushes a mono copy of every master block into a SPSC
//! ring and stores per-channel RMS into the VU atomics. The poll context
//! drains the ring through [`TapReader`] for the frequency-bin snapshot.
//! A full ring drops samples rather than blocking the render thread.

use std::sync::atomic::Ordering;

use rtrb::{Consumer, Producer, RingBuffer};

use super::params::GraphParams;
use crate::types::StereoBuffer;

/// Samples buffered between render and poll contexts
pub const TAP_CAPACITY: usize = 16384;

/// Render-side end of the tap
pub struct AnalysisTap {
    producer: Producer<f32>,
    dropped: u64,
}

/// Poll-side end of the tap
pub struct TapReader {
    consumer: Consumer<f32>,
}

/// Create a connected tap pair
pub fn analysis_tap(capacity: usize) -> (AnalysisTap, TapReader) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (
        AnalysisTap {
            producer,
            dropped: 0,
        },
        TapReader { consumer },
    )
}

impl AnalysisTap {
    /// Feed one master block
    pub fn process(&mut self, params: &GraphParams, buffer: &StereoBuffer) {
        if !params.analysis_enabled() || buffer.is_empty() {
            params.vu.left.store(0.0, Ordering::Relaxed);
            params.vu.right.store(0.0, Ordering::Relaxed);
            return;
        }

        let mut sum_l = 0.0f32;
        let mut sum_r = 0.0f32;
        for sample in buffer.iter() {
            sum_l += sample.left * sample.left;
            sum_r += sample.right * sample.right;
            if self.producer.push(sample.mid()).is_err() {
                self.dropped += 1;
            }
        }
        let n = buffer.len() as f32;
        params.vu.left.store((sum_l / n).sqrt(), Ordering::Relaxed);
        params.vu.right.store((sum_r / n).sqrt(), Ordering::Relaxed);
    }

    /// Samples discarded because the reader fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TapReader {
    /// Move all pending samples into `out`, keeping at most `keep` newest
    pub fn drain_into(&mut self, out: &mut Vec<f32>, keep: usize) -> usize {
        let mut moved = 0;
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
            moved += 1;
        }
        if out.len() > keep {
            out.drain(..out.len() - keep);
        }
        moved
    }

    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}
