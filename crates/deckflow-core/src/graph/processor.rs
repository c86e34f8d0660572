//! Render-side signal graph
//!
//! Executes the stage order described by [`Topology`](super::topology::Topology):
//! each deck block goes through its EQ and gain ramp into the bus, slice
//! voices add straight into the bus, and the bus runs through the graphic
//! EQ, effect inserts, mixer chain and analysis tap into the output.
//! Everything here is allocated at construction; `process_*` never allocates.

use std::sync::Arc;

use super::eq::{DeckEq, EqBank};
use super::mixer_chain::MixerChain;
use super::params::{GraphParams, LinearRamp};
use super::tap::AnalysisTap;
use crate::effect::EffectsRack;
use crate::types::{DeckId, StereoBuffer, MAX_BUFFER_SIZE, NUM_DECKS};

/// Per-deck strip: 3-band EQ then smoothed gain
struct DeckStrip {
    eq: DeckEq,
    gain: LinearRamp,
}

pub struct GraphProcessor {
    params: Arc<GraphParams>,
    strips: [DeckStrip; NUM_DECKS],
    eq_bank: EqBank,
    effects: EffectsRack,
    mixer: MixerChain,
    tap: AnalysisTap,
    bus: StereoBuffer,
}

impl GraphProcessor {
    pub fn new(
        params: Arc<GraphParams>,
        sample_rate: u32,
        ramp_seconds: f32,
        max_delay_seconds: f32,
        tap: AnalysisTap,
    ) -> Self {
        let sr = sample_rate as f32;
        Self {
            strips: std::array::from_fn(|i| DeckStrip {
                eq: DeckEq::new(sr),
                gain: LinearRamp::with_duration(params.decks[i].gain(), ramp_seconds, sample_rate),
            }),
            params,
            eq_bank: EqBank::new(sr),
            effects: EffectsRack::new(sample_rate, ramp_seconds, max_delay_seconds),
            mixer: MixerChain::new(sample_rate, ramp_seconds),
            tap,
            bus: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Start a block: clear the bus to `len` frames
    pub fn begin_block(&mut self, len: usize) {
        self.bus.set_len_from_capacity(len);
        self.bus.fill_silence();
    }

    /// Run a deck block through its strip and add it to the bus
    ///
    /// Blocks of decks whose source is not attached are ignored.
    pub fn mix_deck(&mut self, deck: DeckId, block: &mut StereoBuffer) {
        let params = self.params.deck(deck);
        if !params.is_attached() {
            return;
        }
        let strip = &mut self.strips[deck.index()];
        strip.eq.process(params, block);
        strip.gain.set_target(params.gain());
        for (bus, sample) in self.bus.iter_mut().zip(block.iter()) {
            *bus += *sample * strip.gain.next();
        }
    }

    /// Add an already-gained slice block to the bus
    pub fn mix_slices(&mut self, block: &StereoBuffer) {
        self.bus.add_buffer(block);
    }

    /// Run the bus through the master chain into `output`
    pub fn render_master(&mut self, output: &mut StereoBuffer) {
        let params = &*self.params;
        self.eq_bank.process(params, &mut self.bus);
        self.effects.process(&params.effects, &mut self.bus);
        self.mixer.process(&params.mixer, &mut self.bus);
        self.tap.process(params, &self.bus);

        let len = self.bus.len().min(output.len());
        output.as_mut_slice()[..len].copy_from_slice(&self.bus.as_slice()[..len]);
    }

    /// Clear filter and effect state of the whole graph
    pub fn reset(&mut self) {
        for strip in &mut self.strips {
            strip.eq.reset();
        }
        self.eq_bank.reset();
        self.effects.reset();
        self.mixer.reset();
    }

    pub fn params(&self) -> &Arc<GraphParams> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tap::analysis_tap;
    use crate::types::StereoSample;
    use std::sync::atomic::Ordering;

    fn processor(params: &Arc<GraphParams>) -> GraphProcessor {
        let (tap, _reader) = analysis_tap(64);
        GraphProcessor::new(Arc::clone(params), 48000, 0.005, 1.0, tap)
    }

    fn block(value: f32, len: usize) -> StereoBuffer {
        let mut buf = StereoBuffer::silence(len);
        for s in buf.iter_mut() {
            *s = StereoSample::mono(value);
        }
        buf
    }

    #[test]
    fn test_unattached_deck_is_silent() {
        let params = Arc::new(GraphParams::new());
        let mut graph = processor(&params);
        let mut out = StereoBuffer::silence(256);

        graph.begin_block(256);
        graph.mix_deck(DeckId::A, &mut block(0.5, 256));
        graph.render_master(&mut out);
        assert!(out.iter().all(|s| s.left == 0.0));
    }

    #[test]
    fn test_deck_gain_scales_output() {
        let params = Arc::new(GraphParams::new());
        let deck = params.deck(DeckId::B);
        deck.attached.store(true, Ordering::Relaxed);
        deck.gain.store(0.25, Ordering::Relaxed);

        let mut graph = processor(&params);
        let mut out = StereoBuffer::silence(2048);
        graph.begin_block(2048);
        graph.mix_deck(DeckId::B, &mut block(0.8, 2048));
        graph.render_master(&mut out);
        // 0.8 × 0.25 once the low-pass has settled
        assert!((out[2047].left - 0.2).abs() < 0.005, "got {}", out[2047].left);
    }

    #[test]
    fn test_slices_mix_into_bus() {
        let params = Arc::new(GraphParams::new());
        let mut graph = processor(&params);
        let mut out = StereoBuffer::silence(1024);
        graph.begin_block(1024);
        graph.mix_slices(&block(0.3, 1024));
        graph.render_master(&mut out);
        assert!((out[1023].left - 0.3).abs() < 0.005);
    }
}
