//! Main render engine - ties together decks, slice voices and the graph

use std::sync::atomic::Ordering;
use std::sync::Arc;

use basedrop::Shared;

use super::command::{EngineCommand, LoadRequest};
use super::deck::{Deck, DeckAtomics};
use super::voices::VoicePool;
use crate::graph::{AnalysisTap, GraphParams, GraphProcessor};
use crate::loops::SliceSet;
use crate::types::{DeckId, StereoBuffer, MAX_BUFFER_SIZE, NUM_DECKS};

/// Render-side construction parameters
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub sample_rate: u32,
    /// Gain and effect-toggle ramp length
    pub ramp_seconds: f32,
    pub max_delay_seconds: f32,
    pub voices: usize,
}

/// The render engine
///
/// Owned exclusively by the render thread. Everything is allocated here so
/// [`process`](Self::process) never allocates.
pub struct AudioEngine {
    decks: [Deck; NUM_DECKS],
    slices: [Option<Shared<SliceSet>>; NUM_DECKS],
    voices: VoicePool,
    graph: GraphProcessor,
    params: Arc<GraphParams>,
    deck_buffer: StereoBuffer,
    voice_buffer: StereoBuffer,
}

impl AudioEngine {
    pub fn new(params: Arc<GraphParams>, settings: EngineSettings, tap: AnalysisTap) -> Self {
        Self {
            decks: std::array::from_fn(|i| Deck::new(DeckId::ALL[i], settings.sample_rate)),
            slices: std::array::from_fn(|_| None),
            voices: VoicePool::new(settings.voices, settings.sample_rate),
            graph: GraphProcessor::new(
                Arc::clone(&params),
                settings.sample_rate,
                settings.ramp_seconds,
                settings.max_delay_seconds,
                tap,
            ),
            params,
            deck_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
            voice_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    /// Lock-free deck state for the control and poll contexts
    pub fn deck_atomics(&self) -> [Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|i| self.decks[i].atomics())
    }

    pub fn active_voices(&self) -> usize {
        self.voices.active()
    }

    /// Drain every pending command (call once per block, before `process`)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply(cmd);
        }
    }

    pub fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadTrack { deck, track } => {
                let LoadRequest { pcm, generation } = *track;
                self.decks[deck.index()].load(pcm, generation);
                self.slices[deck.index()] = None;
            }
            EngineCommand::UnloadTrack { deck } => {
                self.decks[deck.index()].unload();
                self.slices[deck.index()] = None;
            }
            EngineCommand::Play { deck } => self.decks[deck.index()].play(),
            EngineCommand::Pause { deck } => self.decks[deck.index()].pause(),
            EngineCommand::TogglePlay { deck } => self.decks[deck.index()].toggle_play(),
            EngineCommand::Seek { deck, seconds } => self.decks[deck.index()].seek(seconds),
            EngineCommand::Skip { deck, seconds } => self.decks[deck.index()].skip(seconds),
            EngineCommand::SetLoop { deck, region } => self.decks[deck.index()].set_loop(region),
            EngineCommand::SetSlices { deck, slices } => {
                // A set cut from an older load never reaches the deck
                let current = self.decks[deck.index()].generation();
                self.slices[deck.index()] = slices.filter(|s| s.generation() == current);
            }
            EngineCommand::TriggerSlice { deck, index } => {
                if let Some(set) = &self.slices[deck.index()] {
                    self.voices.trigger(set, index);
                }
            }
            EngineCommand::StopVoices => self.voices.stop_all(),
        }
    }

    /// Render one block into `output`
    pub fn process(&mut self, output: &mut StereoBuffer) {
        let len = output.len().min(MAX_BUFFER_SIZE);
        self.deck_buffer.set_len_from_capacity(len);
        self.voice_buffer.set_len_from_capacity(len);
        self.graph.begin_block(len);

        for deck in &mut self.decks {
            let id = deck.id();
            deck.render(self.params.deck(id).rate(), &mut self.deck_buffer);
            self.graph.mix_deck(id, &mut self.deck_buffer);
        }

        self.voice_buffer.fill_silence();
        self.voices.render(&mut self.voice_buffer);
        self.graph.mix_slices(&self.voice_buffer);
        self.params
            .active_voices
            .store(self.voices.active(), Ordering::Relaxed);

        self.graph.render_master(output);
    }

    /// Clear filter and effect state and silence voices
    pub fn reset(&mut self) {
        self.voices.stop_all();
        self.graph.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::gc_handle;
    use crate::graph::analysis_tap;
    use crate::loops::LoopRegion;
    use crate::track::PcmBuffer;
    use crate::types::PlayState;

    const SR: u32 = 48000;

    fn engine() -> (AudioEngine, Arc<GraphParams>) {
        let params = Arc::new(GraphParams::new());
        let (tap, _reader) = analysis_tap(1024);
        let settings = EngineSettings {
            sample_rate: SR,
            ramp_seconds: 0.005,
            max_delay_seconds: 1.0,
            voices: 16,
        };
        (AudioEngine::new(Arc::clone(&params), settings, tap), params)
    }

    fn dc_pcm(value: f32, seconds: f64) -> Shared<PcmBuffer> {
        let len = (seconds * SR as f64) as usize;
        Shared::new(&gc_handle(), PcmBuffer::mono(vec![value; len], SR).unwrap())
    }

    fn load(engine: &mut AudioEngine, deck: DeckId, pcm: Shared<PcmBuffer>, generation: u64) {
        engine.apply(EngineCommand::LoadTrack {
            deck,
            track: Box::new(LoadRequest { pcm, generation }),
        });
    }

    #[test]
    fn test_process_empty_engine() {
        let (mut engine, _) = engine();
        let mut out = StereoBuffer::silence(256);
        engine.process(&mut out);
        assert_eq!(out.len(), 256);
        assert!(out.iter().all(|s| s.left == 0.0));
    }

    #[test]
    fn test_commands_drained_from_queue() {
        let (mut engine, params) = engine();
        let (mut tx, mut rx) = crate::engine::command_channel();
        params.deck(DeckId::A).attached.store(true, Ordering::Relaxed);
        load(&mut engine, DeckId::A, dc_pcm(0.5, 1.0), 1);
        assert!(tx.push(EngineCommand::Play { deck: DeckId::A }).is_ok());
        assert!(tx.push(EngineCommand::Seek { deck: DeckId::A, seconds: 0.25 }).is_ok());
        engine.process_commands(&mut rx);

        assert_eq!(engine.deck(DeckId::A).state(), PlayState::Playing);
        let mut out = StereoBuffer::silence(2048);
        engine.process(&mut out);
        // Deck gain 1.0 by default, low-pass settled by the end of the block
        assert!((out[2047].left - 0.5).abs() < 0.01, "got {}", out[2047].left);
        assert!(engine.deck_atomics()[0].position_seconds() > 0.25);
    }

    #[test]
    fn test_stale_slice_set_is_refused() {
        let (mut engine, _) = engine();
        let pcm = dc_pcm(0.5, 2.0);
        load(&mut engine, DeckId::B, Shared::clone(&pcm), 3);

        let region = LoopRegion::new(0.0, 1.0).unwrap();
        let stale = SliceSet::cut(&pcm, region, 4, 2).unwrap();
        engine.apply(EngineCommand::SetSlices {
            deck: DeckId::B,
            slices: Some(Shared::new(&gc_handle(), stale)),
        });
        engine.apply(EngineCommand::TriggerSlice { deck: DeckId::B, index: 0 });
        assert_eq!(engine.active_voices(), 0);

        let fresh = SliceSet::cut(&pcm, region, 4, 3).unwrap();
        engine.apply(EngineCommand::SetSlices {
            deck: DeckId::B,
            slices: Some(Shared::new(&gc_handle(), fresh)),
        });
        engine.apply(EngineCommand::TriggerSlice { deck: DeckId::B, index: 0 });
        engine.apply(EngineCommand::TriggerSlice { deck: DeckId::B, index: 2 });
        assert_eq!(engine.active_voices(), 2);
    }

    #[test]
    fn test_slice_voices_reach_output() {
        let (mut engine, params) = engine();
        let pcm = dc_pcm(0.2, 2.0);
        load(&mut engine, DeckId::A, Shared::clone(&pcm), 1);
        let set = SliceSet::cut(&pcm, LoopRegion::new(0.0, 1.0).unwrap(), 2, 1).unwrap();
        engine.apply(EngineCommand::SetSlices {
            deck: DeckId::A,
            slices: Some(Shared::new(&gc_handle(), set)),
        });
        engine.apply(EngineCommand::TriggerSlice { deck: DeckId::A, index: 1 });

        let mut out = StereoBuffer::silence(2048);
        engine.process(&mut out);
        // Deck A is stopped; only the voice sounds
        assert!((out[2047].left - 0.2).abs() < 0.01);
        assert_eq!(params.active_voices.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_load_clears_slices() {
        let (mut engine, _) = engine();
        let pcm = dc_pcm(0.2, 2.0);
        load(&mut engine, DeckId::C, Shared::clone(&pcm), 1);
        let set = SliceSet::cut(&pcm, LoopRegion::new(0.0, 1.0).unwrap(), 2, 1).unwrap();
        engine.apply(EngineCommand::SetSlices {
            deck: DeckId::C,
            slices: Some(Shared::new(&gc_handle(), set)),
        });
        load(&mut engine, DeckId::C, pcm, 2);
        engine.apply(EngineCommand::TriggerSlice { deck: DeckId::C, index: 0 });
        assert_eq!(engine.active_voices(), 0);
    }
}
