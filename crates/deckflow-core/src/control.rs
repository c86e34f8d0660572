//! Control facade: the command surface of the mixing engine
//!
//! [`DjController`] lives in the control context. It owns the control-side
//! subsystems ([`SignalGraph`], [`DeckMixer`], [`EffectsChain`],
//! [`BeatAnalyzer`]) and a mirror of each deck (track, load generation, loop
//! state machine, slice set, hot cues). Parameter writes go straight to the
//! shared atomics; anything that changes what a deck plays goes to the
//! render thread through the command queue.
//!
//! ```ignore
//! let config: EngineConfig = load_config(&default_config_path());
//! let system = start_engine(&config);
//! let mut dj = DjController::new(system.link, &config);
//!
//! dj.load_deck(DeckId::A, track)?;
//! dj.play(DeckId::A)?;
//! dj.set_crossfader(25.0)?;
//!
//! // Poll context, as often as the UI likes
//! dj.poll(Instant::now());
//! let snapshot = dj.snapshot();
//! ```

use std::sync::Arc;
use std::time::Instant;

use basedrop::Shared;

use crate::analysis::{AnalysisError, AnalysisEvent, AnalysisService, BeatAnalyzer, BeatGrid, TapOutcome};
use crate::audio::{CommandSender, EngineLink};
use crate::config::EngineConfig;
use crate::effect::EffectsChain;
use crate::engine::{gc_handle, DeckAtomics, EngineCommand, LoadRequest};
use crate::error::{EngineError, EngineResult};
use crate::graph::{DeckEqBand, FilterType, SignalGraph, SourceId, TapReader};
use crate::loops::{HotCueAction, HotCues, LoopEngine, LoopError, LoopRegion, LoopState, SliceSet};
use crate::mixer::{DeckMixer, DeckMode};
use crate::scheduler::{DueWork, RenderScheduler};
use crate::telemetry::{DeckSnapshot, EngineSnapshot, SpectrumAnalyzer};
use crate::track::{TrackHandle, TrackLoader, TrackRef};
use crate::types::{DeckId, NUM_DECKS};

/// Control-side mirror of one deck
#[derive(Default)]
struct DeckSlot {
    track: Option<TrackRef>,
    /// Load generation of `track`; 0 = never loaded
    generation: u64,
    loops: LoopEngine,
    slices: Option<Shared<SliceSet>>,
    hot_cues: HotCues,
}

impl DeckSlot {
    /// Slice set cut from the track currently loaded
    fn current_slices(&self) -> Option<&Shared<SliceSet>> {
        self.slices
            .as_ref()
            .filter(|set| set.generation() == self.generation)
    }
}

/// What one call to [`DjController::poll`] did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PollOutcome {
    pub due: DueWork,
    /// Finished analysis jobs picked up on this poll
    pub analysis: Vec<AnalysisEvent>,
    /// The tap session timed out on this poll
    pub taps_expired: bool,
}

fn bpm_error(e: AnalysisError) -> EngineError {
    match e {
        AnalysisError::NoBpm => EngineError::BpmUnknown,
        e => e.into(),
    }
}

fn loop_error(e: LoopError) -> EngineError {
    match e {
        LoopError::BpmUnknown => EngineError::BpmUnknown,
        e => e.into(),
    }
}

fn finite(value: f64, what: &str) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::InvalidArgument(format!("{} must be finite", what)))
    }
}

pub struct DjController {
    sender: CommandSender,
    deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    tap_reader: TapReader,
    sample_rate: u32,

    graph: SignalGraph,
    mixer: DeckMixer,
    effects: EffectsChain,
    analyzer: BeatAnalyzer,
    decks: [DeckSlot; NUM_DECKS],

    spectrum: SpectrumAnalyzer,
    scheduler: RenderScheduler,

    next_generation: u64,
    seek_step: f64,
    default_divisions: usize,
}

impl DjController {
    /// Take over the control side of a started (or hand-driven) engine
    pub fn new(link: EngineLink, config: &EngineConfig) -> Self {
        let EngineLink {
            command_sender,
            deck_atomics,
            params,
            tap_reader,
            sample_rate,
            backend_available,
        } = link;

        // Offline analysis renders on its own pool; without a backend the
        // analysis features degrade to "unavailable"
        let service = backend_available
            .then(|| AnalysisService::new(config.analysis.threads, config.beat_detection.clone()));
        if !backend_available {
            log::info!("Silent engine: offline beat analysis disabled");
        }

        Self {
            sender: command_sender,
            deck_atomics,
            tap_reader,
            sample_rate,
            graph: SignalGraph::new(Arc::clone(&params), backend_available),
            mixer: DeckMixer::new(
                Arc::clone(&params),
                config.decks.mode,
                config.decks.default_volume,
                config.decks.pitch_range,
            ),
            effects: EffectsChain::new(params),
            analyzer: BeatAnalyzer::new(config.tap.clone(), service),
            decks: Default::default(),
            spectrum: SpectrumAnalyzer::new(&config.spectrum),
            scheduler: RenderScheduler::new(&config.polling),
            next_generation: 1,
            seek_step: config.decks.seek_step.abs(),
            default_divisions: config.slicer.default_divisions.max(1),
        }
    }

    fn send(&mut self, cmd: EngineCommand) -> EngineResult<()> {
        self.sender.send(cmd).map_err(|_| {
            log::warn!("Engine command queue full, command dropped");
            EngineError::QueueFull
        })
    }

    fn slot(&self, deck: DeckId) -> &DeckSlot {
        &self.decks[deck.index()]
    }

    fn loaded_track(&self, deck: DeckId) -> EngineResult<&TrackRef> {
        self.slot(deck).track.as_ref().ok_or(EngineError::DeckEmpty(deck))
    }

    /// Playback position as last published by the render thread (seconds)
    pub fn position(&self, deck: DeckId) -> f64 {
        self.deck_atomics[deck.index()].position_seconds()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// No audio backend: commands update state but nothing is heard
    pub fn is_silent(&self) -> bool {
        self.graph.is_silent()
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Tracks and transport
    // ═══════════════════════════════════════════════════════════════════════════

    /// Put a decoded track on a deck; returns its load generation
    ///
    /// Stops the deck and clears its loop, slices, hot cues and beat grid.
    /// Analysis still running for the previous track is cancelled and its
    /// result will be discarded.
    pub fn load_deck(&mut self, deck: DeckId, track: TrackRef) -> EngineResult<u64> {
        let generation = self.next_generation;
        self.send(EngineCommand::LoadTrack {
            deck,
            track: Box::new(LoadRequest {
                pcm: track.shared_pcm(),
                generation,
            }),
        })?;
        self.next_generation += 1;

        self.graph.attach_source(SourceId::Deck(deck));
        self.analyzer.track_changed(deck, generation);
        log::info!(
            "Deck {}: loaded {} ({:.1}s, generation {})",
            deck,
            track.handle().url,
            track.pcm().duration(),
            generation
        );

        self.decks[deck.index()] = DeckSlot {
            track: Some(track),
            generation,
            ..DeckSlot::default()
        };
        Ok(generation)
    }

    /// Decode through the track loader collaborator, then load
    pub fn load_from(&mut self, loader: &dyn TrackLoader, deck: DeckId, handle: TrackHandle) -> EngineResult<u64> {
        let track = TrackRef::load(loader, handle)?;
        self.load_deck(deck, track)
    }

    pub fn unload_deck(&mut self, deck: DeckId) -> EngineResult<()> {
        self.send(EngineCommand::UnloadTrack { deck })?;
        let generation = self.next_generation;
        self.next_generation += 1;
        self.analyzer.track_changed(deck, generation);
        self.decks[deck.index()] = DeckSlot {
            generation,
            ..DeckSlot::default()
        };
        Ok(())
    }

    pub fn track(&self, deck: DeckId) -> Option<&TrackRef> {
        self.slot(deck).track.as_ref()
    }

    pub fn play(&mut self, deck: DeckId) -> EngineResult<()> {
        self.loaded_track(deck)?;
        self.send(EngineCommand::Play { deck })
    }

    pub fn pause(&mut self, deck: DeckId) -> EngineResult<()> {
        self.send(EngineCommand::Pause { deck })
    }

    pub fn toggle_play(&mut self, deck: DeckId) -> EngineResult<()> {
        self.loaded_track(deck)?;
        self.send(EngineCommand::TogglePlay { deck })
    }

    /// Jump to `seconds`, clamped to the track
    pub fn seek(&mut self, deck: DeckId, seconds: f64) -> EngineResult<()> {
        let seconds = finite(seconds, "seek position")?;
        self.loaded_track(deck)?;
        self.send(EngineCommand::Seek { deck, seconds })
    }

    /// Move by `seconds` (negative = back), clamped to the track
    pub fn skip(&mut self, deck: DeckId, seconds: f64) -> EngineResult<()> {
        let seconds = finite(seconds, "skip distance")?;
        self.loaded_track(deck)?;
        self.send(EngineCommand::Skip { deck, seconds })
    }

    /// Skip forward by the configured step
    pub fn skip_forward(&mut self, deck: DeckId) -> EngineResult<()> {
        self.skip(deck, self.seek_step)
    }

    /// Skip back by the configured step
    pub fn skip_back(&mut self, deck: DeckId) -> EngineResult<()> {
        self.skip(deck, -self.seek_step)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Loops and slices
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run a loop transition on a copy and commit it once the render thread
    /// has been told about the resulting region
    fn update_loop<T>(
        &mut self,
        deck: DeckId,
        op: impl FnOnce(&mut LoopEngine, f64) -> Result<T, LoopError>,
    ) -> EngineResult<T> {
        self.loaded_track(deck)?;
        let position = self.position(deck);
        let mut loops = self.slot(deck).loops.clone();
        let out = op(&mut loops, position).map_err(|e| {
            log::debug!("Deck {}: loop command rejected: {}", deck, e);
            loop_error(e)
        })?;
        if loops.region() != self.slot(deck).loops.region() {
            self.send(EngineCommand::SetLoop {
                deck,
                region: loops.region(),
            })?;
        }
        self.decks[deck.index()].loops = loops;
        Ok(out)
    }

    /// Record the loop-in point at the current position
    pub fn set_loop_in(&mut self, deck: DeckId) -> EngineResult<LoopState> {
        self.update_loop(deck, |loops, position| loops.set_loop_in(position))
    }

    /// Record the loop-out point at the current position and activate
    pub fn set_loop_out(&mut self, deck: DeckId) -> EngineResult<LoopRegion> {
        self.update_loop(deck, |loops, position| loops.set_loop_out(position))
    }

    /// Loop `beats` beats from the current position at the current BPM
    pub fn set_auto_loop(&mut self, deck: DeckId, beats: f64) -> EngineResult<LoopRegion> {
        let bpm = self.analyzer.bpm();
        self.update_loop(deck, |loops, position| loops.set_auto_loop(position, beats, bpm))
    }

    pub fn exit_loop(&mut self, deck: DeckId) -> EngineResult<()> {
        self.update_loop(deck, |loops, _| {
            loops.exit_loop();
            Ok(())
        })
    }

    pub fn loop_state(&self, deck: DeckId) -> LoopState {
        self.slot(deck).loops.state()
    }

    /// Cut the active loop into `divisions` slices; returns the slice count
    ///
    /// The new set replaces the previous one on both sides.
    pub fn slice_loop(&mut self, deck: DeckId, divisions: usize) -> EngineResult<usize> {
        let track = self.loaded_track(deck)?;
        let slot = self.slot(deck);
        let region = slot.loops.region().ok_or(LoopError::NotActive)?;
        let set = SliceSet::cut(track.pcm(), region, divisions, slot.generation)?;
        let count = set.len();

        let set = Shared::new(&gc_handle(), set);
        self.send(EngineCommand::SetSlices {
            deck,
            slices: Some(Shared::clone(&set)),
        })?;
        self.graph.attach_source(SourceId::Slices(deck));
        self.decks[deck.index()].slices = Some(set);
        log::debug!(
            "Deck {}: sliced loop {:.3}-{:.3}s into {}",
            deck,
            region.start,
            region.end,
            count
        );
        Ok(count)
    }

    /// Slice with the configured default division count
    pub fn slice_loop_default(&mut self, deck: DeckId) -> EngineResult<usize> {
        self.slice_loop(deck, self.default_divisions)
    }

    /// Fire slice `index`; voices overlap rather than cut each other off
    pub fn trigger_slice(&mut self, deck: DeckId, index: usize) -> EngineResult<()> {
        let count = self
            .slot(deck)
            .current_slices()
            .map(|set| set.len())
            .ok_or(EngineError::NoSlices)?;
        if index >= count {
            return Err(EngineError::InvalidArgument(format!(
                "slice {} of {}",
                index, count
            )));
        }
        self.send(EngineCommand::TriggerSlice { deck, index })
    }

    /// Silence every sounding slice voice
    pub fn stop_slices(&mut self) -> EngineResult<()> {
        self.send(EngineCommand::StopVoices)
    }

    pub fn slices(&self, deck: DeckId) -> Option<&SliceSet> {
        self.slot(deck).current_slices().map(|set| &**set)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Hot cues
    // ═══════════════════════════════════════════════════════════════════════════

    /// Jump to a set cue, or mark the current position into an empty one
    pub fn hot_cue(&mut self, deck: DeckId, slot: u8) -> EngineResult<HotCueAction> {
        self.loaded_track(deck)?;
        match self.slot(deck).hot_cues.get(slot) {
            Some(time) => {
                self.send(EngineCommand::Seek { deck, seconds: time })?;
                Ok(HotCueAction::Jumped(time))
            }
            None => {
                let position = self.position(deck);
                self.decks[deck.index()].hot_cues.press(slot, position)
            }
        }
    }

    /// Store the current position in a cue slot, replacing what was there
    pub fn mark_hot_cue(&mut self, deck: DeckId, slot: u8) -> EngineResult<f64> {
        self.loaded_track(deck)?;
        let position = self.position(deck);
        self.decks[deck.index()].hot_cues.mark(slot, position)?;
        Ok(position)
    }

    pub fn delete_hot_cue(&mut self, deck: DeckId, slot: u8) -> EngineResult<Option<f64>> {
        self.decks[deck.index()].hot_cues.delete(slot)
    }

    pub fn hot_cues(&self, deck: DeckId) -> &HotCues {
        &self.slot(deck).hot_cues
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Tempo and beat grid
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register a tap of the tempo button
    pub fn tap_bpm(&mut self, now: Instant) -> TapOutcome {
        let outcome = self.analyzer.tap(now);
        if let TapOutcome::Bpm(bpm) = outcome {
            log::debug!("Tap tempo: {:.1} BPM", bpm);
        }
        outcome
    }

    /// Type in a BPM (same 40-250 acceptance as taps)
    pub fn set_bpm(&mut self, bpm: f64) -> EngineResult<f64> {
        Ok(self.analyzer.set_bpm(bpm)?)
    }

    pub fn bpm(&self) -> Option<f64> {
        self.analyzer.bpm()
    }

    /// Displayed tempo of a deck: BPM × playback rate
    pub fn deck_tempo(&self, deck: DeckId) -> Option<f64> {
        self.analyzer
            .bpm()
            .map(|bpm| bpm * self.mixer.rate(deck) as f64)
    }

    /// Start offline phase detection of the deck's track at the current BPM
    ///
    /// The result is picked up by [`poll`](Self::poll) and dropped if the
    /// deck has been reloaded in the meantime.
    pub fn analyze(&mut self, deck: DeckId) -> EngineResult<()> {
        let track = self.loaded_track(deck)?.clone();
        let generation = self.slot(deck).generation;
        match self.analyzer.analyze(deck, generation, track) {
            Ok(true) => Ok(()),
            Ok(false) => Err(EngineError::AnalysisUnavailable(
                "no audio backend".to_string(),
            )),
            Err(e) => Err(bpm_error(e)),
        }
    }

    /// Move the deck's grid phase; returns the new beat count
    pub fn set_grid_offset(&mut self, deck: DeckId, seconds: f64) -> EngineResult<usize> {
        let seconds = finite(seconds, "grid offset")?;
        let duration = self.loaded_track(deck)?.pcm().duration();
        self.analyzer
            .set_grid_offset(deck, seconds, duration)
            .map(|grid| grid.len())
            .map_err(bpm_error)
    }

    pub fn grid(&self, deck: DeckId) -> Option<&BeatGrid> {
        self.analyzer.grid(deck)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Mixer and EQ
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn set_crossfader(&mut self, value: f32) -> EngineResult<f32> {
        self.mixer.set_crossfader(value)
    }

    pub fn set_deck_volume(&mut self, deck: DeckId, value: f32) -> EngineResult<f32> {
        self.mixer.set_deck_volume(deck, value)
    }

    pub fn set_deck_mode(&mut self, mode: DeckMode) {
        self.mixer.set_mode(mode);
    }

    /// Give `target` the playback rate of `source`
    pub fn sync_deck(&mut self, source: DeckId, target: DeckId) -> f32 {
        self.mixer.sync_deck(source, target)
    }

    /// Pitch fader in percent; returns the playback rate
    pub fn set_pitch(&mut self, deck: DeckId, percent: f32) -> EngineResult<f32> {
        self.mixer.set_pitch(deck, percent)
    }

    /// Set a board knob by name: gain, bass, mid, treble, color, presence
    pub fn set_mixer_knob(&mut self, which: &str, value: f32) -> EngineResult<f32> {
        self.graph.set_mixer_knob_by_name(which, value)
    }

    /// Graphic EQ band gain; an out-of-range index is ignored (`None`)
    pub fn set_eq_band(&mut self, index: usize, gain_db: f32) -> Option<f32> {
        let applied = self.graph.set_eq_band(index, gain_db);
        if applied.is_none() {
            log::debug!("Ignoring EQ band {}", index);
        }
        applied
    }

    /// Deck 3-band EQ by band name (low, mid, high)
    pub fn set_deck_eq(&mut self, deck: DeckId, band: &str, gain_db: f32) -> EngineResult<f32> {
        let band = DeckEqBand::from_name(band)
            .ok_or_else(|| EngineError::InvalidArgument(format!("unknown EQ band '{}'", band)))?;
        Ok(self.graph.set_deck_eq(deck, band, gain_db))
    }

    pub fn reset_mixer(&mut self) {
        self.graph.reset_mixer();
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    pub fn mixer(&self) -> &DeckMixer {
        &self.mixer
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Effects
    // ═══════════════════════════════════════════════════════════════════════════

    /// Switch an effect insert in or out; the render side crossfades it
    pub fn toggle_effect(&mut self, name: &str, on: bool) -> EngineResult<()> {
        let kind = self.effects.toggle_effect(name, on)?;
        self.graph.set_effect_connected(kind, on);
        Ok(())
    }

    pub fn set_effect_param(&mut self, name: &str, param: &str, value: f32) -> EngineResult<f32> {
        self.effects.set_effect_param(name, param, value)
    }

    pub fn set_filter_type(&mut self, kind: FilterType) {
        self.effects.set_filter_type(kind);
    }

    pub fn effects(&self) -> &EffectsChain {
        &self.effects
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Poll context
    // ═══════════════════════════════════════════════════════════════════════════

    /// Run whatever periodic work is due at `now`
    ///
    /// Visual work refreshes the frequency bins; timer work expires the tap
    /// session and applies finished analysis jobs.
    pub fn poll(&mut self, now: Instant) -> PollOutcome {
        let due = self.scheduler.poll(now);
        let mut outcome = PollOutcome {
            due,
            ..PollOutcome::default()
        };
        if due.visuals {
            self.spectrum.update(&mut self.tap_reader);
        }
        if due.timers {
            outcome.taps_expired = self.analyzer.expire_taps(now);
            outcome.analysis = self.analyzer.poll();
            for event in &outcome.analysis {
                match event {
                    AnalysisEvent::GridReady { deck, beats } => {
                        log::info!("Deck {}: beat grid ready ({} beats)", deck, beats)
                    }
                    AnalysisEvent::Failed { deck, error } => {
                        log::warn!("Deck {}: analysis unavailable: {}", deck, error)
                    }
                    AnalysisEvent::Discarded { .. } => {}
                }
            }
        }
        outcome
    }

    /// Current state for the visualization collaborator
    pub fn snapshot(&self) -> EngineSnapshot {
        let bpm = self.analyzer.bpm();
        let decks = DeckId::ALL.map(|deck| {
            let atomics = &self.deck_atomics[deck.index()];
            let slot = self.slot(deck);
            let rate = self.mixer.rate(deck);
            let grid = self.analyzer.grid(deck);
            DeckSnapshot {
                deck,
                track: slot.track.as_ref().map(|t| t.handle().url.clone()),
                state: atomics.play_state(),
                position: atomics.position_seconds(),
                duration: atomics.duration_seconds(),
                rate,
                pitch: self.mixer.pitch(deck),
                tempo: bpm.map(|b| b * rate as f64),
                loop_bounds: atomics.loop_bounds(),
                grid_beats: grid.map(|g| g.beats().to_vec()).unwrap_or_default(),
                grid_offset: grid.map(BeatGrid::offset),
                volume: self.mixer.volume(deck),
                gain: self.mixer.effective_gain(deck),
                eq: self.graph.deck_eq(deck),
                hot_cues_set: slot
                    .hot_cues
                    .iter()
                    .fold(0u8, |bits, (n, _)| bits | 1 << (n - 1)),
                slice_count: slot.current_slices().map_or(0, |set| set.len()),
            }
        });
        let params = self.graph.params();

        EngineSnapshot {
            bpm,
            tap_count: self.analyzer.tap_count(),
            decks,
            mixer: *self.graph.mixer_state(),
            eq_bands: *self.graph.eq_gains(),
            crossfader: self.mixer.crossfader(),
            crossfader_zone: self.mixer.crossfader_zone(),
            deck_mode: self.mixer.mode(),
            vu: params.vu.levels(),
            spectrum: self.spectrum.bins().to_vec(),
            active_voices: params
                .active_voices
                .load(std::sync::atomic::Ordering::Relaxed),
            silent: self.is_silent(),
        }
    }
}
