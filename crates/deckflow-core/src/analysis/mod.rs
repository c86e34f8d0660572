//! Tempo and beat-grid analysis
//!
//! Two estimators feed one BPM value: the tap estimator (always on, cheap)
//! and the offline energy detector, which measures the phase of a known
//! tempo over a whole decoded track on a background pool.
//!
//! [`BeatAnalyzer`] is the control-side facade. It owns the BPM, one grid per
//! deck and the analysis service, and only applies a finished job if the
//! deck still holds the track the job was started for.

pub mod detect;
pub mod grid;
pub mod service;
pub mod tap_tempo;

use std::time::Instant;

use thiserror::Error;

use crate::track::TrackRef;
use crate::types::{DeckId, NUM_DECKS};

pub use detect::{detect_beats, BeatDetectionConfig};
pub use grid::BeatGrid;
pub use service::{AnalysisResult, AnalysisService};
pub use tap_tempo::{TapOutcome, TapTempo, TapTempoConfig};

/// Analysis failures
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// Phase detection needs a BPM beforehand
    #[error("No BPM set")]
    NoBpm,

    #[error("BPM {0} is outside the accepted range")]
    BpmOutOfRange(f64),

    #[error("Track has no audio")]
    EmptyPcm,

    #[error("Analysis cancelled")]
    Cancelled,

    #[error("Invalid beat grid: {0}")]
    InvalidGrid(String),
}

/// What happened to a finished analysis job
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    /// A fresh grid was applied to the deck
    GridReady { deck: DeckId, beats: usize },
    /// The job failed; the deck's grid stays empty
    Failed { deck: DeckId, error: AnalysisError },
    /// The deck was reloaded while the job ran; result dropped
    Discarded { deck: DeckId, generation: u64 },
}

pub struct BeatAnalyzer {
    tap: TapTempo,
    /// `None` when offline analysis is unavailable (silent mode)
    service: Option<AnalysisService>,
    grids: [Option<BeatGrid>; NUM_DECKS],
    /// Current load generation per deck
    generations: [u64; NUM_DECKS],
}

impl BeatAnalyzer {
    pub fn new(tap: TapTempoConfig, service: Option<AnalysisService>) -> Self {
        Self {
            tap: TapTempo::new(tap),
            service,
            grids: Default::default(),
            generations: [0; NUM_DECKS],
        }
    }

    /// Register a tap
    pub fn tap(&mut self, now: Instant) -> TapOutcome {
        self.tap.tap(now)
    }

    /// Drop stale taps (timer tick)
    pub fn expire_taps(&mut self, now: Instant) -> bool {
        self.tap.expire(now)
    }

    /// Set the BPM directly
    pub fn set_bpm(&mut self, bpm: f64) -> Result<f64, AnalysisError> {
        self.tap.set_bpm(bpm)
    }

    pub fn bpm(&self) -> Option<f64> {
        self.tap.bpm()
    }

    pub fn tap_count(&self) -> usize {
        self.tap.tap_count()
    }

    /// Whether offline analysis can run
    pub fn is_available(&self) -> bool {
        self.service.is_some()
    }

    /// A deck got a new track: cancel its job and clear its grid
    pub fn track_changed(&mut self, deck: DeckId, generation: u64) {
        self.generations[deck.index()] = generation;
        self.grids[deck.index()] = None;
        if let Some(service) = self.service.as_mut() {
            service.cancel(deck);
        }
    }

    /// Start phase detection of the deck's track at the current BPM
    ///
    /// Returns false when offline analysis is unavailable.
    pub fn analyze(&mut self, deck: DeckId, generation: u64, track: TrackRef) -> Result<bool, AnalysisError> {
        let bpm = self.bpm().ok_or(AnalysisError::NoBpm)?;
        let Some(service) = self.service.as_mut() else {
            return Ok(false);
        };
        self.generations[deck.index()] = generation;
        service.submit(deck, generation, track, bpm);
        Ok(true)
    }

    /// Pick up finished jobs, applying only those for the current track
    pub fn poll(&mut self) -> Vec<AnalysisEvent> {
        let Some(service) = self.service.as_mut() else {
            return Vec::new();
        };
        let results = service.drain();
        results.into_iter().map(|r| self.apply(r)).collect()
    }

    /// Apply one result (or discard it if stale)
    pub fn apply(&mut self, result: AnalysisResult) -> AnalysisEvent {
        let deck = result.deck;
        if result.generation != self.generations[deck.index()] {
            log::info!(
                "Discarding stale analysis for deck {} (generation {}, current {})",
                deck,
                result.generation,
                self.generations[deck.index()]
            );
            return AnalysisEvent::Discarded {
                deck,
                generation: result.generation,
            };
        }
        match result.outcome {
            Ok(grid) => {
                let beats = grid.len();
                self.grids[deck.index()] = Some(grid);
                AnalysisEvent::GridReady { deck, beats }
            }
            Err(error) => {
                self.grids[deck.index()] = None;
                AnalysisEvent::Failed { deck, error }
            }
        }
    }

    pub fn grid(&self, deck: DeckId) -> Option<&BeatGrid> {
        self.grids[deck.index()].as_ref()
    }

    /// Move the deck's grid phase; the grid is rebuilt wholesale
    ///
    /// Without a detected grid a regular grid over `duration` is created
    /// from the current BPM.
    pub fn set_grid_offset(&mut self, deck: DeckId, offset: f64, duration: f64) -> Result<&BeatGrid, AnalysisError> {
        let grid = match &self.grids[deck.index()] {
            Some(grid) => grid.with_offset(offset)?,
            None => {
                let bpm = self.bpm().ok_or(AnalysisError::NoBpm)?;
                BeatGrid::regular(bpm, offset, duration)?
            }
        };
        Ok(self.grids[deck.index()].insert(grid))
    }

    pub fn service_mut(&mut self) -> Option<&mut AnalysisService> {
        self.service.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn result(deck: DeckId, generation: u64) -> AnalysisResult {
        AnalysisResult {
            deck,
            generation,
            outcome: BeatGrid::regular(120.0, 0.0, 4.0),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_stale_result_is_discarded() {
        let mut analyzer = BeatAnalyzer::new(TapTempoConfig::default(), None);
        analyzer.track_changed(DeckId::A, 1);
        analyzer.track_changed(DeckId::A, 2);

        let event = analyzer.apply(result(DeckId::A, 1));
        assert_eq!(event, AnalysisEvent::Discarded { deck: DeckId::A, generation: 1 });
        assert!(analyzer.grid(DeckId::A).is_none());

        let event = analyzer.apply(result(DeckId::A, 2));
        assert_eq!(event, AnalysisEvent::GridReady { deck: DeckId::A, beats: 9 });
        assert!(analyzer.grid(DeckId::A).is_some());
    }

    #[test]
    fn test_analyze_requires_bpm() {
        let mut analyzer = BeatAnalyzer::new(TapTempoConfig::default(), None);
        let track = TrackRef::new(
            crate::track::TrackHandle::new("t", 1.0),
            crate::track::PcmBuffer::mono(vec![0.0; 100], 8000).unwrap(),
        );
        assert_eq!(analyzer.analyze(DeckId::A, 1, track.clone()), Err(AnalysisError::NoBpm));

        analyzer.set_bpm(120.0).unwrap();
        // No service: accepted but not run
        assert_eq!(analyzer.analyze(DeckId::A, 1, track), Ok(false));
    }

    #[test]
    fn test_grid_offset_without_detection() {
        let mut analyzer = BeatAnalyzer::new(TapTempoConfig::default(), None);
        assert_eq!(
            analyzer.set_grid_offset(DeckId::B, 0.1, 2.0).err(),
            Some(AnalysisError::NoBpm)
        );
        analyzer.set_bpm(120.0).unwrap();
        let grid = analyzer.set_grid_offset(DeckId::B, 0.1, 2.0).unwrap();
        assert_eq!(grid.len(), 4);
    }

    #[test]
    fn test_track_change_clears_grid() {
        let mut analyzer = BeatAnalyzer::new(TapTempoConfig::default(), None);
        analyzer.apply(result(DeckId::C, 0));
        assert!(analyzer.grid(DeckId::C).is_some());
        analyzer.track_changed(DeckId::C, 1);
        assert!(analyzer.grid(DeckId::C).is_none());
    }
}
