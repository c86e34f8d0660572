//! Background beat analysis
//!
//! Owns a small rayon pool. Each deck has at most one job in flight; a new
//! request (or a track change) raises the previous job's cancel flag.
//! Results come back over a crossbeam channel tagged with the deck and the
//! load generation they were computed for, so the caller can drop results
//! that belong to a track that is no longer loaded.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::detect::{detect_beats, BeatDetectionConfig};
use super::grid::BeatGrid;
use super::AnalysisError;
use crate::track::TrackRef;
use crate::types::{DeckId, NUM_DECKS};

/// Outcome of one analysis job
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub deck: DeckId,
    /// Deck load generation the job was started for
    pub generation: u64,
    pub outcome: Result<BeatGrid, AnalysisError>,
    pub elapsed: Duration,
}

pub struct AnalysisService {
    thread_pool: rayon::ThreadPool,
    config: BeatDetectionConfig,
    /// Generation and cancel flag of the job in flight per deck
    jobs: [Option<(u64, Arc<AtomicBool>)>; NUM_DECKS],
    results_tx: Sender<AnalysisResult>,
    results_rx: Receiver<AnalysisResult>,
}

impl AnalysisService {
    /// Create the service with its worker pool
    pub fn new(threads: usize, config: BeatDetectionConfig) -> Self {
        let thread_pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(|i| format!("beat-analysis-{}", i))
            .build()
            .expect("Failed to create analysis thread pool");
        let (results_tx, results_rx) = unbounded();

        Self {
            thread_pool,
            config,
            jobs: Default::default(),
            results_tx,
            results_rx,
        }
    }

    /// Start detecting the beat grid of `track` at `bpm`
    ///
    /// Any job still running for this deck is cancelled first.
    pub fn submit(&mut self, deck: DeckId, generation: u64, track: TrackRef, bpm: f64) {
        self.cancel(deck);

        let cancel = Arc::new(AtomicBool::new(false));
        self.jobs[deck.index()] = Some((generation, Arc::clone(&cancel)));
        let tx = self.results_tx.clone();
        let config = self.config.clone();

        log::info!(
            "Beat analysis started: deck {} ({}) at {} BPM",
            deck,
            track.handle().url,
            bpm
        );
        self.thread_pool.spawn(move || {
            let start = Instant::now();
            let outcome = detect_beats(track.pcm(), bpm, &config, &cancel);
            let elapsed = start.elapsed();
            match &outcome {
                Ok(grid) => log::info!(
                    "Beat analysis finished: deck {}, {} beats in {:?}",
                    deck,
                    grid.len(),
                    elapsed
                ),
                Err(AnalysisError::Cancelled) => {
                    log::debug!("Beat analysis cancelled: deck {}", deck)
                }
                Err(e) => log::warn!("Beat analysis failed on deck {}: {}", deck, e),
            }
            let _ = tx.send(AnalysisResult {
                deck,
                generation,
                outcome,
                elapsed,
            });
        });
    }

    /// Raise the cancel flag of the deck's job, if any
    pub fn cancel(&mut self, deck: DeckId) {
        if let Some((_, flag)) = self.jobs[deck.index()].take() {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Collect finished results without blocking
    pub fn drain(&mut self) -> Vec<AnalysisResult> {
        let results: Vec<AnalysisResult> = self.results_rx.try_iter().collect();
        for result in &results {
            self.finish(result);
        }
        results
    }

    /// Wait up to `timeout` for the next result
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<AnalysisResult> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(result) => {
                self.finish(&result);
                Some(result)
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Forget a finished job unless a newer job replaced it
    fn finish(&mut self, result: &AnalysisResult) {
        let slot = &mut self.jobs[result.deck.index()];
        if matches!(slot, Some((generation, _)) if *generation == result.generation) {
            *slot = None;
        }
    }

    /// Whether a job is registered for the deck
    pub fn is_running(&self, deck: DeckId) -> bool {
        self.jobs[deck.index()].is_some()
    }

    pub fn config(&self) -> &BeatDetectionConfig {
        &self.config
    }
}
