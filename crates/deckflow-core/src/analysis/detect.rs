//! Offline energy-based beat detector
//!
//! Measures beat phase, not tempo: the BPM must already be known. The kick
//! band is isolated with a low-pass, RMS energy is taken over half-beat
//! windows, and a window marks a beat when it exceeds a global threshold
//! and more than the refractory time has passed since the previous beat. Raw onsets
//! are then quantized into a [`BeatGrid`].

use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};

use super::grid::BeatGrid;
use super::AnalysisError;
use crate::graph::biquad::{BiquadCoeffs, BiquadState, FilterType};
use crate::track::PcmBuffer;

/// Windows processed between cancellation checks
const CANCEL_CHECK_INTERVAL: usize = 256;

/// Detector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatDetectionConfig {
    /// Kick isolation low-pass cutoff (Hz)
    pub lowpass_hz: f32,
    pub lowpass_q: f32,
    /// Energy window length in beats (hop is half a window)
    pub window_beats: f64,
    /// Threshold as a multiple of the mean window energy
    pub threshold_ratio: f32,
    /// Minimum spacing between marked beats, in beats
    pub refractory_beats: f64,
}

impl Default for BeatDetectionConfig {
    fn default() -> Self {
        Self {
            lowpass_hz: 150.0,
            lowpass_q: std::f32::consts::FRAC_1_SQRT_2,
            window_beats: 0.5,
            threshold_ratio: 1.5,
            refractory_beats: 0.7,
        }
    }
}

fn check_cancel(cancel: &AtomicBool) -> Result<(), AnalysisError> {
    if cancel.load(Ordering::Relaxed) {
        Err(AnalysisError::Cancelled)
    } else {
        Ok(())
    }
}

/// Low-pass a mono signal in place
fn isolate_kick(samples: &mut [f32], sample_rate: u32, config: &BeatDetectionConfig) {
    let coeffs = BiquadCoeffs::design(
        FilterType::Lowpass,
        config.lowpass_hz,
        config.lowpass_q,
        0.0,
        sample_rate as f32,
    );
    let mut state = BiquadState::default();
    for s in samples.iter_mut() {
        *s = state.process_mono(*s, &coeffs);
    }
}

fn rms(window: &[f32]) -> f32 {
    if window.is_empty() {
        return 0.0;
    }
    (window.iter().map(|s| s * s).sum::<f32>() / window.len() as f32).sqrt()
}

/// Raw onset times (seconds) of a filtered mono signal
pub fn detect_onsets(
    samples: &[f32],
    sample_rate: u32,
    bpm: f64,
    config: &BeatDetectionConfig,
    cancel: &AtomicBool,
) -> Result<Vec<f64>, AnalysisError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::NoBpm);
    }
    let period = 60.0 / bpm;
    let window = ((config.window_beats * period * sample_rate as f64).round() as usize).max(2);
    let hop = (window / 2).max(1);
    if samples.len() < window {
        return Ok(Vec::new());
    }

    let starts: Vec<usize> = (0..=samples.len() - window).step_by(hop).collect();
    let mut energies = Vec::with_capacity(starts.len());
    for (i, start) in starts.iter().enumerate() {
        if i % CANCEL_CHECK_INTERVAL == 0 {
            check_cancel(cancel)?;
        }
        energies.push(rms(&samples[*start..*start + window]));
    }

    // Mean over non-overlapping windows, independent of the hop
    let tiles = samples.len() / window;
    let mean = samples.chunks_exact(window).map(rms).sum::<f32>() / tiles.max(1) as f32;
    let threshold = mean * config.threshold_ratio;
    if threshold <= 0.0 {
        return Ok(Vec::new());
    }

    let refractory = config.refractory_beats * period;
    let mut onsets = Vec::new();
    let mut last: Option<f64> = None;
    for (start, energy) in starts.iter().zip(&energies) {
        if *energy <= threshold {
            continue;
        }
        // A window is stamped at its centre
        let t = (*start + window / 2) as f64 / sample_rate as f64;
        if last.map_or(true, |prev| t - prev > refractory) {
            onsets.push(t);
            last = Some(t);
        }
    }
    Ok(onsets)
}

/// Full pass over decoded PCM: kick isolation, onsets, quantized grid
pub fn detect_beats(
    pcm: &PcmBuffer,
    bpm: f64,
    config: &BeatDetectionConfig,
    cancel: &AtomicBool,
) -> Result<BeatGrid, AnalysisError> {
    if !(bpm.is_finite() && bpm > 0.0) {
        return Err(AnalysisError::NoBpm);
    }
    if pcm.frames() == 0 {
        return Err(AnalysisError::EmptyPcm);
    }
    let mut mono = pcm.mono_mixdown();
    check_cancel(cancel)?;
    isolate_kick(&mut mono, pcm.sample_rate(), config);
    let onsets = detect_onsets(&mono, pcm.sample_rate(), bpm, config, cancel)?;
    check_cancel(cancel)?;
    BeatGrid::from_onsets(bpm, &onsets)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const SR: u32 = 8000;

    /// Decaying 60 Hz kicks at `first + k × 60/bpm` over a quiet 3 kHz tone
    pub(crate) fn kick_track(bpm: f64, first: f64, seconds: f64, sample_rate: u32) -> PcmBuffer {
        let len = (seconds * sample_rate as f64) as usize;
        let period = 60.0 / bpm;
        let mut samples = vec![0.0f32; len];
        let mut t = first;
        while t < seconds {
            let start = (t * sample_rate as f64) as usize;
            for i in 0..(sample_rate as usize / 8) {
                if let Some(s) = samples.get_mut(start + i) {
                    let x = i as f32 / sample_rate as f32;
                    *s += (2.0 * std::f32::consts::PI * 60.0 * x).sin() * (-x / 0.03).exp() * 0.9;
                }
            }
            t += period;
        }
        for (i, s) in samples.iter_mut().enumerate() {
            // 3 kHz tick, removed by the kick low-pass
            *s += (2.0 * std::f32::consts::PI * 3000.0 * i as f32 / sample_rate as f32).sin() * 0.05;
        }
        PcmBuffer::new(vec![samples.clone(), samples], sample_rate).unwrap()
    }

    #[test]
    fn test_grid_locks_to_kick_phase() {
        let pcm = kick_track(120.0, 0.3, 12.0, SR);
        let cancel = AtomicBool::new(false);
        let grid = detect_beats(&pcm, 120.0, &BeatDetectionConfig::default(), &cancel).unwrap();

        assert!(grid.len() >= 20, "only {} beats", grid.len());
        // Phase resolution is one hop (quarter beat)
        let hop = 0.125;
        let phase_error = (grid.offset() - 0.3).abs();
        assert!(phase_error <= hop + 1e-9, "offset {}", grid.offset());
        for t in grid.beats() {
            let k = (t - grid.offset()) / grid.period();
            assert!((k - k.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_refractory_prevents_double_triggers() {
        let pcm = kick_track(120.0, 0.3, 12.0, SR);
        let mut mono = pcm.mono_mixdown();
        let config = BeatDetectionConfig::default();
        isolate_kick(&mut mono, SR, &config);
        let onsets = detect_onsets(&mono, SR, 120.0, &config, &AtomicBool::new(false)).unwrap();
        assert!(onsets.windows(2).all(|w| w[1] - w[0] >= 0.35 - 1e-9));
    }

    #[test]
    fn test_onset_exactly_one_refractory_later_is_dropped() {
        // 60 BPM at 8 Hz: 4-sample windows, 2-sample hop, 1 s refractory
        let config = BeatDetectionConfig {
            threshold_ratio: 2.4,
            refractory_beats: 1.0,
            ..BeatDetectionConfig::default()
        };
        let mut samples = vec![0.0f32; 32];
        samples[0..4].fill(1.0);
        samples[8..12].fill(1.0);
        samples[20..24].fill(1.0);
        let onsets = detect_onsets(&samples, 8, 60.0, &config, &AtomicBool::new(false)).unwrap();
        // Bursts stamped at 0.25, 1.25 and 2.75 s
        assert_eq!(onsets, vec![0.25, 2.75]);
    }

    #[test]
    fn test_odd_window_at_44100() {
        // 120 BPM at 44.1 kHz gives a 11025-sample window
        let config = BeatDetectionConfig::default();
        let window = (config.window_beats * 0.5 * 44100.0).round() as usize;
        assert_eq!(window % 2, 1);

        let cancel = AtomicBool::new(false);
        for first in [0.0, 0.3] {
            let pcm = kick_track(120.0, first, 12.0, 44100);
            let grid = detect_beats(&pcm, 120.0, &config, &cancel).unwrap();
            assert!(grid.len() >= 20, "first kick {}: only {} beats", first, grid.len());
            assert!((grid.period() - 0.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_requires_bpm() {
        let pcm = kick_track(120.0, 0.0, 2.0, SR);
        let cancel = AtomicBool::new(false);
        assert_eq!(
            detect_beats(&pcm, 0.0, &BeatDetectionConfig::default(), &cancel),
            Err(AnalysisError::NoBpm)
        );
    }

    #[test]
    fn test_empty_pcm() {
        let pcm = PcmBuffer::mono(Vec::new(), SR).unwrap();
        let cancel = AtomicBool::new(false);
        assert_eq!(
            detect_beats(&pcm, 120.0, &BeatDetectionConfig::default(), &cancel),
            Err(AnalysisError::EmptyPcm)
        );
    }

    #[test]
    fn test_cancelled_pass() {
        let pcm = kick_track(120.0, 0.0, 4.0, SR);
        let cancel = AtomicBool::new(true);
        assert_eq!(
            detect_beats(&pcm, 120.0, &BeatDetectionConfig::default(), &cancel),
            Err(AnalysisError::Cancelled)
        );
    }

    #[test]
    fn test_silence_gives_empty_grid() {
        let pcm = PcmBuffer::mono(vec![0.0; SR as usize * 4], SR).unwrap();
        let cancel = AtomicBool::new(false);
        let grid = detect_beats(&pcm, 120.0, &BeatDetectionConfig::default(), &cancel).unwrap();
        assert!(grid.is_empty());
    }
}
