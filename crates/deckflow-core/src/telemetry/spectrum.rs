//! Frequency-bin snapshot of the master output
//!
//! Reads the newest `fft_size` samples from the analysis tap, applies a
//! Blackman window and a forward real FFT, smooths magnitudes over time and
//! maps them to bytes between `min_db` (0) and `max_db` (255).

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config::SpectrumConfig;
use crate::graph::TapReader;

pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    fft_size: usize,
    window: Vec<f32>,
    /// Newest tap samples, at most `fft_size`
    history: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Smoothed linear magnitude per bin
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
}

impl SpectrumAnalyzer {
    /// FFT sizes are rounded up to a power of two (minimum 32)
    pub fn new(config: &SpectrumConfig) -> Self {
        let fft_size = config.fft_size.max(32).next_power_of_two();
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        let bins = fft_size / 2;

        let (min_db, max_db) = if config.max_db > config.min_db {
            (config.min_db, config.max_db)
        } else {
            log::warn!(
                "Spectrum range {}..{} dB is empty, using -100..-30",
                config.min_db,
                config.max_db
            );
            (-100.0, -30.0)
        };

        Self {
            fft,
            fft_size,
            window: blackman(fft_size),
            history: Vec::with_capacity(fft_size * 2),
            frame: vec![0.0; fft_size],
            spectrum,
            scratch,
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_db,
            max_db,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.bytes.len()
    }

    /// Pull pending tap samples and recompute the bins
    pub fn update(&mut self, reader: &mut TapReader) -> &[u8] {
        reader.drain_into(&mut self.history, self.fft_size);
        self.analyze()
    }

    /// Recompute the bins from the newest samples in `samples`
    pub fn update_from(&mut self, samples: &[f32]) -> &[u8] {
        self.history.extend_from_slice(samples);
        if self.history.len() > self.fft_size {
            self.history.drain(..self.history.len() - self.fft_size);
        }
        self.analyze()
    }

    /// Last computed bins
    pub fn bins(&self) -> &[u8] {
        &self.bytes
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.smoothed.iter_mut().for_each(|m| *m = 0.0);
        self.bytes.iter_mut().for_each(|b| *b = 0);
    }

    fn analyze(&mut self) -> &[u8] {
        // Left-pad with silence until a full frame has arrived
        let pad = self.fft_size - self.history.len();
        self.frame[..pad].iter_mut().for_each(|s| *s = 0.0);
        for (i, sample) in self.history.iter().enumerate() {
            self.frame[pad + i] = sample * self.window[pad + i];
        }

        if let Err(e) = self
            .fft
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
        {
            log::warn!("Spectrum FFT failed: {:?}", e);
            return &self.bytes;
        }

        let norm = 1.0 / self.fft_size as f32;
        let range = self.max_db - self.min_db;
        for ((smoothed, byte), bin) in self
            .smoothed
            .iter_mut()
            .zip(self.bytes.iter_mut())
            .zip(self.spectrum.iter())
        {
            let magnitude = bin.norm() * norm;
            *smoothed = self.smoothing * *smoothed + (1.0 - self.smoothing) * magnitude;
            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - self.min_db) / range;
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
        &self.bytes
    }
}

/// Classic Blackman window (a0 = 0.42, a1 = 0.5, a2 = 0.08)
fn blackman(size: usize) -> Vec<f32> {
    let n = size as f32;
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / n;
            0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
        })
        .collect()
}
