//! Beat grid: BPM, phase offset and the beat timestamps derived from them
//!
//! Every timestamp is `offset + k × period` for a non-negative integer `k`,
//! with `offset` in `[0, period)`. Grids are immutable; any change (a new
//! analysis pass, an offset nudge) builds a new grid.

use super::AnalysisError;

#[derive(Debug, Clone, PartialEq)]
pub struct BeatGrid {
    bpm: f64,
    offset: f64,
    beats: Vec<f64>,
}

impl BeatGrid {
    /// Build a grid from explicit timestamps, validating the invariants
    pub fn new(bpm: f64, offset: f64, beats: Vec<f64>) -> Result<Self, AnalysisError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AnalysisError::NoBpm);
        }
        if beats.windows(2).any(|w| w[1] <= w[0]) {
            return Err(AnalysisError::InvalidGrid(
                "beat timestamps must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { bpm, offset, beats })
    }

    /// Beat period in seconds
    #[inline]
    pub fn period_for(bpm: f64) -> f64 {
        60.0 / bpm
    }

    /// Quantize raw onsets onto a grid
    ///
    /// The offset is the first onset modulo the period; each onset snaps to
    /// the nearest `offset + k × period`, duplicates are removed and the
    /// result is ascending.
    pub fn from_onsets(bpm: f64, onsets: &[f64]) -> Result<Self, AnalysisError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AnalysisError::NoBpm);
        }
        let period = Self::period_for(bpm);
        let Some(first) = onsets.iter().copied().find(|t| t.is_finite() && *t >= 0.0) else {
            return Self::new(bpm, 0.0, Vec::new());
        };
        let offset = first.rem_euclid(period);

        let mut indices: Vec<u64> = onsets
            .iter()
            .filter(|t| t.is_finite() && **t >= 0.0)
            .map(|t| ((t - offset) / period).round().max(0.0) as u64)
            .collect();
        indices.sort_unstable();
        indices.dedup();

        let beats = indices.into_iter().map(|k| offset + k as f64 * period).collect();
        Self::new(bpm, offset, beats)
    }

    /// A regular grid covering `[0, duration]`
    pub fn regular(bpm: f64, offset: f64, duration: f64) -> Result<Self, AnalysisError> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(AnalysisError::NoBpm);
        }
        let period = Self::period_for(bpm);
        let offset = offset.rem_euclid(period);
        let count = if duration >= offset {
            ((duration - offset) / period).floor() as u64 + 1
        } else {
            0
        };
        let beats = (0..count).map(|k| offset + k as f64 * period).collect();
        Self::new(bpm, offset, beats)
    }

    /// New grid with the phase moved to `offset`, spanning the same range
    ///
    /// Beats keep their index relative to the old offset, so a small nudge
    /// moves every line by the same amount. Lines that would fall before
    /// zero are dropped.
    pub fn with_offset(&self, offset: f64) -> Result<Self, AnalysisError> {
        let period = self.period();
        let delta = offset - self.offset;
        let shifted: Vec<f64> = self
            .beats
            .iter()
            .map(|t| t + delta)
            .filter(|t| *t >= 0.0)
            .collect();
        if shifted.is_empty() {
            return Self::new(self.bpm, offset.rem_euclid(period), Vec::new());
        }
        let new_offset = offset.rem_euclid(period);
        let mut indices: Vec<u64> = shifted
            .iter()
            .map(|t| ((t - new_offset) / period).round().max(0.0) as u64)
            .collect();
        indices.dedup();
        let beats = indices
            .into_iter()
            .map(|k| new_offset + k as f64 * period)
            .collect();
        Self::new(self.bpm, new_offset, beats)
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn period(&self) -> f64 {
        Self::period_for(self.bpm)
    }

    pub fn beats(&self) -> &[f64] {
        &self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Grid line closest to `time` (on the infinite grid)
    pub fn nearest_line(&self, time: f64) -> f64 {
        let period = self.period();
        let k = ((time - self.offset) / period).round().max(0.0);
        self.offset + k * period
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_on_grid(grid: &BeatGrid) {
        for t in grid.beats() {
            let k = (t - grid.offset()) / grid.period();
            assert!((k - k.round()).abs() < 1e-9, "{} is off-grid (k = {})", t, k);
        }
        assert!(grid.beats().windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_onsets_snap_to_phase_of_first() {
        let onsets = [0.26, 0.74, 1.27, 1.25, 2.24, 2.76];
        let grid = BeatGrid::from_onsets(120.0, &onsets).unwrap();
        assert!((grid.offset() - 0.26).abs() < 1e-12);
        assert_eq!(grid.len(), 5);
        assert_on_grid(&grid);
        assert!((grid.beats()[1] - 0.76).abs() < 1e-9);
    }

    #[test]
    fn test_unsorted_onsets_are_sorted() {
        let grid = BeatGrid::from_onsets(100.0, &[3.0, 0.6, 1.8, 0.6]).unwrap();
        assert_on_grid(&grid);
        assert_eq!(grid.len(), 3);
    }

    #[test]
    fn test_no_bpm_is_rejected() {
        assert_eq!(BeatGrid::from_onsets(0.0, &[1.0]), Err(AnalysisError::NoBpm));
        assert_eq!(BeatGrid::regular(f64::NAN, 0.0, 10.0), Err(AnalysisError::NoBpm));
    }

    #[test]
    fn test_empty_onsets_give_empty_grid() {
        let grid = BeatGrid::from_onsets(120.0, &[]).unwrap();
        assert!(grid.is_empty());
    }

    #[test]
    fn test_regular_grid() {
        let grid = BeatGrid::regular(120.0, 0.1, 2.0).unwrap();
        assert_eq!(grid.len(), 4);
        assert_on_grid(&grid);
        assert!((grid.beats()[3] - 1.6).abs() < 1e-12);
    }

    #[test]
    fn test_offset_nudge_moves_every_line() {
        let grid = BeatGrid::regular(120.0, 0.2, 4.0).unwrap();
        let nudged = grid.with_offset(0.25).unwrap();
        assert_eq!(nudged.len(), grid.len());
        assert_on_grid(&nudged);
        for (a, b) in grid.beats().iter().zip(nudged.beats()) {
            assert!((b - a - 0.05).abs() < 1e-9);
        }
    }

    #[test]
    fn test_strictly_increasing_invariant() {
        assert!(BeatGrid::new(120.0, 0.0, vec![0.0, 0.5, 0.5]).is_err());
    }
}
