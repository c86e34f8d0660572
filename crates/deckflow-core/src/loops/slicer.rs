//! Loop slicer
//!
//! Cuts an active loop into N equal slices and copies each slice's PCM into
//! its own buffer. A [`SliceSet`] is immutable and tagged with the deck load
//! generation it was cut from; a new `slice` command replaces it wholesale.

use super::loop_engine::LoopRegion;
use super::LoopError;
use crate::track::PcmBuffer;
use crate::types::StereoSample;

/// One slice: planar PCM copied out of the loop
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    channels: Vec<Vec<f32>>,
    /// First frame of the slice in the source track
    source_start: usize,
}

impl Slice {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    pub fn source_start(&self) -> usize {
        self.source_start
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Read one frame as stereo (mono duplicated)
    #[inline]
    pub fn frame(&self, index: usize) -> StereoSample {
        match self.channels.as_slice() {
            [mono] => StereoSample::mono(mono.get(index).copied().unwrap_or(0.0)),
            [left, right, ..] => StereoSample::new(
                left.get(index).copied().unwrap_or(0.0),
                right.get(index).copied().unwrap_or(0.0),
            ),
            [] => StereoSample::silence(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SliceSet {
    slices: Vec<Slice>,
    generation: u64,
    sample_rate: u32,
}

impl SliceSet {
    /// Cut `region` of `pcm` into `divisions` slices
    ///
    /// Every slice is `loop_len / divisions` frames long except the last,
    /// which also takes the remainder.
    pub fn cut(pcm: &PcmBuffer, region: LoopRegion, divisions: usize, generation: u64) -> Result<Self, LoopError> {
        if divisions == 0 {
            return Err(LoopError::InvalidDivisions(divisions));
        }
        let (start, end) = region.frames(pcm.sample_rate());
        let end = end.min(pcm.frames());
        let loop_len = end.saturating_sub(start);
        if loop_len < divisions {
            return Err(LoopError::LoopTooShort {
                frames: loop_len,
                divisions,
            });
        }

        let slice_len = loop_len / divisions;
        let slices = (0..divisions)
            .map(|i| {
                let s = start + i * slice_len;
                let e = if i + 1 == divisions { end } else { s + slice_len };
                Slice {
                    channels: pcm.copy_range(s, e),
                    source_start: s,
                }
            })
            .collect();

        Ok(Self {
            slices,
            generation,
            sample_rate: pcm.sample_rate(),
        })
    }

    pub fn len(&self) -> usize {
        self.slices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    pub fn slice(&self, index: usize) -> Option<&Slice> {
        self.slices.get(index)
    }

    pub fn slices(&self) -> &[Slice] {
        &self.slices
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frames across all slices
    pub fn total_frames(&self) -> usize {
        self.slices.iter().map(Slice::frames).sum()
    }

    /// Slice durations in seconds
    pub fn durations(&self) -> Vec<f64> {
        self.slices
            .iter()
            .map(|s| s.frames() as f64 / self.sample_rate as f64)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_pcm(seconds: usize, sample_rate: u32) -> PcmBuffer {
        let len = seconds * sample_rate as usize;
        let left: Vec<f32> = (0..len).map(|i| i as f32).collect();
        let right: Vec<f32> = (0..len).map(|i| -(i as f32)).collect();
        PcmBuffer::new(vec![left, right], sample_rate).unwrap()
    }

    #[test]
    fn test_four_one_second_slices() {
        let pcm = ramp_pcm(20, 1000);
        let region = LoopRegion::new(10.0, 14.0).unwrap();
        let set = SliceSet::cut(&pcm, region, 4, 1).unwrap();
        assert_eq!(set.len(), 4);
        assert_eq!(set.durations(), vec![1.0; 4]);
        assert_eq!(set.slice(2).unwrap().source_start(), 12_000);
    }

    #[test]
    fn test_slices_reconstruct_loop() {
        let pcm = ramp_pcm(5, 1000);
        let region = LoopRegion::new(0.5, 3.2).unwrap();
        for n in [1, 3, 7, 16] {
            let set = SliceSet::cut(&pcm, region, n, 0).unwrap();
            assert_eq!(set.len(), n);
            assert_eq!(set.total_frames(), 2700);

            let (start, end) = region.frames(1000);
            let expected = pcm.copy_range(start, end);
            for ch in 0..2 {
                let joined: Vec<f32> = set
                    .slices()
                    .iter()
                    .flat_map(|s| s.channel(ch).unwrap().iter().copied())
                    .collect();
                assert_eq!(joined, expected[ch]);
            }

            let lens: Vec<usize> = set.slices().iter().map(Slice::frames).collect();
            let base = 2700 / n;
            assert!(lens[..n - 1].iter().all(|l| *l == base));
            assert_eq!(lens[n - 1], base + 2700 % n);
        }
    }

    #[test]
    fn test_zero_divisions() {
        let pcm = ramp_pcm(2, 1000);
        let region = LoopRegion::new(0.0, 1.0).unwrap();
        assert_eq!(SliceSet::cut(&pcm, region, 0, 0).err(), Some(LoopError::InvalidDivisions(0)));
    }

    #[test]
    fn test_loop_past_track_end_is_clamped() {
        let pcm = ramp_pcm(2, 1000);
        let region = LoopRegion::new(1.5, 3.0).unwrap();
        let set = SliceSet::cut(&pcm, region, 2, 0).unwrap();
        assert_eq!(set.total_frames(), 500);
    }

    #[test]
    fn test_mono_slice_frame_is_duplicated() {
        let pcm = PcmBuffer::mono(vec![0.25; 100], 100).unwrap();
        let set = SliceSet::cut(&pcm, LoopRegion::new(0.0, 1.0).unwrap(), 2, 0).unwrap();
        assert_eq!(set.slice(0).unwrap().frame(3), StereoSample::mono(0.25));
    }
}
