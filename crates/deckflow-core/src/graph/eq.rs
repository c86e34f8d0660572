//! Equalizers: the 10-band graphic EQ bank and the per-deck 3-band EQ

use std::sync::atomic::Ordering;

use super::biquad::{FilterStage, FilterType};
use super::params::{DeckParams, GraphParams};
use crate::types::StereoBuffer;

/// Number of graphic EQ bands
pub const EQ_BAND_COUNT: usize = 10;

/// Fixed centre frequencies of the graphic EQ (Hz)
pub const EQ_BAND_FREQUENCIES: [f32; EQ_BAND_COUNT] = [
    60.0, 170.0, 310.0, 600.0, 1000.0, 3000.0, 6000.0, 12000.0, 14000.0, 16000.0,
];

/// Q of every graphic EQ band
pub const EQ_BAND_Q: f32 = 1.0;

/// Gain range of EQ bands and deck EQ (dB)
pub const EQ_GAIN_RANGE_DB: (f32, f32) = (-12.0, 12.0);

/// Per-deck EQ frequencies
pub const DECK_EQ_LOW_HZ: f32 = 100.0;
pub const DECK_EQ_MID_HZ: f32 = 1000.0;
pub const DECK_EQ_MID_Q: f32 = 1.0;
pub const DECK_EQ_HIGH_HZ: f32 = 8000.0;

/// Bands of the per-deck EQ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeckEqBand {
    Low,
    Mid,
    High,
}

impl DeckEqBand {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" | "bass" => Some(DeckEqBand::Low),
            "mid" => Some(DeckEqBand::Mid),
            "high" | "treble" => Some(DeckEqBand::High),
            _ => None,
        }
    }
}

/// 10 peaking bands in series, gains read from the shared parameter set
pub struct EqBank {
    bands: [FilterStage; EQ_BAND_COUNT],
}

impl EqBank {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            bands: std::array::from_fn(|i| {
                FilterStage::new(FilterType::Peaking, EQ_BAND_FREQUENCIES[i], EQ_BAND_Q, 0.0, sample_rate)
            }),
        }
    }

    /// Pull band gains from the parameter store and filter the block
    pub fn process(&mut self, params: &GraphParams, buffer: &mut StereoBuffer) {
        let mut all_flat = true;
        for (i, band) in self.bands.iter_mut().enumerate() {
            let gain = params.eq_band_db(i);
            band.set_gain_db(gain);
            all_flat &= gain == 0.0;
        }
        // Flat peaking bands are exact identities
        if all_flat {
            return;
        }
        for sample in buffer.iter_mut() {
            let (mut l, mut r) = (sample.left, sample.right);
            for band in &mut self.bands {
                (l, r) = band.process(l, r);
            }
            sample.left = l;
            sample.right = r;
        }
    }

    pub fn reset(&mut self) {
        for band in &mut self.bands {
            band.reset();
        }
    }
}

/// Low shelf / mid peak / high shelf for one deck
pub struct DeckEq {
    low: FilterStage,
    mid: FilterStage,
    high: FilterStage,
}

impl DeckEq {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: FilterStage::new(FilterType::Lowshelf, DECK_EQ_LOW_HZ, 1.0, 0.0, sample_rate),
            mid: FilterStage::new(FilterType::Peaking, DECK_EQ_MID_HZ, DECK_EQ_MID_Q, 0.0, sample_rate),
            high: FilterStage::new(FilterType::Highshelf, DECK_EQ_HIGH_HZ, 1.0, 0.0, sample_rate),
        }
    }

    pub fn process(&mut self, params: &DeckParams, buffer: &mut StereoBuffer) {
        let low = params.eq_low_db.load(Ordering::Relaxed);
        let mid = params.eq_mid_db.load(Ordering::Relaxed);
        let high = params.eq_high_db.load(Ordering::Relaxed);
        self.low.set_gain_db(low);
        self.mid.set_gain_db(mid);
        self.high.set_gain_db(high);
        if low == 0.0 && mid == 0.0 && high == 0.0 {
            return;
        }
        for sample in buffer.iter_mut() {
            let (l, r) = self.low.process(sample.left, sample.right);
            let (l, r) = self.mid.process(l, r);
            let (l, r) = self.high.process(l, r);
            sample.left = l;
            sample.right = r;
        }
    }

    pub fn reset(&mut self) {
        self.low.reset();
        self.mid.reset();
        self.high.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn sine(freq: f32, len: usize) -> StereoBuffer {
        let mut buf = StereoBuffer::silence(len);
        for (i, s) in buf.iter_mut().enumerate() {
            *s = StereoSample::mono((2.0 * std::f32::consts::PI * freq * i as f32 / 48000.0).sin() * 0.5);
        }
        buf
    }

    #[test]
    fn test_flat_bank_is_bit_exact() {
        let params = GraphParams::new();
        let mut bank = EqBank::new(48000.0);
        let mut buf = sine(440.0, 512);
        let original = buf.clone();
        bank.process(&params, &mut buf);
        assert_eq!(buf.as_slice(), original.as_slice());
    }

    #[test]
    fn test_band_boost_raises_level() {
        let params = GraphParams::new();
        params.eq_bands[4].store(12.0, Ordering::Relaxed); // 1 kHz
        let mut bank = EqBank::new(48000.0);
        let mut buf = sine(1000.0, 9600);
        bank.process(&params, &mut buf);
        let tail_peak = buf.as_slice()[4800..].iter().map(|s| s.peak()).fold(0.0, f32::max);
        // +12 dB is ~3.98x of 0.5
        assert!(tail_peak > 1.8 && tail_peak < 2.1, "peak {}", tail_peak);
    }

    #[test]
    fn test_deck_eq_cut() {
        let params = GraphParams::new();
        let deck = &params.decks[0];
        deck.eq_low_db.store(-12.0, Ordering::Relaxed);
        let mut eq = DeckEq::new(48000.0);
        let mut buf = sine(30.0, 48000);
        eq.process(deck, &mut buf);
        let tail_peak = buf.as_slice()[24000..].iter().map(|s| s.peak()).fold(0.0, f32::max);
        assert!(tail_peak < 0.2, "peak {}", tail_peak);
    }

    #[test]
    fn test_band_names() {
        assert_eq!(DeckEqBand::from_name("Bass"), Some(DeckEqBand::Low));
        assert_eq!(DeckEqBand::from_name("high"), Some(DeckEqBand::High));
        assert_eq!(DeckEqBand::from_name("sub"), None);
    }
}
