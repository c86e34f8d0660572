//! Biquad filters (RBJ cookbook) shared by EQ, mixer chain, filter effect
//! and the beat detector's kick isolation low-pass.

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Filter response types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

impl FilterType {
    pub const ALL: [FilterType; 8] = [
        FilterType::Lowpass,
        FilterType::Highpass,
        FilterType::Bandpass,
        FilterType::Lowshelf,
        FilterType::Highshelf,
        FilterType::Peaking,
        FilterType::Notch,
        FilterType::Allpass,
    ];

    /// Parse a type name ("lowpass", "highshelf", ...)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    pub fn name(self) -> &'static str {
        match self {
            FilterType::Lowpass => "lowpass",
            FilterType::Highpass => "highpass",
            FilterType::Bandpass => "bandpass",
            FilterType::Lowshelf => "lowshelf",
            FilterType::Highshelf => "highshelf",
            FilterType::Peaking => "peaking",
            FilterType::Notch => "notch",
            FilterType::Allpass => "allpass",
        }
    }

    /// Encoding for atomic storage
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Self {
        Self::ALL.get(value as usize).copied().unwrap_or_default()
    }

    /// Whether the gain parameter affects this response
    pub fn uses_gain(self) -> bool {
        matches!(
            self,
            FilterType::Lowshelf | FilterType::Highshelf | FilterType::Peaking
        )
    }
}

/// Normalized biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Design coefficients for any filter type
    ///
    /// `freq` is clamped into (0, nyquist); `q` must be positive. Shelves use
    /// a slope of 1.
    pub fn design(kind: FilterType, freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let freq = freq.clamp(1.0, nyquist * 0.999);
        let q = q.max(1e-4);
        let a = 10.0_f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let sin_w0 = w0.sin();
        let alpha = sin_w0 / (2.0 * q);
        // Shelf slope S = 1
        let shelf_alpha = sin_w0 / 2.0 * std::f32::consts::SQRT_2;

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterType::Lowpass => (
                (1.0 - cos_w0) / 2.0,
                1.0 - cos_w0,
                (1.0 - cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Highpass => (
                (1.0 + cos_w0) / 2.0,
                -(1.0 + cos_w0),
                (1.0 + cos_w0) / 2.0,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Bandpass => (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Notch => (1.0, -2.0 * cos_w0, 1.0, 1.0 + alpha, -2.0 * cos_w0, 1.0 - alpha),
            FilterType::Allpass => (
                1.0 - alpha,
                -2.0 * cos_w0,
                1.0 + alpha,
                1.0 + alpha,
                -2.0 * cos_w0,
                1.0 - alpha,
            ),
            FilterType::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos_w0,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos_w0,
                1.0 - alpha / a,
            ),
            FilterType::Lowshelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * shelf_alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
            FilterType::Highshelf => {
                let two_sqrt_a_alpha = 2.0 * a.sqrt() * shelf_alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + two_sqrt_a_alpha),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - two_sqrt_a_alpha),
                    (a + 1.0) - (a - 1.0) * cos_w0 + two_sqrt_a_alpha,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - two_sqrt_a_alpha,
                )
            }
        };

        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// Unity gain, no filtering
    pub fn passthrough() -> Self {
        Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 }
    }

    /// Magnitude response in dB at `freq`
    pub fn response_db(&self, freq: f32, sample_rate: f32) -> f32 {
        let w = 2.0 * PI * freq / sample_rate;
        let (cos1, sin1) = (w.cos(), w.sin());
        let (cos2, sin2) = ((2.0 * w).cos(), (2.0 * w).sin());
        let num_re = self.b0 + self.b1 * cos1 + self.b2 * cos2;
        let num_im = -(self.b1 * sin1 + self.b2 * sin2);
        let den_re = 1.0 + self.a1 * cos1 + self.a2 * cos2;
        let den_im = -(self.a1 * sin1 + self.a2 * sin2);
        let num = (num_re * num_re + num_im * num_im).sqrt();
        let den = (den_re * den_re + den_im * den_im).sqrt();
        20.0 * (num / den).log10()
    }
}

/// Direct form I state for a stereo biquad
#[derive(Debug, Clone, Default)]
pub struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    pub fn process(&mut self, input_l: f32, input_r: f32, c: &BiquadCoeffs) -> (f32, f32) {
        let out_l = c.b0 * input_l + c.b1 * self.x1_l + c.b2 * self.x2_l
                  - c.a1 * self.y1_l - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        let out_r = c.b0 * input_r + c.b1 * self.x1_r + c.b2 * self.x2_r
                  - c.a1 * self.y1_r - c.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    /// Single channel processing (uses the left state only)
    #[inline]
    pub fn process_mono(&mut self, input: f32, c: &BiquadCoeffs) -> f32 {
        let out = c.b0 * input + c.b1 * self.x1_l + c.b2 * self.x2_l
                - c.a1 * self.y1_l - c.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input;
        self.y2_l = self.y1_l;
        self.y1_l = out;
        out
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A biquad driven by parameter values that may change between blocks
///
/// Coefficients are only redesigned when a parameter actually moved.
#[derive(Debug, Clone)]
pub struct FilterStage {
    kind: FilterType,
    freq: f32,
    q: f32,
    gain_db: f32,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
}

impl FilterStage {
    pub fn new(kind: FilterType, freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        Self {
            kind,
            freq,
            q,
            gain_db,
            sample_rate,
            coeffs: BiquadCoeffs::design(kind, freq, q, gain_db, sample_rate),
            state: BiquadState::default(),
        }
    }

    /// Update parameters, redesigning coefficients on change
    #[inline]
    pub fn update(&mut self, kind: FilterType, freq: f32, q: f32, gain_db: f32) {
        if kind != self.kind || freq != self.freq || q != self.q || gain_db != self.gain_db {
            self.kind = kind;
            self.freq = freq;
            self.q = q;
            self.gain_db = gain_db;
            self.coeffs = BiquadCoeffs::design(kind, freq, q, gain_db, self.sample_rate);
        }
    }

    /// Update only the gain (EQ bands)
    #[inline]
    pub fn set_gain_db(&mut self, gain_db: f32) {
        self.update(self.kind, self.freq, self.q, gain_db);
    }

    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        self.state.process(left, right, &self.coeffs)
    }

    pub fn coeffs(&self) -> &BiquadCoeffs {
        &self.coeffs
    }

    pub fn kind(&self) -> FilterType {
        self.kind
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }
}
