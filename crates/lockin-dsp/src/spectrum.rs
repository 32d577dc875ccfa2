//! FFT Spectrum Snapshot
//!
//! Computes a Hann-windowed magnitude spectrum in dB over the most recent
//! samples of any chain channel. The transform length is the largest power
//! of two that fits both the input and the 1024-point budget; anything
//! under 64 samples is considered too short to be meaningful and yields an
//! empty spectrum.
//!
//! ## Signal Flow
//!
//! ```text
//! input tail → Hann window → FFT → |·|/N → 20·log10(max(·, 1e-10)) → dB bins
//! ```
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::spectrum::SpectrumAnalyzer;
//!
//! let mut analyzer = SpectrumAnalyzer::new();
//! let tone: Vec<f32> = (0..1024)
//!     .map(|i| (2.0 * std::f32::consts::PI * 100.0 * i as f32 / 5000.0).sin())
//!     .collect();
//!
//! let spectrum = analyzer.compute(&tone, 5000.0);
//! assert_eq!(spectrum.len(), 512);
//! ```

use std::fmt;

use rustfft::{num_complex::Complex64, FftPlanner};

/// Upper bound on the transform length.
pub const FFT_SIZE: usize = 1024;

/// Inputs shorter than this produce an empty spectrum.
pub const MIN_SAMPLES: usize = 64;

/// Magnitude floor applied before the log, to keep silence finite.
const MAGNITUDE_FLOOR: f64 = 1e-10;

/// One computed spectrum: frequency bins and their dB magnitudes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spectrum {
    /// Bin center frequencies in Hz, `f[k] = k * fs / N`.
    pub frequencies: Vec<f64>,
    /// Bin magnitudes in dB.
    pub magnitudes_db: Vec<f64>,
}

impl Spectrum {
    /// Number of bins (N/2 for a transform of length N).
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    /// True when the input was too short to analyze.
    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// Bin with the largest magnitude, as `(frequency_hz, magnitude_db)`.
    pub fn peak(&self) -> Option<(f64, f64)> {
        self.magnitudes_db
            .iter()
            .enumerate()
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(k, &db)| (self.frequencies[k], db))
    }
}

/// Reusable spectrum computer with a cached FFT planner.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("buffer_len", &self.buffer.len())
            .finish()
    }
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumAnalyzer {
    /// Create an analyzer. Plans are cached across calls.
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
            buffer: Vec::with_capacity(FFT_SIZE),
            scratch: Vec::new(),
        }
    }

    /// Analyze the tail of `input` sampled at `sample_rate` Hz.
    ///
    /// For decimated snapshot channels the caller passes the effective
    /// (post-decimation) sample rate so bin frequencies come out right.
    pub fn compute(&mut self, input: &[f32], sample_rate: f64) -> Spectrum {
        let n = transform_length(input.len());
        if n == 0 {
            return Spectrum::default();
        }

        let tail = &input[input.len() - n..];
        self.buffer.clear();
        self.buffer.extend(
            tail.iter()
                .enumerate()
                .map(|(i, &x)| Complex64::new(x as f64 * hann(i, n), 0.0)),
        );

        let fft = self.planner.plan_fft_forward(n);
        let needed = fft.get_inplace_scratch_len();
        if self.scratch.len() < needed {
            self.scratch.resize(needed, Complex64::new(0.0, 0.0));
        }
        fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let bins = n / 2;
        let mut frequencies = Vec::with_capacity(bins);
        let mut magnitudes_db = Vec::with_capacity(bins);
        for (k, bin) in self.buffer.iter().take(bins).enumerate() {
            frequencies.push(k as f64 * sample_rate / n as f64);
            let magnitude = (bin.norm() / n as f64).max(MAGNITUDE_FLOOR);
            magnitudes_db.push(20.0 * magnitude.log10());
        }

        Spectrum {
            frequencies,
            magnitudes_db,
        }
    }

    /// Bin center frequencies a [`compute`](Self::compute) call over an
    /// input of `input_len` samples would produce, without running the
    /// transform. Empty for inputs under [`MIN_SAMPLES`].
    pub fn frequency_axis(&self, input_len: usize, sample_rate: f64) -> Vec<f64> {
        let n = transform_length(input_len);
        (0..n / 2)
            .map(|k| k as f64 * sample_rate / n as f64)
            .collect()
    }
}

/// Largest power of two that fits both the input and [`FFT_SIZE`];
/// zero when the input is under [`MIN_SAMPLES`].
fn transform_length(input_len: usize) -> usize {
    if input_len < MIN_SAMPLES {
        return 0;
    }
    let bounded = input_len.min(FFT_SIZE);
    // Highest set bit.
    1 << (usize::BITS - 1 - bounded.leading_zeros())
}

/// Hann window coefficient: `0.5 * (1 - cos(2*pi*i / (n - 1)))`.
fn hann(i: usize, n: usize) -> f64 {
    0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / (n - 1) as f64).cos())
}
