//! Interferer Bank
//!
//! A bank of independent sinusoids added to the sensor signal to model
//! narrowband pickup (mains hum, neighboring instruments). Each tone keeps
//! its own phase accumulator so the sum stays continuous from sample to
//! sample.
//!
//! Reconfiguration distinguishes two cases: when only amplitudes change,
//! the existing phases are preserved in place so the summed waveform has no
//! discontinuity; any structural change (count or frequencies) rebuilds the
//! bank with fresh random phases.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::interferer::InterfererBank;
//!
//! let mut bank = InterfererBank::seeded(50_000.0, 42);
//! bank.install(&[(50.0, 0.2), (150.0, 0.1)]);
//!
//! let sample = bank.generate();
//! assert!(sample.abs() <= 0.3 + 1e-9);
//! ```

use std::f64::consts::TAU;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
struct Tone {
    frequency: f64,
    amplitude: f64,
    phase: f64,
}

/// Sum of N sinusoids with persistent phases.
#[derive(Debug)]
pub struct InterfererBank {
    tones: Vec<Tone>,
    sample_rate: f64,
    rng: StdRng,
}

impl InterfererBank {
    /// Create an empty bank; phases for installed tones come from entropy.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            tones: Vec::new(),
            sample_rate,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create an empty bank with a deterministic phase source.
    pub fn seeded(sample_rate: f64, seed: u64) -> Self {
        Self {
            tones: Vec::new(),
            sample_rate,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Install a tone list as `(frequency_hz, amplitude)` pairs.
    ///
    /// When the incoming list has the same length and the same frequencies
    /// in order as the current one, only the amplitudes are overwritten and
    /// the phases survive; returns `true` for this in-place path. Otherwise
    /// the bank is rebuilt with fresh uniform random phases and `false` is
    /// returned.
    pub fn install(&mut self, list: &[(f64, f64)]) -> bool {
        let amplitudes_only = list.len() == self.tones.len()
            && list
                .iter()
                .zip(self.tones.iter())
                .all(|(&(freq, _), tone)| freq == tone.frequency);

        if amplitudes_only {
            for (&(_, amplitude), tone) in list.iter().zip(self.tones.iter_mut()) {
                tone.amplitude = amplitude;
            }
            return true;
        }

        self.tones = list
            .iter()
            .map(|&(frequency, amplitude)| Tone {
                frequency,
                amplitude,
                phase: self.rng.gen_range(0.0..TAU),
            })
            .collect();
        false
    }

    /// Sum the bank and advance every phase by one sample.
    pub fn generate(&mut self) -> f64 {
        let mut sum = 0.0;
        for tone in &mut self.tones {
            sum += tone.amplitude * tone.phase.sin();
            tone.phase = (tone.phase + TAU * tone.frequency / self.sample_rate).rem_euclid(TAU);
        }
        sum
    }

    /// Number of installed tones.
    pub fn len(&self) -> usize {
        self.tones.len()
    }

    /// True when no tones are installed.
    pub fn is_empty(&self) -> bool {
        self.tones.is_empty()
    }
}
