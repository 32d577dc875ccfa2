//! Phase-Accumulating Oscillator
//!
//! Generates real sine and square waveforms sample by sample with exact
//! phase tracking. The phase is wrapped into [0, 2π) on every advance, not
//! lazily, so long runs never accumulate floating-point drift.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::oscillator::Oscillator;
//!
//! // 100 Hz tone at 50 kHz sample rate
//! let mut osc = Oscillator::new(50_000.0);
//! let first = osc.sine(100.0, 1.0);
//! assert!(first.abs() < 1e-12, "phase starts at zero");
//!
//! // Read-only probe does not advance the phase
//! let quadrature = osc.phase_of(std::f64::consts::FRAC_PI_2);
//! assert!(quadrature > 0.0);
//! ```

use std::f64::consts::TAU;

/// Real-valued phase accumulator oscillator.
///
/// Unlike an NCO with a fixed phase increment, the frequency is supplied on
/// every call so the owner can retune without touching oscillator state;
/// the accumulated phase stays continuous across frequency changes.
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Phase accumulator, always in [0, 2π).
    phase: f64,
    /// Sample rate (Hz).
    sample_rate: f64,
}

impl Oscillator {
    /// Create an oscillator at the given sample rate with zero phase.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            phase: 0.0,
            sample_rate,
        }
    }

    /// Produce `amplitude * sin(phase)` and advance by `frequency`.
    pub fn sine(&mut self, frequency: f64, amplitude: f64) -> f64 {
        let sample = amplitude * self.phase.sin();
        self.advance(frequency);
        sample
    }

    /// Produce `amplitude * sign(sin(phase))` and advance by `frequency`.
    pub fn square(&mut self, frequency: f64, amplitude: f64) -> f64 {
        let sign = if self.phase.sin() >= 0.0 { 1.0 } else { -1.0 };
        let sample = amplitude * sign;
        self.advance(frequency);
        sample
    }

    /// Advance the phase by one sample of `frequency` without producing
    /// output. Wraps into [0, 2π).
    pub fn advance(&mut self, frequency: f64) {
        self.phase += TAU * frequency / self.sample_rate;
        self.phase = self.phase.rem_euclid(TAU);
    }

    /// Current phase in [0, 2π). Does not advance.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Read `(phase + offset) mod 2π` without advancing.
    pub fn phase_of(&self, offset: f64) -> f64 {
        (self.phase + offset).rem_euclid(TAU)
    }

    /// Get the sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Reset the phase to zero.
    pub fn reset(&mut self) {
        self.phase = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sine_matches_closed_form() {
        let fs = 50_000.0;
        let freq = 100.0;
        let amp = 1.5;
        let mut osc = Oscillator::new(fs);

        for n in 0..200_000u64 {
            let sample = osc.sine(freq, amp);
            let expected = amp * (TAU * freq * n as f64 / fs).rem_euclid(TAU).sin();
            assert!(
                (sample - expected).abs() < 1e-6,
                "sample {n}: got {sample}, expected {expected}"
            );
        }
    }

    #[test]
    fn test_phase_stays_wrapped() {
        let mut osc = Oscillator::new(50_000.0);
        for _ in 0..500_000 {
            osc.advance(997.0);
            assert!(
                osc.phase() >= 0.0 && osc.phase() < TAU,
                "phase out of range: {}",
                osc.phase()
            );
        }
    }

    #[test]
    fn test_square_is_sign_of_sine() {
        let mut sq = Oscillator::new(48_000.0);
        let mut si = Oscillator::new(48_000.0);
        for _ in 0..1000 {
            let s = si.sine(1000.0, 1.0);
            let q = sq.square(1000.0, 2.0);
            let expected = if s >= 0.0 { 2.0 } else { -2.0 };
            // Both oscillators share the same phase sequence.
            assert_eq!(q, expected);
        }
    }

    #[test]
    fn test_phase_of_does_not_advance() {
        let mut osc = Oscillator::new(48_000.0);
        osc.advance(1000.0);
        let before = osc.phase();
        let probed = osc.phase_of(1.0);
        assert_eq!(osc.phase(), before);
        assert!((probed - (before + 1.0).rem_euclid(TAU)).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut osc = Oscillator::new(48_000.0);
        let run1: Vec<f64> = (0..100).map(|_| osc.sine(440.0, 1.0)).collect();
        osc.reset();
        let run2: Vec<f64> = (0..100).map(|_| osc.sine(440.0, 1.0)).collect();
        assert_eq!(run1, run2, "reset should reproduce the sequence");
    }

    #[test]
    fn test_zero_frequency_holds_phase() {
        let mut osc = Oscillator::new(48_000.0);
        osc.advance(1000.0);
        let phase = osc.phase();
        osc.advance(0.0);
        assert_eq!(osc.phase(), phase);
    }
}
