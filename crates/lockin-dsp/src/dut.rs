//! Device-Under-Test Signal Generator
//!
//! Produces the reference waveform and the amplitude-modulated sensor
//! response it excites. The sensor is double-sideband suppressed-carrier:
//! the carrier (phase-shifted reference) is multiplied by the normalized
//! modulating wave and the modulation index, so a zero index silences the
//! sensor entirely rather than leaving a bare carrier.
//!
//! The modulating oscillator advances even when the index is zero, keeping
//! its phase in sync so re-enabling modulation does not jump.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::dut::{DutConfig, DutGenerator};
//!
//! let mut dut = DutGenerator::new(DutConfig::default(), 50_000.0);
//! let s = dut.next_sample();
//! assert_eq!(s.theta_ref, 0.0);
//! assert!(s.reference.abs() < 1e-12);
//! ```

use crate::oscillator::Oscillator;

/// Signal-source settings for the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct DutConfig {
    /// Reference frequency (Hz).
    pub reference_frequency: f64,
    /// Reference amplitude (V).
    pub reference_amplitude: f64,
    /// Modulating frequency (Hz).
    pub modulating_frequency: f64,
    /// Modulation index in [0, 1].
    pub modulation_index: f64,
    /// Sensor phase shift relative to the reference (radians).
    pub phase_shift_rad: f64,
    /// Sensor output amplitude (V).
    pub sensor_amplitude: f64,
}

impl Default for DutConfig {
    fn default() -> Self {
        Self {
            reference_frequency: 100.0,
            reference_amplitude: 1.0,
            modulating_frequency: 10.0,
            modulation_index: 0.5,
            phase_shift_rad: 0.0,
            sensor_amplitude: 1.0,
        }
    }
}

/// One generated sample of the reference/sensor pair.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DutSample {
    /// Reference phase the sample was produced from, in [0, 2π).
    pub theta_ref: f64,
    /// Reference output `A_ref * sin(theta_ref)`.
    pub reference: f64,
    /// Modulating signal scaled for display: `A_sensor * index * m`.
    pub modulating: f64,
    /// Noise-free sensor output (DSB-SC).
    pub sensor_clean: f64,
}

/// Reference + modulated-sensor generator.
#[derive(Debug, Clone)]
pub struct DutGenerator {
    config: DutConfig,
    osc_ref: Oscillator,
    osc_mod: Oscillator,
}

impl DutGenerator {
    /// Create a generator with both oscillators at zero phase.
    pub fn new(config: DutConfig, sample_rate: f64) -> Self {
        Self {
            config,
            osc_ref: Oscillator::new(sample_rate),
            osc_mod: Oscillator::new(sample_rate),
        }
    }

    /// Replace the settings; oscillator phases are preserved so amplitude
    /// or index changes do not cause discontinuities.
    pub fn set_config(&mut self, config: DutConfig) {
        self.config = config;
    }

    /// Current settings.
    pub fn config(&self) -> &DutConfig {
        &self.config
    }

    /// Produce one sample and advance both oscillators.
    pub fn next_sample(&mut self) -> DutSample {
        let c = &self.config;

        let theta_ref = self.osc_ref.phase();
        let reference = self
            .osc_ref
            .sine(c.reference_frequency, c.reference_amplitude);

        let m = if c.modulation_index > 0.0 {
            self.osc_mod.sine(c.modulating_frequency, 1.0)
        } else {
            // Keep the modulating phase in sync while muted.
            self.osc_mod.advance(c.modulating_frequency);
            0.0
        };

        let carrier = (theta_ref + c.phase_shift_rad).sin();
        let sensor_clean = c.sensor_amplitude * carrier * c.modulation_index * m;
        let modulating = c.sensor_amplitude * c.modulation_index * m;

        DutSample {
            theta_ref,
            reference,
            modulating,
            sensor_clean,
        }
    }

    /// Reset both oscillator phases to zero.
    pub fn reset(&mut self) {
        self.osc_ref.reset();
        self.osc_mod.reset();
    }
}
