//! Phase-Sensitive Detector (Mixer)
//!
//! Multiplies the conditioned input with the reference to produce the I and
//! Q baseband products. Two demodulation modes are supported:
//!
//! - **Analog**: multiply by `sin` / `cos` of the reference phase.
//! - **Digital**: multiply by the reference square wave and its quadrature,
//!   scaled by 2/π so the fundamental matches the analog path and both
//!   modes report directly comparable amplitudes.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::mixer::{Mixer, MixerMode};
//!
//! let mixer = Mixer::new(MixerMode::Analog);
//! let (i, q) = mixer.mix(1.0, 0.0, 1.0);
//! assert!(i.abs() < 1e-12); // sin(0) = 0
//! assert!((q - 1.0).abs() < 1e-12); // cos(0) = 1
//! ```

use std::f64::consts::FRAC_2_PI;

use serde::{Deserialize, Serialize};

/// Demodulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MixerMode {
    /// Sinusoidal multiplication.
    Analog,
    /// Square-wave multiplication with 2/π fundamental compensation.
    Digital,
}

/// I/Q multiplier stage.
#[derive(Debug, Clone, Copy)]
pub struct Mixer {
    mode: MixerMode,
}

impl Mixer {
    /// Create a mixer in the given mode.
    pub fn new(mode: MixerMode) -> Self {
        Self { mode }
    }

    /// Current mode.
    pub fn mode(&self) -> MixerMode {
        self.mode
    }

    /// Switch mode. The mixer is stateless, so this takes effect on the
    /// next sample.
    pub fn set_mode(&mut self, mode: MixerMode) {
        self.mode = mode;
    }

    /// Mix one sample against the reference phase, returning `(i, q)`.
    ///
    /// `theta_ref` is the phase the reference sample was produced from;
    /// `ref_amplitude` only gates the digital path (a dead reference
    /// yields zero rather than a ±2/π chop of the input).
    pub fn mix(&self, sample: f64, theta_ref: f64, ref_amplitude: f64) -> (f64, f64) {
        match self.mode {
            MixerMode::Analog => (sample * theta_ref.sin(), sample * theta_ref.cos()),
            MixerMode::Digital => {
                if ref_amplitude > 0.0 {
                    let in_phase = if theta_ref.sin() >= 0.0 { 1.0 } else { -1.0 };
                    let quadrature = if theta_ref.cos() >= 0.0 { 1.0 } else { -1.0 };
                    (
                        sample * in_phase * FRAC_2_PI,
                        sample * quadrature * FRAC_2_PI,
                    )
                } else {
                    (0.0, 0.0)
                }
            }
        }
    }
}
