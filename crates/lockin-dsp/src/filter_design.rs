//! IIR Filter Design
//!
//! Produces biquad cascades for the signal-conditioning chain:
//!
//! - **Lowpass / Highpass**: Butterworth responses of order 1, 2 or 4.
//!   Order 1 is a one-pole design via bilinear transform with frequency
//!   prewarping, expressed as a biquad with `b2 = a2 = 0`. Order 2 is a
//!   single section with Q = 1/√2; order 4 cascades two sections with the
//!   Butterworth Qs {0.5412, 1.3066}.
//! - **Bandpass**: the RBJ-cookbook constant-skirt-gain section with peak
//!   gain 0 dB, `alpha = sin(w0) / (2Q)` and `Q = center / bandwidth`.
//!   Orders 1 and 2 use one section; order 4 cascades two sections each
//!   designed for `bandwidth * 1.55` so the composite −3 dB bandwidth
//!   lands near the target. The 1.55 factor is empirical.
//!
//! Also exposes phase and magnitude response probes used for the reported
//! phase correction and by the design tests.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::filter_design;
//!
//! let lpf = filter_design::lowpass(2, 10.0, 50_000.0).unwrap();
//! let dc_gain = filter_design::magnitude_response(&lpf, 0.0, 50_000.0);
//! assert!((dc_gain - 1.0).abs() < 1e-6);
//! ```

use std::f64::consts::{FRAC_1_SQRT_2, PI, TAU};

use num_complex::Complex64;
use thiserror::Error;

use crate::biquad::BiquadCoeffs;

/// Butterworth section Qs for a 4th-order cascade.
const BUTTERWORTH_Q4: [f64; 2] = [0.5412, 1.3066];

/// Errors from filter design.
#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DesignError {
    /// Corner frequency outside the representable band (0, fs/2).
    #[error("corner frequency {corner_hz} Hz outside (0, fs/2) for fs = {sample_rate} Hz")]
    InvalidCorner { corner_hz: f64, sample_rate: f64 },

    /// Order other than 1, 2 or 4.
    #[error("unsupported filter order {0} (expected 1, 2 or 4)")]
    UnsupportedOrder(usize),
}

/// Validate a corner frequency against the open interval (0, fs/2).
fn checked_corner(corner_hz: f64, sample_rate: f64) -> Result<f64, DesignError> {
    if !corner_hz.is_finite() || corner_hz <= 0.0 || corner_hz >= sample_rate / 2.0 {
        return Err(DesignError::InvalidCorner {
            corner_hz,
            sample_rate,
        });
    }
    Ok(corner_hz)
}

/// Design a Butterworth lowpass cascade of order 1, 2 or 4.
pub fn lowpass(
    order: usize,
    cutoff_hz: f64,
    sample_rate: f64,
) -> Result<Vec<BiquadCoeffs>, DesignError> {
    let cutoff = checked_corner(cutoff_hz, sample_rate)?;
    match order {
        1 => Ok(vec![one_pole_lowpass(cutoff, sample_rate)]),
        2 => Ok(vec![rbj_lowpass(cutoff, sample_rate, FRAC_1_SQRT_2)]),
        4 => Ok(BUTTERWORTH_Q4
            .iter()
            .map(|&q| rbj_lowpass(cutoff, sample_rate, q))
            .collect()),
        other => Err(DesignError::UnsupportedOrder(other)),
    }
}

/// Design a Butterworth highpass cascade of order 1, 2 or 4.
pub fn highpass(
    order: usize,
    cutoff_hz: f64,
    sample_rate: f64,
) -> Result<Vec<BiquadCoeffs>, DesignError> {
    let cutoff = checked_corner(cutoff_hz, sample_rate)?;
    match order {
        1 => Ok(vec![one_pole_highpass(cutoff, sample_rate)]),
        2 => Ok(vec![rbj_highpass(cutoff, sample_rate, FRAC_1_SQRT_2)]),
        4 => Ok(BUTTERWORTH_Q4
            .iter()
            .map(|&q| rbj_highpass(cutoff, sample_rate, q))
            .collect()),
        other => Err(DesignError::UnsupportedOrder(other)),
    }
}

/// Design a bandpass cascade of order 1, 2 or 4 around `center_hz`.
///
/// Orders 1 and 2 produce a single RBJ section at the requested bandwidth;
/// order 4 cascades two sections widened by the 1.55 correction.
pub fn bandpass(
    order: usize,
    center_hz: f64,
    bandwidth_hz: f64,
    sample_rate: f64,
) -> Result<Vec<BiquadCoeffs>, DesignError> {
    let center = checked_corner(center_hz, sample_rate)?;
    match order {
        1 | 2 => Ok(vec![rbj_bandpass(center, bandwidth_hz, sample_rate)]),
        4 => {
            let widened = bandwidth_hz * 1.55;
            Ok(vec![
                rbj_bandpass(center, widened, sample_rate),
                rbj_bandpass(center, widened, sample_rate),
            ])
        }
        other => Err(DesignError::UnsupportedOrder(other)),
    }
}

/// One-pole lowpass via bilinear transform with prewarping, as a biquad.
fn one_pole_lowpass(cutoff_hz: f64, sample_rate: f64) -> BiquadCoeffs {
    let k = (PI * cutoff_hz / sample_rate).tan();
    let norm = 1.0 / (1.0 + k);
    BiquadCoeffs {
        b0: k * norm,
        b1: k * norm,
        b2: 0.0,
        a1: (k - 1.0) * norm,
        a2: 0.0,
    }
}

/// One-pole highpass via bilinear transform with prewarping, as a biquad.
fn one_pole_highpass(cutoff_hz: f64, sample_rate: f64) -> BiquadCoeffs {
    let k = (PI * cutoff_hz / sample_rate).tan();
    let norm = 1.0 / (1.0 + k);
    BiquadCoeffs {
        b0: norm,
        b1: -norm,
        b2: 0.0,
        a1: (k - 1.0) * norm,
        a2: 0.0,
    }
}

/// RBJ-cookbook lowpass section.
fn rbj_lowpass(cutoff_hz: f64, sample_rate: f64, q: f64) -> BiquadCoeffs {
    let w0 = TAU * cutoff_hz / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoeffs {
        b0: (1.0 - cos_w0) / 2.0 / a0,
        b1: (1.0 - cos_w0) / a0,
        b2: (1.0 - cos_w0) / 2.0 / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

/// RBJ-cookbook highpass section.
fn rbj_highpass(cutoff_hz: f64, sample_rate: f64, q: f64) -> BiquadCoeffs {
    let w0 = TAU * cutoff_hz / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoeffs {
        b0: (1.0 + cos_w0) / 2.0 / a0,
        b1: -(1.0 + cos_w0) / a0,
        b2: (1.0 + cos_w0) / 2.0 / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

/// RBJ-cookbook bandpass section with constant skirt gain and 0 dB peak.
fn rbj_bandpass(center_hz: f64, bandwidth_hz: f64, sample_rate: f64) -> BiquadCoeffs {
    let q = center_hz / bandwidth_hz;
    let w0 = TAU * center_hz / sample_rate;
    let cos_w0 = w0.cos();
    let alpha = w0.sin() / (2.0 * q);
    let a0 = 1.0 + alpha;
    BiquadCoeffs {
        b0: alpha / a0,
        b1: 0.0,
        b2: -alpha / a0,
        a1: -2.0 * cos_w0 / a0,
        a2: (1.0 - alpha) / a0,
    }
}

/// Complex frequency response of a single section at `frequency_hz`.
fn section_response(coeffs: &BiquadCoeffs, frequency_hz: f64, sample_rate: f64) -> Complex64 {
    let omega = TAU * frequency_hz / sample_rate;
    let z_inv = Complex64::new(omega.cos(), -omega.sin());
    let z_inv2 = z_inv * z_inv;
    let num = Complex64::new(coeffs.b0, 0.0)
        + Complex64::new(coeffs.b1, 0.0) * z_inv
        + Complex64::new(coeffs.b2, 0.0) * z_inv2;
    let den = Complex64::new(1.0, 0.0)
        + Complex64::new(coeffs.a1, 0.0) * z_inv
        + Complex64::new(coeffs.a2, 0.0) * z_inv2;
    num / den
}

/// Phase response `arg(H(e^{jw}))` of one section, in radians.
pub fn phase_response(coeffs: &BiquadCoeffs, frequency_hz: f64, sample_rate: f64) -> f64 {
    section_response(coeffs, frequency_hz, sample_rate).arg()
}

/// Summed phase response of a cascade, in radians.
pub fn cascaded_phase(sections: &[BiquadCoeffs], frequency_hz: f64, sample_rate: f64) -> f64 {
    sections
        .iter()
        .map(|c| phase_response(c, frequency_hz, sample_rate))
        .sum()
}

/// Linear magnitude response of a cascade.
pub fn magnitude_response(sections: &[BiquadCoeffs], frequency_hz: f64, sample_rate: f64) -> f64 {
    sections
        .iter()
        .map(|c| section_response(c, frequency_hz, sample_rate).norm())
        .product()
}
