//! # Lock-In Amplifier DSP Blocks
//!
//! This crate provides the leaf Digital Signal Processing (DSP) blocks used
//! by the lock-in amplifier simulation engine: oscillators, noise sources,
//! filter design and biquad cascades, the phase-sensitive detector, the
//! device-under-test signal generator, decimating history buffers, the
//! oscilloscope trigger search, and the FFT spectrum snapshot.
//!
//! ## Overview
//!
//! A lock-in amplifier recovers a small signal at a known reference
//! frequency by multiplying the input with the reference (phase-sensitive
//! detection) and low-pass filtering the product. The blocks here implement
//! that chain for a simulated amplitude-modulated sensor:
//!
//! ```text
//! reference ──┐
//!             ├─► DUT (DSB-SC sensor) ─► + noise ─► BPF ─► I/Q mixer ─► LPF ─► outputs
//! modulating ─┘                                                  ▲
//!                                                        reference phase
//! ```
//!
//! Every block is a plain value type with per-sample update methods; none
//! of them allocate on the processing path. The engine crate composes them
//! into the running chain and owns all cross-thread concerns.
//!
//! ## Example
//!
//! ```rust
//! use lockin_dsp::oscillator::Oscillator;
//! use lockin_dsp::mixer::{Mixer, MixerMode};
//!
//! let mut osc = Oscillator::new(50_000.0);
//! let mixer = Mixer::new(MixerMode::Analog);
//!
//! let theta = osc.phase();
//! let reference = osc.sine(100.0, 1.0);
//! let (i, q) = mixer.mix(reference, theta, 1.0);
//! assert!((i - reference * theta.sin()).abs() < 1e-12);
//! assert!((q - reference * theta.cos()).abs() < 1e-12);
//! ```

pub mod biquad;
pub mod dut;
pub mod filter_design;
pub mod interferer;
pub mod mixer;
pub mod noise;
pub mod oscillator;
pub mod ring_buffer;
pub mod spectrum;
pub mod trigger;

pub use biquad::{BiquadChain, BiquadCoeffs, BiquadSection};
pub use dut::{DutConfig, DutGenerator, DutSample};
pub use filter_design::DesignError;
pub use interferer::InterfererBank;
pub use mixer::{Mixer, MixerMode};
pub use noise::GaussianNoise;
pub use oscillator::Oscillator;
pub use ring_buffer::SampleRing;
pub use spectrum::{Spectrum, SpectrumAnalyzer};
pub use trigger::{TriggerDetector, TriggerPoint};
