//! # Lock-In Amplifier Simulation Engine
//!
//! Real-time producer/consumer engine around the [`lockin_dsp`] blocks.
//! The producer side synthesizes the noisy amplitude-modulated sensor
//! signal, runs it through the conditioning and demodulation chain sample
//! by sample, and keeps the recent history of every chain point in
//! decimating ring buffers. At a bounded frame rate it writes a decimated
//! snapshot of all thirteen channels into the inactive half of an atomic
//! double buffer and publishes it with a single flag flip; the consumer
//! side reads the active half whenever it likes and derives scalar outputs,
//! trigger positions and FFT spectra from it.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────── consumer ──────────────┐   ┌────────── producer ──────────┐
//! │ params / UpdateParams diff ──────────┼──►│ ChainRunner (C1..C8)         │
//! │ FrameReady events ◄──────────────────┼───│  pacing off monotonic clock  │
//! │ DoubleBuffer reads (acquire)         │   │  DoubleBuffer writes + flip  │
//! └──────────────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Configuration never crosses through shared memory: the consumer sends
//! immutable parameter snapshots and diffs over the control channel, and
//! the only shared state is the double buffer with its release/acquire
//! flag.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use lockin_engine::double_buffer::DoubleBuffer;
//! use lockin_engine::engine::{EngineEvent, LockinEngine};
//! use lockin_engine::params::Params;
//!
//! let params = Params::default();
//! let buffer = Arc::new(DoubleBuffer::new(params.engine.snapshot_points));
//!
//! let engine = LockinEngine::spawn();
//! engine.init(Arc::clone(&buffer), params.engine.snapshot_points);
//! engine.start(params);
//!
//! while let Ok(EngineEvent::FrameReady { outputs, .. }) = engine.events().recv() {
//!     println!("i = {:.4} V, phase = {:.2} deg", outputs.i, outputs.phase_deg);
//! }
//! ```

pub mod chain;
pub mod double_buffer;
pub mod engine;
pub mod error;
pub mod pacing;
pub mod params;

pub use chain::{ChainRunner, FrameInfo, ScalarOutputs};
pub use double_buffer::{Channel, DoubleBuffer, CHANNEL_COUNT};
pub use engine::{ControlMessage, EngineEvent, LockinEngine};
pub use error::EngineError;
pub use pacing::{Clock, MockClock, Pacer, SystemClock};
pub use params::{Params, ParamsUpdate};
