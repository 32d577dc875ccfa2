//! Engine error types

use lockin_dsp::filter_design::DesignError;
use thiserror::Error;

/// Errors surfaced by the engine facade.
///
/// Only filter design failures stop an update; everything else in normal
/// sample processing is clamped or ignored by design.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// A control message other than `Init` arrived before `Init`.
    #[error("engine received {0} before Init")]
    NotInitialized(&'static str),

    /// The shared buffer does not match the declared snapshot geometry.
    #[error("shared buffer holds {actual} points per channel, expected {expected}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// A message that needs a running chain arrived while stopped.
    #[error("engine received {0} while not running")]
    NotRunning(&'static str),

    /// Filter design rejected the requested parameters.
    #[error(transparent)]
    Design(#[from] DesignError),
}
