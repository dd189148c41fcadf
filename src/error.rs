//! Error type for the solver and the model loader

use thiserror::Error;

/// Errors raised while building a system or running the (l, k) search.
#[derive(Debug, Error)]
pub enum Error {
    /// A matrix or vector does not have the expected shape.
    #[error("dimension mismatch for {name}: expected {expected}, got {got}")]
    Dimension {
        /// Name of the offending input
        name: &'static str,
        /// Expected shape, e.g. "3x3"
        expected: String,
        /// Actual shape
        got: String,
    },

    /// An input contains NaN or an infinite entry.
    #[error("{0} contains non-finite entries")]
    NonFinite(&'static str),

    /// The leading block of J N^k A^l cannot be inverted.
    #[error("singular terminal block for l={l}, k={k}")]
    Singular {
        /// Periods before the constraint binds
        l: usize,
        /// Periods the constraint binds
        k: usize,
    },

    /// A lookup fell outside the precomputed tables.
    #[error("({l}, {k}, s={s}) outside precomputed range l<{ll_max}, k<{kk_max}")]
    OutOfTable {
        /// Requested l
        l: usize,
        /// Requested k
        k: usize,
        /// Requested horizon
        s: usize,
        /// Table size in l
        ll_max: usize,
        /// Table size in k
        kk_max: usize,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Axis mode string not understood by [`crate::plot::AxisFormat`].
    #[error("no such axis mode: {0}")]
    UnsupportedAxisMode(String),

    /// Reading a system file failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The system file is not valid JSON for a [`crate::system::SystemSpec`].
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Shorthand `Result` used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;
