#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(missing_docs)]
//! Library entry for zlbkit.
//!
//! Solves linear rational-expectations models with one occasionally binding
//! constraint (such as a zero lower bound) by searching over the regime
//! `(l, k)`: the constraint is slack for `l` periods, then binds for `k`.
//! Also provides the plots used to inspect the results.
//!
//! # Modules
//! - [`system`]: the linear system and its JSON form
//! - [`linalg`]: matrix powers and geometric series
//! - [`boehl`]: the (l, k) search, direct and against precomputed tables
//! - [`model`]: a system with optional tables; simulation
//! - [`plot`]: time-series panels, bifurcation diagrams, heatmaps

/// Error type shared by the solver modules
pub mod error;

/// Linear system with an occasionally binding constraint
pub mod system;

/// Matrix helpers
pub mod linalg;

/// The (l, k) search
pub mod boehl;

/// Systems with optional precomputed tables
pub mod model;

/// Visualization utilities for generating charts
pub mod plot;

pub use error::{Error, Result};
pub use model::{Model, Simulation};
pub use system::LinearSystem;
