//! Per-example training and inference core for word-representation and text
//! classification models.
//!
//! A [`Model`] averages input embedding rows into a hidden vector, scores a
//! target class with hierarchical softmax, negative sampling or a full
//! softmax, and writes the gradient step straight back into the shared
//! [`Matrix`] parameters. Many models, one per worker thread, may share the
//! same matrices without locking.

mod collector;
mod config;
mod error;
pub mod matrix;
mod model;
pub mod negatives;
pub mod tree;

pub use collector::{IndexScore, TopIndexScoresCollector};
pub use config::{LossKind, ModelConfig};
pub use error::ConfigError;
pub use matrix::Matrix;
pub use model::{Model, Targets, MIN_LR};
pub use negatives::{NegativeTable, NEGATIVE_TABLE_SIZE};
pub use tree::{Node, Tree};

#[allow(non_camel_case_types)]
pub type real = f32; // Precision of float numbers

/// Smallest argument [`log`] will take, so that probabilities of exactly 0
/// never turn into infinite losses.
pub const LOG_EPSILON: real = 1e-5;

/// The logistic function, 1 / (1 + e^-x).
pub fn sigmoid(x: real) -> real {
    1.0 / (1.0 + (-x).exp())
}

/// Natural log of a probability, clamped to `[LOG_EPSILON, 1]` first.
pub fn log(p: real) -> real {
    p.clamp(LOG_EPSILON, 1.0).ln()
}
