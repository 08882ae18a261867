use thiserror::Error;

/// Reasons a [`Model`](crate::Model) can't be built from a configuration and
/// a pair of matrices.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("embedding dimension must be at least 1")]
    ZeroDimension,

    #[error("{matrix} matrix has {actual} columns, expected dimension {expected}")]
    DimensionMismatch {
        matrix: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{0} matrix has no rows")]
    EmptyMatrix(&'static str),

    #[error("invalid learning rate {0}")]
    InvalidLearningRate(f32),

    #[error("negative sampling needs at least one negative per example")]
    NoNegatives,
}
