use serde::{Deserialize, Serialize};

use crate::{real, ConfigError};

/// Which estimator `Model::update` uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LossKind {
    #[serde(rename = "hs")]
    HierarchicalSoftmax,
    #[serde(rename = "ns")]
    NegativeSampling,
    #[serde(rename = "softmax")]
    Softmax,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Embedding vector length (number of dimensions).
    pub dim: usize,
    pub loss: LossKind,
    /// Number of negative examples per positive one; used only by negative sampling.
    pub neg: usize,
    /// Starting learning rate.
    pub lr: real,
    /// Seed for the model's random number generator.
    pub seed: u64,
    /// Divide the gradient by the context length before applying it to the
    /// input rows, as supervised training does.
    pub normalize_gradient: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        ModelConfig {
            dim: 100,
            loss: LossKind::NegativeSampling,
            neg: 5,
            lr: 0.05,
            seed: 0,
            normalize_gradient: false,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dim == 0 {
            return Err(ConfigError::ZeroDimension);
        }
        if !self.lr.is_finite() || self.lr < 0.0 {
            return Err(ConfigError::InvalidLearningRate(self.lr));
        }
        if self.loss == LossKind::NegativeSampling && self.neg == 0 {
            return Err(ConfigError::NoNegatives);
        }
        Ok(())
    }
}
