//! PPO policy/value model and agent implemented with [candle](https://crates.io/crates/candle-core).
//!
//! The model, [`PpoModel`](ppo::PpoModel), implements
//! [`ParameterSerialize`](herald_ps::ParameterSerialize), so it can be
//! broadcast by a learner and pulled by actors through `herald-ps`.
pub mod error;
pub mod mlp;
pub mod model;
pub mod ppo;
pub mod util;
use anyhow::Result;
use candle_core::Tensor;
use serde::{Deserialize, Serialize};

/// Activation function applied after a layer.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Copy)]
pub enum Activation {
    /// Identity.
    None,

    /// Rectified linear unit.
    ReLU,

    /// Hyperbolic tangent.
    Tanh,
}

impl Default for Activation {
    fn default() -> Self {
        Self::None
    }
}

impl Activation {
    /// Applies the activation function.
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        Ok(match self {
            Self::None => xs.clone(),
            Self::ReLU => xs.relu()?,
            Self::Tanh => xs.tanh()?,
        })
    }
}
