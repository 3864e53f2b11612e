//! The `Layer` contract shared by every network building block.

use crate::tensor::{Shape, Tensor, TensorError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by layers during forward, backward, update or restore.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayerError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("{layer}: backward called before any forward pass")]
    NoForwardState { layer: &'static str },

    #[error("{layer}: expected input of shape {expected:?}, got {actual:?}")]
    InputShape {
        layer: &'static str,
        expected: Shape,
        actual: Shape,
    },

    #[error("{layer}: saved state does not match the model: {reason}")]
    StateMismatch { layer: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, LayerError>;

/// Persisted parameters of a layer (or of a whole network tree).
///
/// Only learnable parameters are stored; momentum buffers, gradient
/// accumulators and cached activations are rebuilt empty on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerState {
    FullyConnected { weight: Tensor, bias: Tensor },
    Network { layers: Vec<LayerState> },
    Stateless { layer: String },
}

impl LayerState {
    /// Short label used in mismatch messages.
    pub fn describe(&self) -> String {
        match self {
            LayerState::FullyConnected { weight, .. } => {
                format!("fully_connected {}x{}", weight.rows(), weight.cols())
            }
            LayerState::Network { layers } => format!("network of {} layers", layers.len()),
            LayerState::Stateless { layer } => layer.clone(),
        }
    }
}

/// A differentiable transformation.
///
/// Within one mini-batch the caller runs any number of `forward` calls, then
/// one `backward` with the batch gradient, then exactly one `update`.
/// Layers with learnable parameters add every `backward` contribution into
/// their gradient accumulators and clear them in `update`.
pub trait Layer {
    /// Stable identifier, also used to tag saved state.
    fn name(&self) -> &'static str;

    /// Computes the output and caches whatever `backward` needs.
    fn forward(&mut self, input: &Tensor) -> Result<Tensor>;

    /// Consumes the gradient w.r.t. this layer's output and returns the
    /// gradient w.r.t. its input.
    fn backward(&mut self, grad: &Tensor) -> Result<Tensor>;

    /// Applies the accumulated gradient. A no-op for parameterless layers.
    fn update(&mut self, rate: f64) -> Result<()>;

    fn state(&self) -> LayerState {
        LayerState::Stateless {
            layer: self.name().to_string(),
        }
    }

    /// Checks that `state` could be restored into this layer without
    /// changing anything.
    fn validate_state(&self, state: &LayerState) -> Result<()> {
        match state {
            LayerState::Stateless { layer } if layer == self.name() => Ok(()),
            other => Err(LayerError::StateMismatch {
                layer: self.name(),
                reason: format!("found {}", other.describe()),
            }),
        }
    }

    /// Replaces the learnable parameters with `state`.
    fn restore(&mut self, state: &LayerState) -> Result<()> {
        self.validate_state(state)
    }
}
