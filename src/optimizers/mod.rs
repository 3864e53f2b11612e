//! Momentum gradient descent used by the learnable layers.
//!
//! There is no separate optimizer object walking a parameter map: each
//! learnable tensor owns a [`Momentum`] buffer and the layer calls
//! [`Momentum::step`] from its own `update`. The coefficient is fixed.

use crate::tensor::{Tensor, TensorError};

/// Weight given to the previous velocity on every step.
pub const MOMENTUM: f64 = 0.9;

/// Velocity buffer for one parameter tensor.
#[derive(Debug, Clone, PartialEq)]
pub struct Momentum {
    velocity: Tensor,
}

impl Momentum {
    /// Zero velocity for a parameter of the given shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            velocity: Tensor::zeros(rows, cols),
        }
    }

    pub fn velocity(&self) -> &Tensor {
        &self.velocity
    }

    /// `velocity = 0.9 * velocity + rate * gradient`, then
    /// `parameter -= velocity`.
    ///
    /// Nothing is modified if the shapes disagree.
    pub fn step(
        &mut self,
        parameter: &mut Tensor,
        gradient: &Tensor,
        rate: f64,
    ) -> Result<(), TensorError> {
        let velocity = self.velocity.scale(MOMENTUM).add(&gradient.scale(rate))?;
        let updated = parameter.subtract(&velocity)?;
        self.velocity = velocity;
        *parameter = updated;
        Ok(())
    }

    /// Forgets all accumulated velocity.
    pub fn reset(&mut self) {
        let (rows, cols) = self.velocity.shape();
        self.velocity = Tensor::zeros(rows, cols);
    }
}
