//! Element-wise activation layers.
//!
//! None of these have learnable parameters. Each one caches its forward
//! output and evaluates the derivative from that cached value.

use crate::nn::layer::{Layer, LayerError, Result};
use crate::tensor::Tensor;

/// Slope used by [`LeakyReLU`] for negative values.
pub const LEAK: f64 = 0.1;

fn cached<'a>(output: &'a Option<Tensor>, layer: &'static str) -> Result<&'a Tensor> {
    output.as_ref().ok_or(LayerError::NoForwardState { layer })
}

// --- LeakyReLU ---

/// `max(x, 0.1 * x)`.
///
/// The derivative is taken on the sign of the cached *output*: 1 where the
/// output is `>= 0`, 0.1 otherwise.
#[derive(Debug, Clone, Default)]
pub struct LeakyReLU {
    output: Option<Tensor>,
}

impl LeakyReLU {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for LeakyReLU {
    fn name(&self) -> &'static str {
        "leaky_relu"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let output = input.map(|x| x.max(LEAK * x));
        self.output = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let slope = cached(&self.output, self.name())?.map(|y| if y >= 0.0 { 1.0 } else { LEAK });
        Ok(slope.elementwise_multiply(grad)?)
    }

    fn update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }
}

// --- Tanh ---

#[derive(Debug, Clone, Default)]
pub struct Tanh {
    output: Option<Tensor>,
}

impl Tanh {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Tanh {
    fn name(&self) -> &'static str {
        "tanh"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let output = input.map(f64::tanh);
        self.output = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let slope = cached(&self.output, self.name())?.map(|t| 1.0 - t * t);
        Ok(grad.elementwise_multiply(&slope)?)
    }

    fn update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }
}

// --- Sigmoid ---

/// Logistic function `1 / (1 + e^-x)`, derivative `σ(1 - σ)`.
#[derive(Debug, Clone, Default)]
pub struct Sigmoid {
    output: Option<Tensor>,
}

impl Sigmoid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Layer for Sigmoid {
    fn name(&self) -> &'static str {
        "sigmoid"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let output = input.map(|x| 1.0 / (1.0 + (-x).exp()));
        self.output = Some(output.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let slope = cached(&self.output, self.name())?.map(|s| s * (1.0 - s));
        Ok(grad.elementwise_multiply(&slope)?)
    }

    fn update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }
}
