// --- File: src/losses.rs ---

//! Loss functions with mini-batch accumulation.
//!
//! Each loss object is fed one prediction at a time. `loss` returns the
//! running total since the last `reset`, and `backward` returns the gradient
//! summed over the same calls. The training loop therefore looks like:
//!
//! ```ignore
//! loss.reset();
//! for (x, target) in batch {
//!     loss.set_target(target)?;
//!     loss.loss(&network.forward(&x)?)?;
//! }
//! network.backward(&loss.backward()?)?;
//! network.update(rate)?;
//! ```
//!
//! # Available Loss Functions
//!
//! - **Softmax cross-entropy**: [`SoftmaxCrossEntropy`]
//! - **Squared error** (running-average residual): [`SquaredError`]
//! - **Bernoulli negative log-likelihood**: [`BinaryLogProb`]
//! - **KL divergence to N(0, 1)**: [`NormalKL`]

use crate::tensor::{Shape, Tensor, TensorError};
use log::trace;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LossError {
    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error("{loss}: expected prediction of shape {expected:?}, got {actual:?}")]
    SizeMismatch {
        loss: &'static str,
        expected: Shape,
        actual: Shape,
    },

    #[error("{loss}: value {value} at row {row} is outside the open interval (0, 1)")]
    Domain {
        loss: &'static str,
        row: usize,
        value: f64,
    },

    #[error("target class {target} is out of range for {size} classes")]
    TargetOutOfRange { target: usize, size: usize },

    #[error("{loss}: backward called with no accumulated samples")]
    NoSamples { loss: &'static str },
}

pub type Result<T> = std::result::Result<T, LossError>;

/// Objective accumulated across one mini-batch.
pub trait Loss {
    /// Adds one prediction to the batch and returns the running loss.
    fn loss(&mut self, prediction: &Tensor) -> Result<f64>;

    /// Clears the accumulated loss and gradient.
    fn reset(&mut self);

    /// Gradient w.r.t. the prediction, summed over the batch so far.
    fn backward(&self) -> Result<Tensor>;
}

fn check_shape(loss: &'static str, expected: Shape, prediction: &Tensor) -> Result<()> {
    if prediction.shape() != expected {
        return Err(LossError::SizeMismatch {
            loss,
            expected,
            actual: prediction.shape(),
        });
    }
    Ok(())
}

// ============================================================================
// Softmax Cross-Entropy
// ============================================================================

/// Numerically stabilised softmax of a column of logits.
pub fn softmax(logits: &Tensor) -> Tensor {
    let max = logits.iter().fold(f64::NEG_INFINITY, f64::max);
    let exp = logits.map(|x| (x - max).exp());
    let denom = exp.sum();
    exp.scale(1.0 / denom)
}

/// Cross-entropy of `softmax(logits)` against an integer class.
///
/// Per call the gradient contribution is `p - onehot(target)` and the loss
/// grows by `-ln p[target]`.
#[derive(Debug, Clone)]
pub struct SoftmaxCrossEntropy {
    size: usize,
    target: usize,
    total: f64,
    gradient: Tensor,
}

impl SoftmaxCrossEntropy {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            target: 0,
            total: 0.0,
            gradient: Tensor::zeros(size, 1),
        }
    }

    pub fn with_target(mut self, target: usize) -> Result<Self> {
        self.set_target(target)?;
        Ok(self)
    }

    pub fn set_target(&mut self, target: usize) -> Result<()> {
        if target >= self.size {
            return Err(LossError::TargetOutOfRange {
                target,
                size: self.size,
            });
        }
        self.target = target;
        Ok(())
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn size(&self) -> usize {
        self.size
    }
}

impl Loss for SoftmaxCrossEntropy {
    fn loss(&mut self, prediction: &Tensor) -> Result<f64> {
        check_shape("softmax_cross_entropy", (self.size, 1), prediction)?;
        let p = softmax(prediction);
        let p_target = p.get(self.target, 0)?;
        let mut step = p;
        step.set(self.target, 0, p_target - 1.0)?;

        self.gradient = self.gradient.add(&step)?;
        self.total -= p_target.ln();
        trace!("softmax_cross_entropy: p[{}] = {:.6}", self.target, p_target);
        Ok(self.total)
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.gradient = Tensor::zeros(self.size, 1);
    }

    fn backward(&self) -> Result<Tensor> {
        Ok(self.gradient.clone())
    }
}

// ============================================================================
// Squared Error
// ============================================================================

/// Squared error of the batch-averaged residual.
///
/// Residuals `prediction - target` are summed into `diff`; after `n` calls
/// the loss is `|diff|² / n` and the gradient is `diff · 2 / n`.
#[derive(Debug, Clone)]
pub struct SquaredError {
    target: Tensor,
    diff: Tensor,
    count: usize,
}

impl SquaredError {
    pub fn new(target: Tensor) -> Self {
        let (rows, cols) = target.shape();
        Self {
            diff: Tensor::zeros(rows, cols),
            target,
            count: 0,
        }
    }

    /// Replaces the target for subsequent calls. Its shape may differ from
    /// the previous one only between batches.
    pub fn set_target(&mut self, target: Tensor) {
        self.target = target;
    }

    pub fn target(&self) -> &Tensor {
        &self.target
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

impl Loss for SquaredError {
    fn loss(&mut self, prediction: &Tensor) -> Result<f64> {
        check_shape("squared_error", self.target.shape(), prediction)?;
        let residual = prediction.subtract(&self.target)?;
        let diff = if self.count == 0 {
            residual
        } else {
            self.diff.add(&residual)?
        };
        self.diff = diff;
        self.count += 1;
        let norm: f64 = self.diff.iter().map(|d| d * d).sum();
        Ok(norm / self.count as f64)
    }

    fn reset(&mut self) {
        self.count = 0;
    }

    fn backward(&self) -> Result<Tensor> {
        if self.count == 0 {
            return Err(LossError::NoSamples {
                loss: "squared_error",
            });
        }
        Ok(self.diff.scale(2.0 / self.count as f64))
    }
}

// ============================================================================
// Binary Log-Probability
// ============================================================================

/// Bernoulli negative log-likelihood `-[x ln y + (1 - x) ln(1 - y)]` summed
/// over rows, for predictions `y` and target probabilities `x`.
///
/// Predictions must lie strictly inside (0, 1). The whole prediction is
/// checked before anything is accumulated.
#[derive(Debug, Clone)]
pub struct BinaryLogProb {
    target: Tensor,
    total: f64,
    gradient: Tensor,
}

impl BinaryLogProb {
    pub fn new(len: usize) -> Self {
        Self {
            target: Tensor::zeros(len, 1),
            total: 0.0,
            gradient: Tensor::zeros(len, 1),
        }
    }

    pub fn len(&self) -> usize {
        self.target.rows()
    }

    pub fn is_empty(&self) -> bool {
        self.target.is_empty()
    }

    pub fn set_target(&mut self, target: Tensor) -> Result<()> {
        check_shape("binary_log_prob", (self.len(), 1), &target)?;
        self.target = target;
        Ok(())
    }

    pub fn target(&self) -> &Tensor {
        &self.target
    }
}

impl Loss for BinaryLogProb {
    fn loss(&mut self, prediction: &Tensor) -> Result<f64> {
        check_shape("binary_log_prob", (self.len(), 1), prediction)?;
        if let Some((row, value)) = prediction
            .iter()
            .enumerate()
            .find(|&(_, y)| !(y > 0.0 && y < 1.0))
        {
            return Err(LossError::Domain {
                loss: "binary_log_prob",
                row,
                value,
            });
        }

        let mut step = Tensor::zeros(self.len(), 1);
        let mut added = 0.0;
        for (i, (x, y)) in self.target.iter().zip(prediction.iter()).enumerate() {
            added -= x * y.ln() + (1.0 - x) * (1.0 - y).ln();
            step.set(i, 0, -x / y + (1.0 - x) / (1.0 - y))?;
        }
        self.gradient = self.gradient.add(&step)?;
        self.total += added;
        Ok(self.total)
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.gradient = Tensor::zeros(self.len(), 1);
    }

    fn backward(&self) -> Result<Tensor> {
        Ok(self.gradient.clone())
    }
}

// ============================================================================
// KL Divergence to the Standard Normal
// ============================================================================

/// Closed-form `KL(N(μ, σ²) || N(0, 1))` for a `2n × 1` input laid out as
/// `[σ; μ]`.
///
/// Per dimension the loss is `-0.5 (1 + 2 ln σ - μ² - σ²)` and the gradient
/// is `σ - 1/σ` for σ and `μ` for μ. σ is not range checked: σ ≤ 0 yields a
/// non-finite loss.
#[derive(Debug, Clone)]
pub struct NormalKL {
    n: usize,
    total: f64,
    gradient: Tensor,
}

impl NormalKL {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            total: 0.0,
            gradient: Tensor::zeros(2 * n, 1),
        }
    }

    pub fn latent_size(&self) -> usize {
        self.n
    }
}

impl Loss for NormalKL {
    fn loss(&mut self, prediction: &Tensor) -> Result<f64> {
        check_shape("normal_kl", (2 * self.n, 1), prediction)?;
        let sigma = prediction.submatrix(0, 0, self.n, 1)?;
        let mu = prediction.submatrix(self.n, 0, self.n, 1)?;

        let added: f64 = sigma
            .iter()
            .zip(mu.iter())
            .map(|(s, m)| -0.5 * (1.0 + 2.0 * s.ln() - m * m - s * s))
            .sum();
        let d_sigma = sigma.map(|s| s - 1.0 / s);
        let step = Tensor::vstack(&[d_sigma, mu])?;

        self.gradient = self.gradient.add(&step)?;
        self.total += added;
        Ok(self.total)
    }

    fn reset(&mut self) {
        self.total = 0.0;
        self.gradient = Tensor::zeros(2 * self.n, 1);
    }

    fn backward(&self) -> Result<Tensor> {
        Ok(self.gradient.clone())
    }
}
