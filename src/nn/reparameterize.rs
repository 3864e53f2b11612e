//! Reparameterization trick for sampling inside a network.

use crate::nn::layer::{Layer, LayerError, Result};
use crate::tensor::Tensor;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Splits a `2n × 1` input into `σ` (first `n` rows) and `μ` (last `n` rows)
/// and outputs `σ ∘ ε + μ` with fresh `ε ~ N(0, 1)` on every forward call.
///
/// `backward` returns `[ε; 1]`, the derivative of the output with respect
/// to `σ` and `μ`. The incoming gradient is accepted but not folded in.
#[derive(Debug, Clone)]
pub struct Reparameterize<R = StdRng> {
    n: usize,
    rng: R,
    /// Noise drawn by the most recent forward.
    noise: Option<Tensor>,
}

impl Reparameterize<StdRng> {
    pub fn with_seed(n: usize, seed: u64) -> Self {
        Self::new(n, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Reparameterize<R> {
    pub fn new(n: usize, rng: R) -> Self {
        Self {
            n,
            rng,
            noise: None,
        }
    }

    /// Latent dimension `n`.
    pub fn latent_size(&self) -> usize {
        self.n
    }

    pub fn noise(&self) -> Option<&Tensor> {
        self.noise.as_ref()
    }
}

impl<R: Rng> Layer for Reparameterize<R> {
    fn name(&self) -> &'static str {
        "reparameterize"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        if input.shape() != (2 * self.n, 1) {
            return Err(LayerError::InputShape {
                layer: self.name(),
                expected: (2 * self.n, 1),
                actual: input.shape(),
            });
        }
        let noise = Tensor::gaussian(self.n, 1, &mut self.rng);
        let sigma = input.submatrix(0, 0, self.n, 1)?;
        let mu = input.submatrix(self.n, 0, self.n, 1)?;
        let output = sigma.elementwise_multiply(&noise)?.add(&mu)?;
        self.noise = Some(noise);
        Ok(output)
    }

    fn backward(&mut self, _grad: &Tensor) -> Result<Tensor> {
        let noise = self
            .noise
            .as_ref()
            .ok_or(LayerError::NoForwardState { layer: self.name() })?;
        Ok(Tensor::vstack(&[noise, &Tensor::filled(self.n, 1, 1.0)])?)
    }

    fn update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }
}
