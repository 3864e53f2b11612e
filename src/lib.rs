//! # labnet: a from-scratch neural network training stack
//!
//! Dense `f64` matrices, layers with hand-written backward passes, losses
//! that accumulate over a mini-batch and a momentum update. There is no
//! computation graph: every layer caches what it needs in `forward` and
//! computes its own gradient in `backward`.
//!
//! ## Usage Example
//!
//! ```no_run
//! use labnet::losses::{Loss, SoftmaxCrossEntropy};
//! use labnet::nn::{FullyConnected, Layer, LeakyReLU, Network};
//! use labnet::tensor::Tensor;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut rng = StdRng::seed_from_u64(0);
//! let mut net = Network::new()
//!     .with(FullyConnected::new(2, 8, &mut rng))
//!     .with(LeakyReLU::new())
//!     .with(FullyConnected::new(8, 2, &mut rng));
//!
//! let mut loss = SoftmaxCrossEntropy::new(2);
//! loss.reset();
//! for (x, label) in [([0.1, 0.2], 0), ([0.9, 0.4], 1)] {
//!     loss.set_target(label)?;
//!     loss.loss(&net.forward(&Tensor::column(&x))?)?;
//! }
//! net.backward(&loss.backward()?)?;
//! net.update(1e-3)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod losses;
pub mod metrics;
pub mod nn;
pub mod optimizers;
pub mod serialization;
pub mod tensor;
pub mod train;
pub mod visualize;
