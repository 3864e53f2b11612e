//! # Neural Network Layers Module
//!
//! Building blocks for small feed-forward networks trained one sample at a
//! time. Every block implements [`Layer`]: `forward` caches what it needs,
//! `backward` accumulates gradients, `update` applies them.
//!
//! ## Available Layers
//!
//! ### Core Layers
//! - [`FullyConnected`]: dense layer `W·x + B` with momentum updates
//! - [`Affine`]: fixed scale and shift, used for input normalisation
//! - [`Network`]: ordered container, nestable
//!
//! ### Activations
//! - [`LeakyReLU`], [`Tanh`], [`Sigmoid`]
//!
//! ### Sampling
//! - [`Reparameterize`]: `σ ∘ ε + μ` for variational autoencoders
//!
//! ## Example
//!
//! ```ignore
//! use labnet::nn::{Affine, FullyConnected, Layer, LeakyReLU, Network};
//! use labnet::tensor::Tensor;
//!
//! let mut rng = StdRng::seed_from_u64(0);
//! let mut net = Network::new()
//!     .with(Affine::scale(1.0 / 128.0))
//!     .with(FullyConnected::new(784, 10, &mut rng))
//!     .with(LeakyReLU::new());
//! let y = net.forward(&Tensor::zeros(784, 1))?;
//! ```

pub mod activations;
pub mod affine;
pub mod layer;
pub mod linear;
pub mod network;
pub mod reparameterize;

pub use activations::{LeakyReLU, Sigmoid, Tanh};
pub use affine::Affine;
pub use layer::{Layer, LayerError, LayerState};
pub use linear::FullyConnected;
pub use network::Network;
pub use reparameterize::Reparameterize;
