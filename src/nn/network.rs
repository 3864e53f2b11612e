//! Sequential container of layers.

use crate::nn::layer::{Layer, LayerError, LayerState, Result};
use crate::tensor::Tensor;
use std::fmt;

/// Ordered list of layers that is itself a [`Layer`], so networks nest
/// (an encoder network can feed a decoder network inside a larger model).
#[derive(Default)]
pub struct Network {
    layers: Vec<Box<dyn Layer>>,
}

impl Network {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style append.
    pub fn with<L: Layer + 'static>(mut self, layer: L) -> Self {
        self.push(Box::new(layer));
        self
    }

    pub fn push(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [Box<dyn Layer>] {
        &mut self.layers
    }
}

impl fmt::Debug for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.layers.iter().map(|l| l.name()))
            .finish()
    }
}

impl Layer for Network {
    fn name(&self) -> &'static str {
        "network"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let mut x = input.clone();
        for layer in self.layers.iter_mut() {
            x = layer.forward(&x)?;
        }
        Ok(x)
    }

    /// Runs the layers in reverse, feeding each returned gradient to the
    /// layer before it.
    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let mut g = grad.clone();
        for layer in self.layers.iter_mut().rev() {
            g = layer.backward(&g)?;
        }
        Ok(g)
    }

    fn update(&mut self, rate: f64) -> Result<()> {
        for layer in self.layers.iter_mut() {
            layer.update(rate)?;
        }
        Ok(())
    }

    fn state(&self) -> LayerState {
        LayerState::Network {
            layers: self.layers.iter().map(|l| l.state()).collect(),
        }
    }

    fn validate_state(&self, state: &LayerState) -> Result<()> {
        let LayerState::Network { layers } = state else {
            return Err(LayerError::StateMismatch {
                layer: self.name(),
                reason: format!("expected network, found {}", state.describe()),
            });
        };
        if layers.len() != self.layers.len() {
            return Err(LayerError::StateMismatch {
                layer: self.name(),
                reason: format!(
                    "model has {} layers, saved state has {}",
                    self.layers.len(),
                    layers.len()
                ),
            });
        }
        for (layer, saved) in self.layers.iter().zip(layers) {
            layer.validate_state(saved)?;
        }
        Ok(())
    }

    /// Validates the whole tree first, so a mismatch anywhere leaves every
    /// layer untouched.
    fn restore(&mut self, state: &LayerState) -> Result<()> {
        self.validate_state(state)?;
        if let LayerState::Network { layers } = state {
            for (layer, saved) in self.layers.iter_mut().zip(layers) {
                layer.restore(saved)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::{Affine, FullyConnected, LeakyReLU, Reparameterize};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_forward_threads_layers_in_order() {
        let mut net = Network::new()
            .with(Affine::translate(Tensor::filled(2, 1, 1.0)))
            .with(Affine::scale(2.0));
        let y = net.forward(&Tensor::column(&[1.0, 2.0])).unwrap();
        assert_eq!(y.to_vec(), vec![4.0, 6.0]);
    }

    #[test]
    fn test_backward_runs_in_reverse() {
        let w = Tensor::from_vec(2, 2, vec![0.0, 1.0, 1.0, 0.0]).unwrap();
        let fc = FullyConnected::from_parameters(w, Tensor::zeros(2, 1)).unwrap();
        let mut net = Network::new().with(fc).with(Affine::scale(3.0));
        net.forward(&Tensor::column(&[1.0, 2.0])).unwrap();
        // scale backward first (×3), then the swap matrix transposed
        let g = net.backward(&Tensor::column(&[1.0, 0.0])).unwrap();
        assert_eq!(g.to_vec(), vec![0.0, 3.0]);
    }

    #[test]
    fn test_nested_networks() {
        let mut rng = StdRng::seed_from_u64(1);
        let encoder = Network::new().with(FullyConnected::new(3, 4, &mut rng));
        let decoder = Network::new()
            .with(FullyConnected::new(2, 3, &mut rng))
            .with(LeakyReLU::new());
        let mut model = Network::new()
            .with(encoder)
            .with(Reparameterize::with_seed(2, 4))
            .with(decoder);
        let y = model.forward(&Tensor::column(&[0.1, 0.2, 0.3])).unwrap();
        assert_eq!(y.shape(), (3, 1));
        let g = model.backward(&Tensor::filled(3, 1, 1.0)).unwrap();
        assert_eq!(g.shape(), (3, 1));
        model.update(0.01).unwrap();
        assert_eq!(
            format!("{:?}", model),
            r#"["network", "reparameterize", "network"]"#
        );
    }

    #[test]
    fn test_restore_is_all_or_nothing() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = Network::new()
            .with(FullyConnected::new(2, 2, &mut rng))
            .with(LeakyReLU::new())
            .with(FullyConnected::new(2, 3, &mut rng));
        let original = net.state();

        let LayerState::Network { mut layers } = original.clone() else {
            unreachable!()
        };
        layers[0] = LayerState::FullyConnected {
            weight: Tensor::identity(2),
            bias: Tensor::zeros(2, 1),
        };
        layers[2] = LayerState::FullyConnected {
            weight: Tensor::zeros(4, 2),
            bias: Tensor::zeros(4, 1),
        };
        let bad = LayerState::Network { layers };
        assert!(net.restore(&bad).is_err());
        assert_eq!(net.state(), original);

        let short = LayerState::Network { layers: vec![] };
        assert!(matches!(
            net.validate_state(&short),
            Err(LayerError::StateMismatch { layer: "network", .. })
        ));
    }

    #[test]
    fn test_empty_network_is_identity() {
        let mut net = Network::new();
        assert!(net.is_empty());
        let x = Tensor::column(&[1.0, -1.0]);
        assert_eq!(net.forward(&x).unwrap(), x);
        assert_eq!(net.backward(&x).unwrap(), x);
    }
}
