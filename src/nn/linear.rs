//! Fully connected layer with learnable weight and bias.

use crate::nn::layer::{Layer, LayerError, LayerState, Result};
use crate::optimizers::Momentum;
use crate::tensor::Tensor;
use rand::Rng;

/// Computes `y = W·x + B` for a column input `x`.
///
/// `W` is `out × in` and `B` is `out × 1`. Gradients from every `backward`
/// call since the last `update` are summed in `weight_grad`/`bias_grad`,
/// so a whole mini-batch is applied in a single momentum step.
#[derive(Debug, Clone)]
pub struct FullyConnected {
    weight: Tensor,
    bias: Tensor,
    weight_grad: Tensor,
    bias_grad: Tensor,
    weight_momentum: Momentum,
    bias_momentum: Momentum,
    /// Last input seen by `forward`.
    input: Option<Tensor>,
}

impl FullyConnected {
    /// Creates an `in_features → out_features` layer with weight and bias
    /// drawn from a standard normal distribution.
    pub fn new<R: Rng + ?Sized>(in_features: usize, out_features: usize, rng: &mut R) -> Self {
        let weight = Tensor::gaussian(out_features, in_features, rng);
        let bias = Tensor::gaussian(out_features, 1, rng);
        Self::with_parameters(weight, bias)
    }

    /// Creates a layer from explicit parameters. `bias` must be
    /// `weight.rows() × 1`.
    pub fn from_parameters(weight: Tensor, bias: Tensor) -> Result<Self> {
        if bias.shape() != (weight.rows(), 1) {
            return Err(LayerError::StateMismatch {
                layer: "fully_connected",
                reason: format!(
                    "bias {:?} does not fit weight {:?}",
                    bias.shape(),
                    weight.shape()
                ),
            });
        }
        Ok(Self::with_parameters(weight, bias))
    }

    fn with_parameters(weight: Tensor, bias: Tensor) -> Self {
        let (out_features, in_features) = weight.shape();
        Self {
            weight_grad: Tensor::zeros(out_features, in_features),
            bias_grad: Tensor::zeros(out_features, 1),
            weight_momentum: Momentum::new(out_features, in_features),
            bias_momentum: Momentum::new(out_features, 1),
            weight,
            bias,
            input: None,
        }
    }

    pub fn in_features(&self) -> usize {
        self.weight.cols()
    }

    pub fn out_features(&self) -> usize {
        self.weight.rows()
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Gradient accumulated since the last `update`.
    pub fn weight_grad(&self) -> &Tensor {
        &self.weight_grad
    }

    pub fn bias_grad(&self) -> &Tensor {
        &self.bias_grad
    }

    pub fn weight_momentum(&self) -> &Momentum {
        &self.weight_momentum
    }

    pub fn bias_momentum(&self) -> &Momentum {
        &self.bias_momentum
    }

    fn clear_gradients(&mut self) {
        self.weight_grad = Tensor::zeros(self.out_features(), self.in_features());
        self.bias_grad = Tensor::zeros(self.out_features(), 1);
    }
}

impl Layer for FullyConnected {
    fn name(&self) -> &'static str {
        "fully_connected"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let output = self.weight.multiply(input)?.add(&self.bias)?;
        self.input = Some(input.clone());
        Ok(output)
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        let input = self
            .input
            .as_ref()
            .ok_or(LayerError::NoForwardState { layer: self.name() })?;

        // dW[i][j] += grad[i] * input[j]
        let weight_grad = self.weight_grad.add(&grad.multiply(&input.transpose())?)?;
        let bias_grad = self.bias_grad.add(grad)?;
        let input_grad = self.weight.transpose().multiply(grad)?;

        self.weight_grad = weight_grad;
        self.bias_grad = bias_grad;
        Ok(input_grad)
    }

    fn update(&mut self, rate: f64) -> Result<()> {
        self.weight_momentum
            .step(&mut self.weight, &self.weight_grad, rate)?;
        self.bias_momentum.step(&mut self.bias, &self.bias_grad, rate)?;
        self.clear_gradients();
        Ok(())
    }

    fn state(&self) -> LayerState {
        LayerState::FullyConnected {
            weight: self.weight.clone(),
            bias: self.bias.clone(),
        }
    }

    fn validate_state(&self, state: &LayerState) -> Result<()> {
        match state {
            LayerState::FullyConnected { weight, bias }
                if weight.shape() == self.weight.shape() && bias.shape() == self.bias.shape() =>
            {
                Ok(())
            }
            other => Err(LayerError::StateMismatch {
                layer: self.name(),
                reason: format!(
                    "expected fully_connected {}x{}, found {}",
                    self.out_features(),
                    self.in_features(),
                    other.describe()
                ),
            }),
        }
    }

    fn restore(&mut self, state: &LayerState) -> Result<()> {
        self.validate_state(state)?;
        if let LayerState::FullyConnected { weight, bias } = state {
            self.weight = weight.clone();
            self.bias = bias.clone();
        }
        self.weight_momentum.reset();
        self.bias_momentum.reset();
        self.clear_gradients();
        self.input = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn small_layer() -> FullyConnected {
        let weight = Tensor::from_vec(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let bias = Tensor::column(&[0.5, -0.5]);
        FullyConnected::from_parameters(weight, bias).unwrap()
    }

    #[test]
    fn test_forward() {
        let mut fc = small_layer();
        let y = fc.forward(&Tensor::column(&[1.0, 1.0])).unwrap();
        assert_eq!(y.to_vec(), vec![3.5, 6.5]);
    }

    #[test]
    fn test_backward_accumulates_outer_product() {
        let mut fc = small_layer();
        fc.forward(&Tensor::column(&[1.0, 2.0])).unwrap();
        let g = Tensor::column(&[0.1, -0.2]);
        let dx = fc.backward(&g).unwrap();

        // Wᵗ·g
        assert_abs_diff_eq!(dx.get(0, 0).unwrap(), 1.0 * 0.1 + 3.0 * -0.2, epsilon = 1e-12);
        assert_abs_diff_eq!(dx.get(1, 0).unwrap(), 2.0 * 0.1 + 4.0 * -0.2, epsilon = 1e-12);

        let expected = [0.1, 0.2, -0.2, -0.4];
        for (a, e) in fc.weight_grad().iter().zip(expected) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-12);
        }
        assert_eq!(fc.bias_grad().to_vec(), vec![0.1, -0.2]);

        // a second sample in the same batch adds on top
        fc.forward(&Tensor::column(&[1.0, 0.0])).unwrap();
        fc.backward(&g).unwrap();
        let expected = [0.2, 0.2, -0.4, -0.4];
        for (a, e) in fc.weight_grad().iter().zip(expected) {
            assert_abs_diff_eq!(a, e, epsilon = 1e-12);
        }
        assert_abs_diff_eq!(fc.bias_grad().get(0, 0).unwrap(), 0.2, epsilon = 1e-12);
    }

    #[test]
    fn test_update_applies_momentum_and_clears() {
        let mut fc = small_layer();
        fc.forward(&Tensor::column(&[1.0, 2.0])).unwrap();
        fc.backward(&Tensor::column(&[1.0, 1.0])).unwrap();
        let grad = fc.weight_grad().clone();
        let before = fc.weight().clone();

        fc.update(0.1).unwrap();

        let velocity = fc.weight_momentum().velocity();
        assert_eq!(velocity, &grad.scale(0.1));
        assert_eq!(fc.weight(), &before.subtract(velocity).unwrap());
        assert_abs_diff_eq!(fc.bias().get(0, 0).unwrap(), 0.4, epsilon = 1e-12);
        assert_abs_diff_eq!(fc.bias().get(1, 0).unwrap(), -0.6, epsilon = 1e-12);
        assert_eq!(fc.weight_grad().sum(), 0.0);
        assert_eq!(fc.bias_grad().sum(), 0.0);
    }

    #[test]
    fn test_backward_before_forward() {
        let mut fc = small_layer();
        assert_eq!(
            fc.backward(&Tensor::column(&[1.0, 1.0])),
            Err(LayerError::NoForwardState { layer: "fully_connected" })
        );
    }

    #[test]
    fn test_bad_input_shape() {
        let mut fc = small_layer();
        assert!(matches!(
            fc.forward(&Tensor::column(&[1.0, 2.0, 3.0])),
            Err(LayerError::Tensor(_))
        ));
    }

    #[test]
    fn test_gaussian_init_shapes() {
        let mut rng = StdRng::seed_from_u64(3);
        let fc = FullyConnected::new(4, 3, &mut rng);
        assert_eq!(fc.weight().shape(), (3, 4));
        assert_eq!(fc.bias().shape(), (3, 1));
        assert_eq!(fc.in_features(), 4);
        assert_eq!(fc.out_features(), 3);
    }

    #[test]
    fn test_state_restore() {
        let mut fc = small_layer();
        let state = LayerState::FullyConnected {
            weight: Tensor::identity(2),
            bias: Tensor::zeros(2, 1),
        };
        fc.restore(&state).unwrap();
        assert_eq!(fc.state(), state);

        let wrong = LayerState::FullyConnected {
            weight: Tensor::identity(3),
            bias: Tensor::zeros(3, 1),
        };
        assert!(matches!(fc.restore(&wrong), Err(LayerError::StateMismatch { .. })));
        assert_eq!(fc.weight(), &Tensor::identity(2));
    }

    #[test]
    fn test_from_parameters_rejects_bias() {
        assert!(FullyConnected::from_parameters(Tensor::identity(2), Tensor::zeros(3, 1)).is_err());
    }
}
