//! Интеграционный тест: аналитические градиенты против конечных разностей.

use labnet::losses::{BinaryLogProb, Loss, NormalKL, SoftmaxCrossEntropy};
use labnet::nn::{FullyConnected, Layer, LeakyReLU, Network, Sigmoid, Tanh};
use labnet::tensor::Tensor;

const EPSILON: f64 = 1e-6;
const TOLERANCE: f64 = 1e-5;

/// Сравнивает два тензора поэлементно и паникует, если они не близки.
fn assert_grads_are_close(analytic: &Tensor, numeric: &Tensor) {
    assert_eq!(analytic.shape(), numeric.shape(), "Gradient shapes do not match!");

    for (a, n) in analytic.iter().zip(numeric.iter()) {
        let diff = (a - n).abs();
        let larger = a.abs().max(n.abs());
        if larger < 1e-9 {
            continue;
        }
        let relative_error = diff / larger;
        assert!(
            relative_error < TOLERANCE,
            "Gradients do not match! Analytic: {:.8}, Numeric: {:.8}, Relative Error: {:.8}",
            a,
            n,
            relative_error
        );
    }
}

/// Центральная разность скалярной функции по каждому элементу `x`.
fn numeric_grad(x: &Tensor, mut f: impl FnMut(&Tensor) -> f64) -> Tensor {
    let mut grad = Tensor::zeros(x.rows(), x.cols());
    for i in 0..x.rows() {
        for j in 0..x.cols() {
            let v = x.get(i, j).unwrap();
            let mut plus = x.clone();
            plus.set(i, j, v + EPSILON).unwrap();
            let mut minus = x.clone();
            minus.set(i, j, v - EPSILON).unwrap();
            grad.set(i, j, (f(&plus) - f(&minus)) / (2.0 * EPSILON)).unwrap();
        }
    }
    grad
}

/// Скалярная цель `sum(weights ∘ output)`, её градиент по выходу - `weights`.
fn weighted_sum(output: &Tensor, weights: &Tensor) -> f64 {
    output.elementwise_multiply(weights).unwrap().sum()
}

fn check_layer_input_grad(mut layer: impl Layer, x: &Tensor) {
    let y = layer.forward(x).unwrap();
    let weights = Tensor::from_vec(
        y.rows(),
        y.cols(),
        (0..y.len()).map(|i| 0.3 + 0.7 * i as f64).collect(),
    )
    .unwrap();
    let analytic = layer.backward(&weights).unwrap();
    let numeric = numeric_grad(x, |x| weighted_sum(&layer.forward(x).unwrap(), &weights));
    assert_grads_are_close(&analytic, &numeric);
}

fn small_weight() -> Tensor {
    Tensor::from_vec(3, 2, vec![0.5, -1.0, 0.25, 2.0, -0.75, 0.1]).unwrap()
}

fn small_bias() -> Tensor {
    Tensor::column(&[0.1, -0.2, 0.3])
}

#[test]
fn test_fully_connected_input_grad() {
    let fc = FullyConnected::from_parameters(small_weight(), small_bias()).unwrap();
    check_layer_input_grad(fc, &Tensor::column(&[0.4, -1.3]));
}

#[test]
fn test_fully_connected_parameter_grads() {
    let x = Tensor::column(&[0.4, -1.3]);
    let upstream = Tensor::column(&[1.0, -2.0, 0.5]);

    let mut fc = FullyConnected::from_parameters(small_weight(), small_bias()).unwrap();
    fc.forward(&x).unwrap();
    fc.backward(&upstream).unwrap();

    let numeric_w = numeric_grad(&small_weight(), |w| {
        let mut probe = FullyConnected::from_parameters(w.clone(), small_bias()).unwrap();
        weighted_sum(&probe.forward(&x).unwrap(), &upstream)
    });
    assert_grads_are_close(fc.weight_grad(), &numeric_w);

    let numeric_b = numeric_grad(&small_bias(), |b| {
        let mut probe = FullyConnected::from_parameters(small_weight(), b.clone()).unwrap();
        weighted_sum(&probe.forward(&x).unwrap(), &upstream)
    });
    assert_grads_are_close(fc.bias_grad(), &numeric_b);
}

#[test]
fn test_tanh_grad() {
    check_layer_input_grad(Tanh::new(), &Tensor::column(&[-1.5, 0.0, 0.3, 2.0]));
}

#[test]
fn test_sigmoid_grad() {
    check_layer_input_grad(Sigmoid::new(), &Tensor::column(&[-3.0, -0.2, 0.7, 4.0]));
}

#[test]
fn test_leaky_relu_grad_away_from_kink() {
    check_layer_input_grad(LeakyReLU::new(), &Tensor::column(&[-2.0, -0.5, 0.5, 3.0]));
}

#[test]
fn test_network_input_grad() {
    let net = Network::new()
        .with(FullyConnected::from_parameters(small_weight(), small_bias()).unwrap())
        .with(Tanh::new())
        .with(
            FullyConnected::from_parameters(
                Tensor::from_vec(2, 3, vec![1.0, 0.5, -0.5, 0.2, -1.0, 0.8]).unwrap(),
                Tensor::zeros(2, 1),
            )
            .unwrap(),
        )
        .with(Sigmoid::new());
    check_layer_input_grad(net, &Tensor::column(&[0.3, -0.6]));
}

fn loss_value(loss: &mut impl Loss, prediction: &Tensor) -> f64 {
    loss.reset();
    loss.loss(prediction).unwrap()
}

fn check_loss_grad(mut loss: impl Loss, prediction: &Tensor) {
    loss_value(&mut loss, prediction);
    let analytic = loss.backward().unwrap();
    let numeric = numeric_grad(prediction, |p| loss_value(&mut loss, p));
    assert_grads_are_close(&analytic, &numeric);
}

#[test]
fn test_softmax_cross_entropy_grad() {
    let loss = SoftmaxCrossEntropy::new(4).with_target(2).unwrap();
    check_loss_grad(loss, &Tensor::column(&[0.5, -1.0, 2.0, 0.1]));
}

#[test]
fn test_binary_log_prob_grad() {
    let mut loss = BinaryLogProb::new(3);
    loss.set_target(Tensor::column(&[0.9, 0.1, 0.5])).unwrap();
    check_loss_grad(loss, &Tensor::column(&[0.3, 0.6, 0.8]));
}

#[test]
fn test_normal_kl_grad() {
    check_loss_grad(NormalKL::new(2), &Tensor::column(&[0.5, 1.7, -0.4, 0.9]));
}
