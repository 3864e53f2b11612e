//! Mini-batch training loops and evaluation.
//!
//! Every loop follows the same protocol: `reset` the loss, run `forward` and
//! `loss` for each sample of the batch, then one `backward` with the
//! accumulated gradient and one `update`. When the source runs dry in the
//! middle of a batch that batch is dropped and the epoch ends.

use crate::config::{ConfigError, TrainConfig};
use crate::data::SampleSource;
use crate::losses::{BinaryLogProb, Loss, LossError, NormalKL, SoftmaxCrossEntropy};
use crate::metrics::{Accuracy, ConfusionMatrix, Metric, RunningMean, RunningMinMax};
use crate::nn::{Layer, LayerError};
use crate::tensor::{Tensor, TensorError};
use log::{debug, info, warn};
use rand::Rng;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error(transparent)]
    Layer(#[from] LayerError),

    #[error(transparent)]
    Loss(#[from] LossError),

    #[error(transparent)]
    Tensor(#[from] TensorError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, TrainError>;

/// Pixel scaling applied to VAE inputs so they become probabilities.
pub const PIXEL_SCALE: f64 = 1.0 / 256.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EpochReport {
    /// Mean over applied batches of the batch's summed loss.
    pub mean_loss: f64,
    /// Number of `update` calls made.
    pub batches: usize,
    /// Smallest and largest batch loss, `None` when no batch was applied.
    pub loss_range: Option<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VaeReport {
    /// Sum over applied batches of the batch KL loss.
    pub kl: f64,
    /// Sum over applied batches of the batch reconstruction loss.
    pub reconstruction: f64,
    pub batches: usize,
}

/// Index of the largest output, the first one on ties.
pub fn predict(network: &mut dyn Layer, input: &Tensor) -> Result<usize> {
    Ok(network.forward(input)?.argmax().unwrap_or(0))
}

/// One pass over `source` with softmax cross-entropy over `num_classes`.
pub fn train_classifier_epoch<S>(
    network: &mut dyn Layer,
    source: &mut S,
    num_classes: usize,
    config: &TrainConfig,
) -> Result<EpochReport>
where
    S: SampleSource<Target = usize> + ?Sized,
{
    config.validate()?;
    source.reset();
    let mut loss = SoftmaxCrossEntropy::new(num_classes);
    let mut mean = RunningMean::new();
    let mut range = RunningMinMax::new();

    'epoch: loop {
        loss.reset();
        let mut batch_loss = 0.0;
        for filled in 0..config.batch_size {
            let Some((x, label)) = source.next_sample() else {
                if filled > 0 {
                    warn!("dropping partial batch of {filled} samples");
                }
                break 'epoch;
            };
            loss.set_target(label)?;
            batch_loss = loss.loss(&network.forward(&x)?)?;
        }
        network.backward(&loss.backward()?)?;
        network.update(config.learning_rate)?;
        mean.update(batch_loss);
        range.update(batch_loss);
        debug!("batch {}: loss {:.6}", mean.count(), batch_loss);
    }

    Ok(EpochReport {
        mean_loss: mean.compute(),
        batches: mean.count(),
        loss_range: range.range(),
    })
}

/// Classifies up to `limit` samples from a freshly reset `source`.
///
/// Rows of the confusion matrix are predicted classes, columns are targets.
/// With no samples the accuracy is 1.
pub fn evaluate_classifier<S>(
    network: &mut dyn Layer,
    source: &mut S,
    num_classes: usize,
    limit: usize,
) -> Result<Evaluation>
where
    S: SampleSource<Target = usize> + ?Sized,
{
    source.reset();
    let mut accuracy = Accuracy::new();
    let mut confusion = ConfusionMatrix::new(num_classes);

    for _ in 0..limit {
        let Some((x, target)) = source.next_sample() else {
            break;
        };
        let predicted = predict(network, &x)?;
        accuracy.update(&predicted, &target);
        confusion.update(&predicted, &target);
    }

    Ok(Evaluation {
        accuracy: accuracy.compute(),
        confusion,
    })
}

/// One pass of variational autoencoder training.
///
/// Each input is scaled by [`PIXEL_SCALE`] and used as its own
/// reconstruction target. The encoder output is `[σ; μ]` of size
/// `2 * latent`. Per batch the encoder first receives the KL gradient, then
/// the reconstruction gradient routed back through the decoder and the
/// reparameterization.
pub fn train_vae_epoch<S>(
    encoder: &mut dyn Layer,
    reparam: &mut dyn Layer,
    decoder: &mut dyn Layer,
    source: &mut S,
    pixels: usize,
    latent: usize,
    config: &TrainConfig,
) -> Result<VaeReport>
where
    S: SampleSource + ?Sized,
{
    config.validate()?;
    source.reset();
    let mut kl_loss = NormalKL::new(latent);
    let mut recon_loss = BinaryLogProb::new(pixels);
    let mut report = VaeReport::default();

    'epoch: loop {
        kl_loss.reset();
        recon_loss.reset();
        let (mut kl, mut recon) = (0.0, 0.0);
        for filled in 0..config.batch_size {
            let Some((x, _)) = source.next_sample() else {
                if filled > 0 {
                    warn!("dropping partial batch of {filled} samples");
                }
                break 'epoch;
            };
            let x = x.scale(PIXEL_SCALE);
            recon_loss.set_target(x.clone())?;
            let q = encoder.forward(&x)?;
            kl = kl_loss.loss(&q)?;
            let z = reparam.forward(&q)?;
            let x_hat = decoder.forward(&z)?;
            recon = recon_loss.loss(&x_hat)?;
        }

        encoder.backward(&kl_loss.backward()?)?;
        let through_decoder = decoder.backward(&recon_loss.backward()?)?;
        encoder.backward(&reparam.backward(&through_decoder)?)?;
        encoder.update(config.learning_rate)?;
        reparam.update(config.learning_rate)?;
        decoder.update(config.learning_rate)?;

        report.kl += kl;
        report.reconstruction += recon;
        report.batches += 1;
        debug!("batch {}: kl {:.4} recon {:.4}", report.batches, kl, recon);
    }

    if !(report.kl.is_finite() && report.reconstruction.is_finite()) {
        warn!(
            "non-finite VAE loss after {} batches (kl {}, recon {})",
            report.batches, report.kl, report.reconstruction
        );
    }
    info!(
        "vae epoch: {} batches, kl {:.4}, recon {:.4}",
        report.batches, report.kl, report.reconstruction
    );
    Ok(report)
}

/// `rows × cols` standard-normal latent vectors of size `latent`.
pub fn sample_latents<R: Rng + ?Sized>(
    rows: usize,
    cols: usize,
    latent: usize,
    rng: &mut R,
) -> Vec<Vec<Tensor>> {
    (0..rows)
        .map(|_| (0..cols).map(|_| Tensor::gaussian(latent, 1, rng)).collect())
        .collect()
}

/// Decodes every latent into a `side × side` image and tiles them.
pub fn generate_grid(decoder: &mut dyn Layer, latents: &[Vec<Tensor>], side: usize) -> Result<Tensor> {
    let mut tiles = Vec::with_capacity(latents.len());
    for row in latents {
        let mut decoded = Vec::with_capacity(row.len());
        for z in row {
            decoded.push(decoder.forward(z)?.reshape(side, side)?);
        }
        tiles.push(decoded);
    }
    Ok(Tensor::grid(&tiles)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{DiskDataset, InMemoryDataset};
    use crate::nn::{FullyConnected, Network, Reparameterize, Sigmoid};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset(n: usize) -> InMemoryDataset {
        let samples = (0..n).map(|i| Tensor::column(&[i as f64, 1.0])).collect();
        let labels = (0..n).map(|i| i % 2).collect();
        InMemoryDataset::new(samples, labels, 0).unwrap()
    }

    fn identity_classifier() -> Network {
        Network::new()
            .with(FullyConnected::from_parameters(Tensor::identity(2), Tensor::zeros(2, 1)).unwrap())
    }

    #[test]
    fn test_partial_batch_is_dropped() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut net = identity_classifier();
        let mut data = dataset(7);
        let config = TrainConfig::new().with_batch_size(3).with_learning_rate(0.1);

        let report = train_classifier_epoch(&mut net, &mut data, 2, &config).unwrap();
        assert_eq!(report.batches, 2);
        assert!(report.mean_loss > 0.0);
        assert_ne!(net.state(), identity_classifier().state());
    }

    #[test]
    fn test_short_epoch_does_not_update() {
        let mut net = identity_classifier();
        let mut data = dataset(2);
        let config = TrainConfig::new().with_batch_size(5);

        let report = train_classifier_epoch(&mut net, &mut data, 2, &config).unwrap();
        assert_eq!(report, EpochReport::default());
        assert_eq!(net.state(), identity_classifier().state());
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut net = identity_classifier();
        let config = TrainConfig::new().with_batch_size(0);
        assert!(matches!(
            train_classifier_epoch(&mut net, &mut dataset(2), 2, &config),
            Err(TrainError::Config(_))
        ));
    }

    #[test]
    fn test_evaluate() {
        // identity network: predicts class 0 when x0 > x1
        let mut net = identity_classifier();
        let samples = vec![
            Tensor::column(&[2.0, 1.0]),
            Tensor::column(&[0.0, 1.0]),
            Tensor::column(&[3.0, 1.0]),
        ];
        let mut data = InMemoryDataset::new(samples, vec![0, 1, 1], 4).unwrap();

        let eval = evaluate_classifier(&mut net, &mut data, 2, 500).unwrap();
        assert!((eval.accuracy - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(eval.confusion.count(0, 1), 1);
        assert_eq!(eval.confusion.count(0, 0), 1);
        assert_eq!(eval.confusion.count(1, 1), 1);

        let limited = evaluate_classifier(&mut net, &mut data, 2, 1).unwrap();
        assert_eq!(limited.confusion.total(), 1);

        let empty = evaluate_classifier(&mut net, &mut data, 2, 0).unwrap();
        assert_eq!(empty.accuracy, 1.0);
    }

    #[test]
    fn test_toy_training_runs() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut net = Network::new()
            .with(FullyConnected::new(2, 4, &mut rng))
            .with(crate::nn::LeakyReLU::new())
            .with(FullyConnected::new(4, 2, &mut rng));
        let mut data = DiskDataset::new(40, 6);
        let config = TrainConfig::new().with_batch_size(4).with_learning_rate(1e-3);

        let report = train_classifier_epoch(&mut net, &mut data, 2, &config).unwrap();
        assert_eq!(report.batches, 10);
        assert!(report.mean_loss.is_finite());
        let (lo, hi) = report.loss_range.unwrap();
        assert!(lo <= report.mean_loss && report.mean_loss <= hi);
    }

    #[test]
    fn test_vae_epoch() {
        let mut rng = StdRng::seed_from_u64(8);
        // small weights keep the sigmoid away from 0 and 1
        let mut encoder = Network::new().with(
            FullyConnected::from_parameters(
                Tensor::zeros(4, 4),
                Tensor::column(&[1.0, 1.0, 0.0, 0.0]),
            )
            .unwrap(),
        );
        let mut reparam = Reparameterize::with_seed(2, 9);
        let mut decoder = Network::new()
            .with(FullyConnected::new(2, 4, &mut rng))
            .with(Sigmoid::new());

        let samples = (0..5).map(|i| Tensor::filled(4, 1, 50.0 * i as f64)).collect();
        let mut data = InMemoryDataset::new(samples, vec![0; 5], 1).unwrap();
        let config = TrainConfig::new().with_batch_size(2).with_learning_rate(1e-4);

        let report = train_vae_epoch(
            &mut encoder,
            &mut reparam,
            &mut decoder,
            &mut data,
            4,
            2,
            &config,
        )
        .unwrap();
        assert_eq!(report.batches, 2);
        // σ = 1, μ = 0 on the first batch, so KL starts at zero
        assert!(report.kl >= 0.0);
        assert!(report.reconstruction > 0.0);
    }

    #[test]
    fn test_generate_grid() {
        let mut decoder = Network::new().with(
            FullyConnected::from_parameters(Tensor::filled(4, 1, 1.0), Tensor::zeros(4, 1)).unwrap(),
        );
        let mut rng = StdRng::seed_from_u64(0);
        let latents = sample_latents(2, 3, 1, &mut rng);
        let grid = generate_grid(&mut decoder, &latents, 2).unwrap();
        assert_eq!(grid.shape(), (4, 6));
        // each tile is the constant latent value
        let z = latents[1][2].get(0, 0).unwrap();
        assert_eq!(grid.get(3, 5).unwrap(), z);
    }
}
