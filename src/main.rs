//! Command-line drivers: toy disk classifier, MNIST classifier, MNIST VAE.

use clap::{Parser, Subcommand};
use labnet::config::{ConfigError, TrainConfig};
use labnet::data::{DiskDataset, InMemoryDataset};
use labnet::nn::{Affine, FullyConnected, Layer, LeakyReLU, Network, Reparameterize, Sigmoid};
use labnet::serialization::{load_model, save_model, Checkpoint, CheckpointManager, CheckpointMeta};
use labnet::tensor::Tensor;
use labnet::train::{
    evaluate_classifier, generate_grid, sample_latents, train_classifier_epoch, train_vae_epoch,
};
use labnet::visualize::{draw_decision_map, write_grayscale_png};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

const MNIST_SIDE: usize = 28;
const MNIST_PIXELS: usize = MNIST_SIDE * MNIST_SIDE;
const MNIST_CLASSES: usize = 10;
const VAE_LATENT: usize = 10;
const DECISION_MAP_RES: u32 = 128;

/// Аргументы командной строки
#[derive(Parser, Debug)]
#[command(author, version, about = "labnet: small neural networks trained from scratch", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// JSON file with training hyper-parameters
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[arg(long, global = true)]
    batch_size: Option<usize>,

    #[arg(long, global = true)]
    epochs: Option<usize>,

    /// Learning rate
    #[arg(long, global = true)]
    rate: Option<f64>,

    #[arg(long, global = true)]
    seed: Option<u64>,

    /// Experiment name used in output file names
    #[arg(long, global = true)]
    name: Option<String>,

    /// Directory for images and saved models
    #[arg(long, global = true, default_value = ".")]
    out: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Learn which points of the unit square lie inside a centred disk
    Toy {
        /// Random points drawn per epoch
        #[arg(long, default_value_t = 1000)]
        samples: usize,
    },
    /// Digit classifier on MNIST CSV files (label first, then 784 pixels)
    Mnist {
        #[arg(long, default_value = "mnist_train.csv")]
        train: PathBuf,
        #[arg(long, default_value = "mnist_test.csv")]
        test: PathBuf,
    },
    /// Variational autoencoder on MNIST, writing generated digits each epoch
    Vae {
        #[arg(long, default_value = "mnist_train.csv")]
        train: PathBuf,
        /// Model JSON to start from
        #[arg(long)]
        weights: Option<PathBuf>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let config = resolve_config(&args)?;
    fs::create_dir_all(&args.out)?;

    match &args.command {
        Command::Toy { samples } => run_toy(&config, *samples, &args.out),
        Command::Mnist { train, test } => run_mnist(&config, train, test, &args.out),
        Command::Vae { train, weights } => run_vae(&config, train, weights.as_deref(), &args.out),
    }
}

/// Config file first, then command-line overrides.
fn resolve_config(args: &Args) -> Result<TrainConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => TrainConfig::load(path)?,
        None => TrainConfig::default(),
    };
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(epochs) = args.epochs {
        config.epochs = epochs;
    }
    if let Some(rate) = args.rate {
        config.learning_rate = rate;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(name) = &args.name {
        config.name = name.clone();
    }
    config.validate()?;
    Ok(config)
}

fn checkpoints(config: &TrainConfig) -> Option<CheckpointManager> {
    config
        .checkpoint_dir
        .as_ref()
        .map(|dir| CheckpointManager::new(dir, 3))
}

fn run_toy(config: &TrainConfig, samples: usize, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut model = Network::new()
        .with(Affine::translate(Tensor::column(&[-0.5, -0.5])))
        .with(FullyConnected::new(2, 6, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(6, 50, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(50, 6, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(6, 2, &mut rng));
    let mut train = DiskDataset::new(samples, rng.gen());
    let mut bench = DiskDataset::new(config.eval_samples, rng.gen());

    let eval = evaluate_classifier(&mut model, &mut bench, 2, config.eval_samples)?;
    info!("initial accuracy {:.4}", eval.accuracy);

    for epoch in 1..=config.epochs {
        let report = train_classifier_epoch(&mut model, &mut train, 2, config)?;
        let eval = evaluate_classifier(&mut model, &mut bench, 2, config.eval_samples)?;
        info!(
            "epoch {epoch}: {} batches, mean loss {:.6}, accuracy {:.4}",
            report.batches, report.mean_loss, eval.accuracy
        );
        if let Some((lo, hi)) = report.loss_range {
            debug!("epoch {epoch}: batch loss range {lo:.6}..{hi:.6}");
        }
        let path = out.join(format!("{}_toy_{epoch}.png", config.name));
        draw_decision_map(&mut model, DECISION_MAP_RES, &path)?;
    }
    Ok(())
}

fn run_mnist(
    config: &TrainConfig,
    train_path: &Path,
    test_path: &Path,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut train = InMemoryDataset::from_labelled_csv(train_path, rng.gen())?;
    let mut test = InMemoryDataset::from_labelled_csv(test_path, rng.gen())?;

    let mut model = Network::new()
        .with(Affine::translate(Tensor::filled(MNIST_PIXELS, 1, -128.0)))
        .with(Affine::scale(1.0 / 128.0))
        .with(FullyConnected::new(MNIST_PIXELS, 500, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(500, MNIST_CLASSES, &mut rng));
    let mut manager = checkpoints(config);

    let eval = evaluate_classifier(&mut model, &mut test, MNIST_CLASSES, config.eval_samples)?;
    info!("initial test accuracy {:.4}", eval.accuracy);

    for epoch in 1..=config.epochs {
        let report = train_classifier_epoch(&mut model, &mut train, MNIST_CLASSES, config)?;
        let train_eval =
            evaluate_classifier(&mut model, &mut train, MNIST_CLASSES, config.eval_samples)?;
        let test_eval =
            evaluate_classifier(&mut model, &mut test, MNIST_CLASSES, config.eval_samples)?;
        info!(
            "epoch {epoch}: mean loss {:.6}, train accuracy {:.4}, test accuracy {:.4}",
            report.mean_loss, train_eval.accuracy, test_eval.accuracy
        );
        info!(
            "test confusion (rows = predicted, cols = target):\n{}",
            test_eval.confusion.to_tensor()
        );

        if let Some(manager) = manager.as_mut() {
            let meta = CheckpointMeta::new()
                .with_model_name(&config.name)
                .with_epoch(epoch)
                .with_learning_rate(config.learning_rate)
                .with_last_loss(report.mean_loss)
                .with_metadata("test_accuracy", &test_eval.accuracy.to_string());
            manager.save(&Checkpoint::capture(&model, meta))?;
        }
    }
    save_model(out.join(format!("{}_mnist.json", config.name)), &model)?;
    Ok(())
}

fn run_vae(
    config: &TrainConfig,
    train_path: &Path,
    weights: Option<&Path>,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    info!("loading training set");
    let mut train = InMemoryDataset::from_labelled_csv(train_path, rng.gen())?;

    let encoder = Network::new()
        .with(Affine::translate(Tensor::filled(MNIST_PIXELS, 1, -0.5)))
        .with(FullyConnected::new(MNIST_PIXELS, 200, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(200, 2 * VAE_LATENT, &mut rng));
    let reparam = Reparameterize::with_seed(VAE_LATENT, rng.gen());
    let decoder = Network::new()
        .with(FullyConnected::new(VAE_LATENT, 200, &mut rng))
        .with(LeakyReLU::new())
        .with(FullyConnected::new(200, MNIST_PIXELS, &mut rng))
        .with(Sigmoid::new());
    let mut model = Network::new().with(encoder).with(reparam).with(decoder);

    if let Some(path) = weights {
        load_model(path, &mut model)?;
    }
    let mut manager = checkpoints(config);

    let latents = sample_latents(5, 6, VAE_LATENT, &mut rng);
    let (_, _, decoder) = vae_parts(&mut model)?;
    let grid = generate_grid(decoder, &latents, MNIST_SIDE)?;
    write_grayscale_png(&grid, out.join(format!("{}_start.png", config.name)))?;

    info!("starting training");
    for epoch in 1..=config.epochs {
        let (encoder, reparam, decoder) = vae_parts(&mut model)?;
        let report = train_vae_epoch(
            encoder,
            reparam,
            decoder,
            &mut train,
            MNIST_PIXELS,
            VAE_LATENT,
            config,
        )?;
        info!(
            "epoch {epoch}: kl loss {:.4}, recon loss {:.4}",
            report.kl, report.reconstruction
        );
        let grid = generate_grid(decoder, &latents, MNIST_SIDE)?;
        write_grayscale_png(&grid, out.join(format!("{}_{epoch}.png", config.name)))?;

        save_model(out.join(format!("{}_epoch{epoch}.json", config.name)), &model)?;
        if let Some(manager) = manager.as_mut() {
            let meta = CheckpointMeta::new()
                .with_model_name(&config.name)
                .with_epoch(epoch)
                .with_learning_rate(config.learning_rate)
                .with_last_loss(report.kl + report.reconstruction);
            manager.save(&Checkpoint::capture(&model, meta))?;
        }
    }
    Ok(())
}

/// Splits the VAE model into its encoder, reparameterization and decoder.
fn vae_parts(
    model: &mut Network,
) -> Result<(&mut dyn Layer, &mut dyn Layer, &mut dyn Layer), Box<dyn std::error::Error>> {
    match model.layers_mut() {
        [encoder, reparam, decoder] => Ok((encoder.as_mut(), reparam.as_mut(), decoder.as_mut())),
        other => Err(format!("vae model must have 3 parts, found {}", other.len()).into()),
    }
}
