use std::path::{ Path, PathBuf };
use std::sync::{ mpsc, Arc };
use std::thread;

use anyhow::{ anyhow, Context, Result };
use burn::{ config::Config, optim::AdamConfig };
use clap::{ Args, Parser, Subcommand };
use tracing::info;

use crate::config::{ ArtifactPaths, TrainingConfig };
use crate::data::{ DataLoader, DatasetShape, GlyphDataset };
use crate::model::GlyphAutoencoderConfig;
use crate::train::{ evaluate, load_checkpoint, train_model, Loaders, TrainingReport };
use crate::utils::images::save_glyph_grid;
use crate::{ default_device, AutodiffTrainBackend, TrainBackend };

#[derive(Parser, Debug)]
#[command(
    name = "font-autoencoder",
    about = "Train a glyph autoencoder conditioned on alphabet and font category"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train from train.obj / val.obj / test.obj and write plots and a checkpoint.
    Train(TrainArgs),
    /// Reload a checkpoint and reconstruct the test split.
    Eval(EvalArgs),
    /// Print split sizes and label histograms.
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory holding the pickled splits.
    #[arg(long, default_value = "src/data/dataset/allfonts/")]
    pub data_dir: PathBuf,
    /// Where plots, config.json and the checkpoint are written.
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    /// Start from a saved config.json instead of the built-in defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<usize>,
    #[arg(long)]
    pub lr: Option<f64>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Keep train/validation in file order.
    #[arg(long)]
    pub no_shuffle: bool,
    /// Suffix for plot file names.
    #[arg(long, default_value = "3cat")]
    pub tag: String,
    /// TrueType font used for plot labels.
    #[arg(long)]
    pub plot_font: Option<PathBuf>,
    /// Show the terminal dashboard; logs go to font-autoencoder.log.
    #[arg(long)]
    pub dashboard: bool,
}

#[derive(Args, Debug)]
pub struct EvalArgs {
    #[arg(long)]
    pub checkpoint: PathBuf,
    /// config.json written by the training run.
    #[arg(long)]
    pub config: PathBuf,
    #[arg(long, default_value = "src/data/dataset/allfonts/")]
    pub data_dir: PathBuf,
    #[arg(long, default_value = ".")]
    pub out_dir: PathBuf,
    #[arg(long, default_value = "3cat")]
    pub tag: String,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    #[arg(long, default_value = "src/data/dataset/allfonts/")]
    pub data_dir: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

fn load_config(path: Option<&Path>) -> Result<TrainingConfig> {
    match path {
        Some(path) =>
            TrainingConfig::load(path).map_err(|e|
                anyhow!("failed to load config {}: {e:?}", path.display())
            ),
        None => Ok(TrainingConfig::new(GlyphAutoencoderConfig::new(), AdamConfig::new())),
    }
}

impl TrainArgs {
    pub fn resolve_config(&self) -> Result<TrainingConfig> {
        let mut config = load_config(self.config.as_deref())?;
        if let Some(epochs) = self.epochs {
            config.num_epochs = epochs;
        }
        if let Some(lr) = self.lr {
            config.learning_rate = lr;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if self.no_shuffle {
            config.shuffle_dataset = false;
        }
        config.validate()?;
        Ok(config)
    }
}

pub struct Splits {
    pub train: Arc<GlyphDataset>,
    pub valid: Arc<GlyphDataset>,
    pub test: Arc<GlyphDataset>,
}

pub fn load_split(data_dir: &Path, name: &str, shape: DatasetShape) -> Result<Arc<GlyphDataset>> {
    let path = data_dir.join(name);
    let dataset = GlyphDataset::from_pickle(&path, shape)?;
    info!(path = %path.display(), samples = dataset.len(), "loaded split");
    Ok(Arc::new(dataset))
}

pub fn load_splits(data_dir: &Path, shape: DatasetShape) -> Result<Splits> {
    Ok(Splits {
        train: load_split(data_dir, "train.obj", shape)?,
        valid: load_split(data_dir, "val.obj", shape)?,
        test: load_split(data_dir, "test.obj", shape)?,
    })
}

pub fn build_loaders(splits: Splits, config: &TrainingConfig) -> Loaders {
    Loaders {
        train: DataLoader::new(splits.train, config.batch_size, config.shuffle_dataset, config.seed),
        valid: DataLoader::new(splits.valid, config.batch_size, config.shuffle_dataset, config.seed),
        test: DataLoader::full_batch(splits.test),
    }
}

pub fn run_train(args: TrainArgs) -> Result<TrainingReport> {
    let config = args.resolve_config()?;
    let splits = load_splits(&args.data_dir, config.dataset_shape())?;
    let loaders = build_loaders(splits, &config);
    let artifacts = ArtifactPaths::new(&args.out_dir, &args.tag)
        .with_plot_font(args.plot_font.clone());
    let device = default_device();
    info!(device = ?device, "selected device");

    if !args.dashboard {
        return train_model::<AutodiffTrainBackend>(&config, loaders, &artifacts, None, device);
    }

    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        train_model::<AutodiffTrainBackend>(&config, loaders, &artifacts, Some(tx), device)
    });

    ui::run_dashboard(rx).map_err(|e| anyhow!("dashboard failed: {e}"))?;
    worker.join().map_err(|_| anyhow!("training thread panicked"))?
}

pub fn run_eval(args: EvalArgs) -> Result<f64> {
    let config = load_config(Some(&args.config))?;
    config.validate()?;
    let device = default_device();

    let test = load_split(&args.data_dir, "test.obj", config.dataset_shape())?;
    let mut loader = DataLoader::full_batch(test);
    let model = load_checkpoint::<TrainBackend>(&config.model, &args.checkpoint, &device)?;

    let evaluation = evaluate(&model, &mut loader, &device).context("evaluating the test set")?;
    info!("Test Results - MSE: {:.7}", evaluation.mse);

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    let artifacts = ArtifactPaths::new(&args.out_dir, &args.tag);
    let grid = artifacts.glyph_grid(config.num_epochs);
    let (real, fake) = evaluation.output;
    save_glyph_grid(real, fake, &grid)?;
    info!(path = %grid.display(), "saved glyph grid");

    Ok(evaluation.mse)
}

pub fn run_inspect(args: InspectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let shape = config.dataset_shape();
    let splits = load_splits(&args.data_dir, shape)?;
    let loaders = build_loaders(splits, &config);

    for (name, loader) in [
        ("train", &loaders.train),
        ("valid", &loaders.valid),
        ("test", &loaders.test),
    ] {
        loader.dataset().print(name);
        println!("Batches: {} (batch size {})", loader.len_batch(), loader.batch_size());
    }
    println!(
        "Declared split ratios: validation {} test {} (splits are read from disk)",
        config.validation_split,
        config.test_split
    );
    Ok(())
}
