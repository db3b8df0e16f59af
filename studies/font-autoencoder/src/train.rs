use std::fs::{ create_dir_all, File };
use std::io::BufWriter;
use std::path::{ Path, PathBuf };
use std::sync::mpsc::Sender;

use anyhow::{ anyhow, Context, Result };
use burn::{
    module::{ AutodiffModule, Module },
    nn::loss::{ MseLoss, Reduction },
    optim::{ GradientsParams, Optimizer },
    prelude::*,
    record::{ FullPrecisionSettings, NamedMpkFileRecorder },
    tensor::backend::AutodiffBackend,
};
use serde::{ Deserialize, Serialize };
use ui::state::TrainingState;

use crate::config::{ ArtifactPaths, TrainingConfig };
use crate::data::{ DataLoader, GlyphBatch };
use crate::metrics::{ MeanLoss, RunningAverage };
use crate::model::{ GlyphAutoencoder, GlyphAutoencoderConfig };
use crate::report::ProgressReporter;
use crate::utils::{ images::save_glyph_grid, plot::HistoryPlot };

pub struct Loaders {
    pub train: DataLoader,
    pub valid: DataLoader,
    pub test: DataLoader,
}

/// Per-epoch aggregate MSE, in epoch order.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct History {
    pub train: Vec<f64>,
    pub valid: Vec<f64>,
}

#[derive(Debug)]
pub struct TrainingReport {
    pub history: History,
    pub history_plot: PathBuf,
    pub history_json: PathBuf,
    pub glyph_grid: PathBuf,
    pub checkpoint: PathBuf,
}

/// Result of one evaluator pass.
pub struct Evaluation<B: Backend> {
    pub mse: f64,
    /// `(original, reconstructed)` of the last batch.
    pub output: (Tensor<B, 3>, Tensor<B, 3>),
}

/// One optimisation step. Returns the updated model and the batch loss.
pub fn train_step<B, O>(
    model: GlyphAutoencoder<B>,
    optim: &mut O,
    batch: GlyphBatch<B>,
    learning_rate: f64
) -> (GlyphAutoencoder<B>, f64)
    where B: AutodiffBackend, O: Optimizer<GlyphAutoencoder<B>, B>
{
    let (reconstruction, _) = model.forward(batch.images.clone(), batch.alphabet, batch.category);
    let loss = MseLoss::new().forward(reconstruction, batch.images, Reduction::Mean);
    let loss_value = loss.clone().into_scalar().elem::<f64>();

    let grads = GradientsParams::from_grads(loss.backward(), &model);
    let model = optim.step(learning_rate, model, grads);

    (model, loss_value)
}

/// Forward pass without gradients: `(original, reconstructed)`.
pub fn eval_step<B: Backend>(
    model: &GlyphAutoencoder<B>,
    batch: GlyphBatch<B>
) -> (Tensor<B, 3>, Tensor<B, 3>) {
    let (reconstruction, _) = model.forward(batch.images.clone(), batch.alphabet, batch.category);
    (batch.images, reconstruction)
}

/// Runs the evaluator over a whole loader and averages MSE over samples.
pub fn evaluate<B: Backend>(
    model: &GlyphAutoencoder<B>,
    loader: &mut DataLoader,
    device: &B::Device
) -> Result<Evaluation<B>> {
    let mse_loss = MseLoss::new();
    let mut mean = MeanLoss::default();
    let mut output = None;

    for batch in loader.iter::<B>(device) {
        let n = batch.len();
        let (real, fake) = eval_step(model, batch);
        let loss = mse_loss
            .forward(fake.clone(), real.clone(), Reduction::Mean)
            .into_scalar()
            .elem::<f64>();
        mean.update(loss, n);
        output = Some((real, fake));
    }

    match (mean.compute(), output) {
        (Some(mse), Some(output)) => Ok(Evaluation { mse, output }),
        _ => Err(anyhow!("cannot evaluate an empty loader")),
    }
}

pub fn save_history(history: &History, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), history)
        .with_context(|| format!("failed to write history to {}", path.display()))
}

pub fn save_checkpoint<B: Backend>(model: &GlyphAutoencoder<B>, path: &Path) -> Result<()> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    model
        .clone()
        .save_file(path, &recorder)
        .map_err(|e| anyhow!("failed to save checkpoint {}: {e}", path.display()))
}

/// Loads weights into a freshly initialised model of the same architecture.
pub fn load_checkpoint<B: Backend>(
    config: &GlyphAutoencoderConfig,
    path: &Path,
    device: &B::Device
) -> Result<GlyphAutoencoder<B>> {
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    config
        .init::<B>(device)
        .load_file(path, &recorder, device)
        .map_err(|e| anyhow!("failed to load checkpoint {}: {e}", path.display()))
}

pub fn train_model<B: AutodiffBackend>(
    config: &TrainingConfig,
    mut loaders: Loaders,
    artifacts: &ArtifactPaths,
    tx: Option<Sender<TrainingState>>,
    device: B::Device
) -> Result<TrainingReport> {
    config.validate()?;
    create_dir_all(&artifacts.out_dir).with_context(||
        format!("failed to create {}", artifacts.out_dir.display())
    )?;
    config
        .save(artifacts.config())
        .with_context(|| format!("failed to save {}", artifacts.config().display()))?;

    let mut reporter = ProgressReporter::new(tx);
    reporter.split("train", loaders.train.len());
    reporter.split("valid", loaders.valid.len());
    reporter.split("test", loaders.test.len());

    let mut model: GlyphAutoencoder<B> = config.model.init(&device);
    let mut optim = config.optimizer.init();
    let mut running = RunningAverage::default();
    let mut history = History::default();

    let total_batch_train = loaders.train.len_batch();
    reporter.started(config.num_epochs, total_batch_train, config.batch_size);

    for epoch in 1..=config.num_epochs {
        running.reset();
        reporter.epoch_started(epoch);

        for (i, batch) in loaders.train.iter::<B>(&device).enumerate() {
            let (updated, loss) = train_step(model, &mut optim, batch, config.learning_rate);
            model = updated;
            let average = running.update(loss);

            let iteration = i + 1;
            if iteration % config.log_interval == 0 {
                reporter.iteration(epoch, iteration, loss, average);
            }
        }

        let model_valid = model.valid();
        let train_mse = evaluate(&model_valid, &mut loaders.train, &device)
            .context("evaluating the training set")?.mse;
        let valid_mse = evaluate(&model_valid, &mut loaders.valid, &device)
            .context("evaluating the validation set")?.mse;

        history.train.push(train_mse);
        history.valid.push(valid_mse);
        reporter.epoch_completed(epoch, train_mse, valid_mse);
    }

    let history_plot = artifacts.history_plot(history.train.len());
    let plot = match &artifacts.plot_font {
        Some(font) => HistoryPlot::default().with_font_file(font)?,
        None => HistoryPlot::default().with_system_font(),
    };
    plot.save(&history.train, &history.valid, &history_plot)?;
    reporter.artifact("history plot", &history_plot);
    let history_json = artifacts.history_json();
    save_history(&history, &history_json)?;
    reporter.artifact("history", &history_json);

    let model_valid = model.valid();
    let test = evaluate(&model_valid, &mut loaders.test, &device).context(
        "evaluating the test set"
    )?;
    tracing::info!("Test Results - MSE: {:.7}", test.mse);
    let (real, fake) = test.output;
    let glyph_grid = artifacts.glyph_grid(config.num_epochs);
    save_glyph_grid(real, fake, &glyph_grid)?;
    reporter.artifact("glyph grid", &glyph_grid);

    let checkpoint = artifacts.checkpoint(config.learning_rate, config.num_epochs);
    save_checkpoint(&model, &checkpoint)?;
    reporter.artifact("checkpoint", &checkpoint);

    reporter.finished();

    Ok(TrainingReport { history, history_plot, history_json, glyph_grid, checkpoint })
}
