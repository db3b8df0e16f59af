use std::path::{ Path, PathBuf };

use anyhow::{ bail, Result };
use burn::{ optim::AdamConfig, prelude::* };

use crate::data::DatasetShape;
use crate::model::GlyphAutoencoderConfig;

#[derive(Config)]
pub struct TrainingConfig {
    pub model: GlyphAutoencoderConfig,
    pub optimizer: AdamConfig,
    #[config(default = 32)]
    pub batch_size: usize,
    /// Declared for reference only; the splits come pre-made on disk.
    #[config(default = 0.15)]
    pub validation_split: f64,
    #[config(default = 0.05)]
    pub test_split: f64,
    #[config(default = true)]
    pub shuffle_dataset: bool,
    #[config(default = 42)]
    pub seed: u64,
    #[config(default = 2e-4)]
    pub learning_rate: f64,
    #[config(default = 10)]
    pub log_interval: usize,
    #[config(default = 30)]
    pub num_epochs: usize,
    /// Glyphs are square, `image_size` pixels per side.
    #[config(default = 128)]
    pub image_size: usize,
}

impl TrainingConfig {
    pub fn dataset_shape(&self) -> DatasetShape {
        DatasetShape {
            image_size: self.image_size,
            category_size: self.model.category_size,
            alpha_size: self.model.alpha_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            bail!("batch size must be positive");
        }
        if self.log_interval == 0 {
            bail!("log interval must be positive");
        }
        if self.image_size == 0 {
            bail!("image size must be positive");
        }
        if self.model.font_size != self.image_size * self.image_size {
            bail!(
                "model font size {} does not match {}x{} glyphs",
                self.model.font_size,
                self.image_size,
                self.image_size
            );
        }
        Ok(())
    }
}

/// Where the end-of-training artifacts go and how they are named.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub out_dir: PathBuf,
    pub tag: String,
    /// TrueType font for history plot labels.
    pub plot_font: Option<PathBuf>,
}

impl ArtifactPaths {
    pub fn new<P: AsRef<Path>>(out_dir: P, tag: &str) -> Self {
        Self { out_dir: out_dir.as_ref().to_path_buf(), tag: tag.to_string(), plot_font: None }
    }

    pub fn with_plot_font(mut self, plot_font: Option<PathBuf>) -> Self {
        self.plot_font = plot_font;
        self
    }

    pub fn history_plot(&self, epochs: usize) -> PathBuf {
        self.out_dir.join(format!("history_epoch_{}_{}.png", epochs, self.tag))
    }

    pub fn history_json(&self) -> PathBuf {
        self.out_dir.join(format!("history_{}.json", self.tag))
    }

    pub fn glyph_grid(&self, epoch: usize) -> PathBuf {
        self.out_dir.join(format!("real_fake_fonts_{}_{}.png", epoch, self.tag))
    }

    /// The extension is part of the name so the recorder does not cut the learning rate at its dot.
    pub fn checkpoint(&self, learning_rate: f64, epochs: usize) -> PathBuf {
        self.out_dir.join(format!("AE_base_lr_{}_epochs_{}.mpk", learning_rate, epochs))
    }

    pub fn config(&self) -> PathBuf {
        self.out_dir.join("config.json")
    }
}
