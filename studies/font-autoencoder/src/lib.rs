#![recursion_limit = "256"]

pub mod cli;
pub mod config;
pub mod data;
pub mod metrics;
pub mod model;
pub mod report;
pub mod train;
pub mod utils;

use burn::prelude::Backend;

pub use config::{ ArtifactPaths, TrainingConfig };
pub use data::{ DataLoader, DatasetError, DatasetShape, GlyphBatch, GlyphDataset, GlyphSample };
pub use model::{ GlyphAutoencoder, GlyphAutoencoderConfig };
pub use train::{ eval_step, evaluate, load_checkpoint, train_model, train_step, History, Loaders };

/// Backend used for training and evaluation (NdArray by default, LibTorch with `tch`).
#[cfg(not(feature = "tch"))]
pub type TrainBackend = burn::backend::NdArray<f32>;
#[cfg(feature = "tch")]
pub type TrainBackend = burn::backend::LibTorch<f32>;

pub type AutodiffTrainBackend = burn::backend::Autodiff<TrainBackend>;

/// Picks the device once at startup: GPU index 1 when CUDA is available, CPU otherwise.
pub fn default_device() -> <TrainBackend as Backend>::Device {
    #[cfg(feature = "tch")]
    {
        use burn::backend::libtorch::LibTorchDevice;
        if tch::Cuda::is_available() { LibTorchDevice::Cuda(1) } else { LibTorchDevice::Cpu }
    }
    #[cfg(not(feature = "tch"))]
    {
        burn::backend::ndarray::NdArrayDevice::Cpu
    }
}
