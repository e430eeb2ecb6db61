#![recursion_limit = "256"]

pub mod checkpoint;
pub mod config;
pub mod trainer;

pub use checkpoint::{
    checkpoint_file_name, load_fcnseg_from_checkpoint, load_tinyseg_from_checkpoint,
    save_checkpoint,
};
pub use config::{Criterion, TrainConfig};
pub use trainer::{
    fit, run_train, validate_backend_choice, ADBackend, BackendKind, ModelKind, TrainArgs,
};

/// Backend alias for training/prediction (NdArray by default; WGPU if enabled).
#[cfg(feature = "backend-wgpu")]
pub type TrainBackend = burn::backend::Wgpu<f32>;
#[cfg(not(feature = "backend-wgpu"))]
pub type TrainBackend = burn::backend::NdArray<f32>;
