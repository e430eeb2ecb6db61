//! Gradient-descent training loop and the `train` CLI entry point.

use crate::checkpoint::save_checkpoint;
use crate::config::{Criterion, TrainConfig};
use crate::TrainBackend;
use seg_dataset::IndexedDataset;
use anyhow::Context;
use burn::backend::Autodiff;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use clap::Parser;
use models::{FcnSeg, FcnSegConfig, SegmentationModel, TinySeg, TinySegConfig};
use seg_dataset::{BatchIter, LoaderConfig, ResizeFilter, TrainDataset, TransformPipeline};
use std::path::PathBuf;

/// Autodiff wrapper over the active backend.
pub type ADBackend = Autodiff<TrainBackend>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModelKind {
    Tiny,
    Fcn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Ndarray,
    Wgpu,
}

#[derive(Debug, Parser)]
#[command(name = "train", about = "Train a segmentation model on paired image/mask data")]
pub struct TrainArgs {
    /// Model architecture to train.
    #[arg(long, value_enum, default_value = "tiny")]
    pub model: ModelKind,

    /// Compute backend (wgpu requires the `backend-wgpu` feature).
    #[arg(long, value_enum, default_value = "ndarray")]
    pub backend: BackendKind,

    /// Dataset root containing `images/` and `groundtruth/` subdirectories.
    #[arg(long, default_value = "assets/datasets/roads")]
    pub dataset_root: PathBuf,

    #[arg(long, default_value_t = 10)]
    pub epochs: usize,

    #[arg(long, default_value_t = 4)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    /// Save a checkpoint every N epochs (0 disables checkpointing).
    #[arg(long, default_value_t = 5)]
    pub checkpoint_every: usize,

    /// Log a progress line every N batches (0 disables).
    #[arg(long, default_value_t = 100)]
    pub log_every: usize,

    #[arg(long, default_value = "checkpoints")]
    pub checkpoints_dir: PathBuf,

    #[arg(long, value_enum, default_value = "bce")]
    pub criterion: Criterion,

    /// Square side the pipeline resizes every pair to before batching.
    #[arg(long, default_value_t = 256)]
    pub patch_size: u32,

    #[arg(long, default_value_t = 0.5)]
    pub flip_prob: f32,

    #[arg(long, default_value_t = 10.0)]
    pub rotation_degrees: f32,

    /// JSON file with a custom stage list, replacing the built-in pipeline.
    #[arg(long)]
    pub pipeline: Option<PathBuf>,

    /// Keep samples in directory order instead of shuffling each epoch.
    #[arg(long)]
    pub no_shuffle: bool,

    /// Seed for reproducible shuffling and augmentation draws.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run_train(args: TrainArgs) -> anyhow::Result<()> {
    validate_backend_choice(args.backend)?;

    let dataset = TrainDataset::open(&args.dataset_root)?;
    if dataset.is_empty() {
        println!(
            "no image/groundtruth pairs under {}; nothing to train",
            args.dataset_root.display()
        );
        return Ok(());
    }
    println!("dataset: {} pairs", dataset.len());

    let pipeline = match &args.pipeline {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("reading pipeline file {}", path.display()))?;
            TransformPipeline::from_json(&json)?.with_seed(args.seed)
        }
        None => TransformPipeline::builder()
            .resize(args.patch_size, args.patch_size, ResizeFilter::default())
            .random_horizontal_flip(args.flip_prob)
            .random_vertical_flip(args.flip_prob)
            .random_rotation(args.rotation_degrees)
            .to_tensor()
            .seed(args.seed)
            .build(),
    };
    println!("pipeline: {}", pipeline.describe());

    let loader = LoaderConfig {
        shuffle: !args.no_shuffle,
        seed: args.seed,
        drop_last: false,
    };
    let mut batches = BatchIter::new(dataset, pipeline, loader);

    let cfg = TrainConfig {
        epochs: args.epochs,
        batch_size: args.batch_size,
        learning_rate: args.learning_rate,
        checkpoint_every: args.checkpoint_every,
        log_every_batches: args.log_every,
        checkpoints_dir: args.checkpoints_dir,
        criterion: args.criterion,
    };

    let device = <ADBackend as Backend>::Device::default();
    match args.model {
        ModelKind::Tiny => {
            let model = TinySeg::<ADBackend>::new(TinySegConfig::default(), &device);
            fit(model, &mut batches, &cfg, &device)?;
        }
        ModelKind::Fcn => {
            let model = FcnSeg::<ADBackend>::new(FcnSegConfig::default(), &device);
            fit(model, &mut batches, &cfg, &device)?;
        }
    }
    Ok(())
}

/// Runs the optimization loop and returns the trained model. Checkpoints are
/// written under `cfg.checkpoints_dir` on the configured epoch cadence.
pub fn fit<M>(
    mut model: M,
    batches: &mut BatchIter,
    cfg: &TrainConfig,
    device: &<ADBackend as Backend>::Device,
) -> anyhow::Result<M>
where
    M: SegmentationModel<ADBackend> + AutodiffModule<ADBackend>,
{
    let mut optim = AdamConfig::new().init();
    let total_batches = batches.batches(cfg.batch_size);

    for epoch in 0..cfg.epochs {
        batches.reset();
        let mut batch_idx = 0usize;
        let mut last_loss = 0.0f32;

        while let Some(batch) = batches.next_batch::<ADBackend>(cfg.batch_size, device)? {
            let output = model.forward(batch.images);
            let loss = cfg.criterion.loss(output, batch.masks);
            last_loss = scalar(loss.clone());

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optim.step(cfg.learning_rate, model, grads);

            batch_idx += 1;
            if cfg.log_every_batches > 0 && batch_idx % cfg.log_every_batches == 0 {
                println!("[epoch {epoch}, batch {batch_idx}/{total_batches}]: [loss {last_loss:.2}]");
            }
        }

        if cfg.checkpoint_every > 0 && epoch % cfg.checkpoint_every == 0 {
            let path = save_checkpoint(
                model.clone(),
                model.name(),
                epoch,
                last_loss,
                &cfg.checkpoints_dir,
            )?;
            println!("model saved to {}", path.display());
        }
    }
    Ok(model)
}

fn scalar(t: Tensor<ADBackend, 1>) -> f32 {
    t.into_data()
        .to_vec::<f32>()
        .unwrap_or_default()
        .into_iter()
        .next()
        .unwrap_or(0.0)
}

/// Rejects backend choices the binary was not compiled for.
pub fn validate_backend_choice(backend: BackendKind) -> anyhow::Result<()> {
    let wgpu_built = cfg!(feature = "backend-wgpu");
    match backend {
        BackendKind::Wgpu if !wgpu_built => {
            anyhow::bail!("wgpu backend requires building with --features backend-wgpu")
        }
        BackendKind::Ndarray if wgpu_built => {
            anyhow::bail!("built with the backend-wgpu feature; pass --backend wgpu")
        }
        _ => Ok(()),
    }
}
