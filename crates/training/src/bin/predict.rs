//! Run a trained checkpoint over a directory of images and write binary masks.

use anyhow::Context;
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use clap::Parser;
use image::GrayImage;
use models::SegmentationModel;
use seg_dataset::{IndexedDataset, InferenceDataset, Plane};
use std::path::PathBuf;
use training::{
    load_fcnseg_from_checkpoint, load_tinyseg_from_checkpoint, validate_backend_choice,
    BackendKind, ModelKind, TrainBackend,
};

#[derive(Debug, Parser)]
#[command(name = "predict", about = "Segment a directory of PNGs with a trained model")]
struct Args {
    #[arg(long, value_enum, default_value = "tiny")]
    model: ModelKind,

    #[arg(long, value_enum, default_value = "ndarray")]
    backend: BackendKind,

    /// Directory of input PNGs (searched recursively).
    #[arg(long)]
    images_dir: PathBuf,

    /// Checkpoint file written by the train binary.
    #[arg(long)]
    checkpoint: PathBuf,

    #[arg(long, default_value = "predictions")]
    out_dir: PathBuf,

    /// Probability above which a pixel is foreground.
    #[arg(long, default_value_t = 0.5)]
    threshold: f32,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    validate_backend_choice(args.backend)?;

    let device = <TrainBackend as Backend>::Device::default();
    let dataset = InferenceDataset::open(&args.images_dir)?;
    if dataset.is_empty() {
        println!("no PNGs under {}", args.images_dir.display());
        return Ok(());
    }
    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating {}", args.out_dir.display()))?;

    match args.model {
        ModelKind::Tiny => {
            let model = load_tinyseg_from_checkpoint::<TrainBackend, _>(&args.checkpoint, &device)
                .with_context(|| format!("loading {}", args.checkpoint.display()))?;
            predict_all(&model, &dataset, &args, &device)
        }
        ModelKind::Fcn => {
            let model = load_fcnseg_from_checkpoint::<TrainBackend, _>(&args.checkpoint, &device)
                .with_context(|| format!("loading {}", args.checkpoint.display()))?;
            predict_all(&model, &dataset, &args, &device)
        }
    }
}

fn predict_all<M: SegmentationModel<TrainBackend>>(
    model: &M,
    dataset: &InferenceDataset,
    args: &Args,
    device: &<TrainBackend as Backend>::Device,
) -> anyhow::Result<()> {
    for (idx, name) in dataset.names().iter().enumerate() {
        let sample = dataset.get(idx)?;
        let Plane::Tensor(plane) = sample.image else {
            anyhow::bail!("inference pipeline must end in a tensor stage");
        };
        let (c, h, w) = (plane.channels as usize, plane.height as usize, plane.width as usize);
        let input = Tensor::<TrainBackend, 1>::from_floats(plane.data.as_slice(), device)
            .reshape([1, c, h, w]);

        let probs = model.forward(input).into_data().to_vec::<f32>().unwrap_or_default();
        let mut mask = GrayImage::new(w as u32, h as u32);
        for (pixel, p) in mask.pixels_mut().zip(probs) {
            pixel.0[0] = if p > args.threshold { 255 } else { 0 };
        }

        let file_name = name
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| name.clone());
        let out_path = args.out_dir.join(file_name);
        mask.save(&out_path)
            .with_context(|| format!("writing {}", out_path.display()))?;
        println!("wrote {}", out_path.display());
    }
    Ok(())
}
