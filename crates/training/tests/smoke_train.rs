//! End-to-end training smoke tests on tiny synthetic datasets.

use image::{GrayImage, Rgb, RgbImage};
use models::{TinySeg, TinySegConfig};
use seg_dataset::{BatchIter, LoaderConfig, TrainDataset, TransformPipeline};
use std::path::Path;
use training::trainer::ADBackend;
use training::{fit, load_tinyseg_from_checkpoint, Criterion, TrainConfig};

fn write_pair(root: &Path, name: &str, side: u32) {
    let img_dir = root.join("images");
    let gt_dir = root.join("groundtruth");
    std::fs::create_dir_all(&img_dir).unwrap();
    std::fs::create_dir_all(&gt_dir).unwrap();

    let mut img = RgbImage::new(side, side);
    for (x, y, p) in img.enumerate_pixels_mut() {
        *p = Rgb([(x * 255 / side.max(1)) as u8, (y * 255 / side.max(1)) as u8, 64]);
    }
    let mut gt = GrayImage::new(side, side);
    for (x, _, p) in gt.enumerate_pixels_mut() {
        p.0[0] = if x >= side / 2 { 255 } else { 0 };
    }
    img.save(img_dir.join(name)).unwrap();
    gt.save(gt_dir.join(name)).unwrap();
}

fn checkpoint_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

fn make_batches(root: &Path, seed: u64) -> BatchIter {
    let dataset = TrainDataset::open(root).unwrap();
    let pipeline = TransformPipeline::builder().to_tensor().seed(Some(seed)).build();
    let cfg = LoaderConfig {
        shuffle: true,
        seed: Some(seed),
        drop_last: false,
    };
    BatchIter::new(dataset, pipeline, cfg)
}

#[test]
fn two_epochs_with_interval_one_write_two_checkpoints() {
    let tmp = tempfile::tempdir().unwrap();
    for name in ["a.png", "b.png", "c.png"] {
        write_pair(tmp.path(), name, 16);
    }
    let mut batches = make_batches(tmp.path(), 7);

    let ckpt_dir = tmp.path().join("checkpoints");
    let cfg = TrainConfig {
        epochs: 2,
        batch_size: 1,
        learning_rate: 1e-3,
        checkpoint_every: 1,
        log_every_batches: 0,
        checkpoints_dir: ckpt_dir.clone(),
        criterion: Criterion::Bce,
    };

    let device = Default::default();
    let model = TinySeg::<ADBackend>::new(TinySegConfig { hidden: 4 }, &device);
    fit(model, &mut batches, &cfg, &device).unwrap();

    let files = checkpoint_files(&ckpt_dir);
    assert_eq!(files.len(), 2, "files: {files:?}");
    assert!(files.iter().all(|f| f.contains("_tinyseg_epoch_")));
    assert!(files.iter().all(|f| f.ends_with(".bin")));

    let restored =
        load_tinyseg_from_checkpoint::<ADBackend, _>(ckpt_dir.join(&files[0]), &device);
    assert!(restored.is_ok(), "reload failed: {:?}", restored.err());
}

#[test]
fn interval_larger_than_epoch_count_checkpoints_only_epoch_zero() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "only.png", 8);
    let mut batches = make_batches(tmp.path(), 3);

    let ckpt_dir = tmp.path().join("checkpoints");
    let cfg = TrainConfig {
        epochs: 2,
        batch_size: 1,
        learning_rate: 1e-3,
        checkpoint_every: 3,
        log_every_batches: 0,
        checkpoints_dir: ckpt_dir.clone(),
        criterion: Criterion::Mse,
    };

    let device = Default::default();
    let model = TinySeg::<ADBackend>::new(TinySegConfig { hidden: 4 }, &device);
    fit(model, &mut batches, &cfg, &device).unwrap();

    let files = checkpoint_files(&ckpt_dir);
    assert_eq!(files.len(), 1, "files: {files:?}");
    assert!(files[0].contains("_epoch_0_"));
}

#[test]
fn checkpointing_disabled_writes_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    write_pair(tmp.path(), "only.png", 8);
    let mut batches = make_batches(tmp.path(), 11);

    let ckpt_dir = tmp.path().join("checkpoints");
    let cfg = TrainConfig {
        epochs: 1,
        batch_size: 1,
        learning_rate: 1e-3,
        checkpoint_every: 0,
        log_every_batches: 0,
        checkpoints_dir: ckpt_dir.clone(),
        criterion: Criterion::Bce,
    };

    let device = Default::default();
    let model = TinySeg::<ADBackend>::new(TinySegConfig { hidden: 4 }, &device);
    fit(model, &mut batches, &cfg, &device).unwrap();

    assert!(!ckpt_dir.exists());
}
