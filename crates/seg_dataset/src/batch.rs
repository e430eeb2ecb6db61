//! Batch iteration into burn tensors for training.

use crate::dataset::{IndexedDataset, TrainDataset};
use crate::transform::TransformPipeline;
use crate::types::{DatasetResult, Plane, Sample, SegDatasetError, TensorPlane};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use std::time::{Duration, Instant};

pub(crate) const DEFAULT_LOG_EVERY_SAMPLES: usize = 1000;

#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Shuffle sample order on construction and at every reset.
    pub shuffle: bool,
    /// Seed for reproducible shuffling and augmentation draws.
    pub seed: Option<u64>,
    /// Drop the last partial batch (training stability for small batches).
    pub drop_last: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            shuffle: true,
            seed: None,
            drop_last: false,
        }
    }
}

/// One training batch: images `[N, 3, H, W]` and masks `[N, 1, H, W]`.
pub struct SegBatch<B: burn::tensor::backend::Backend> {
    pub images: burn::tensor::Tensor<B, 4>,
    pub masks: burn::tensor::Tensor<B, 4>,
}

/// Sequential batch iterator over a training dataset. One full drain of the
/// iterator is one epoch; call [`BatchIter::reset`] to start the next.
///
/// Sample failures are fatal and propagate to the caller.
pub struct BatchIter {
    dataset: TrainDataset,
    pipeline: TransformPipeline,
    cfg: LoaderConfig,
    order: Vec<usize>,
    cursor: usize,
    processed_samples: usize,
    processed_batches: usize,
    started: Instant,
    last_log: Instant,
    last_logged_samples: usize,
    log_every_samples: Option<usize>,
    images_buf: Vec<f32>,
    masks_buf: Vec<f32>,
}

impl BatchIter {
    pub fn new(dataset: TrainDataset, pipeline: TransformPipeline, cfg: LoaderConfig) -> Self {
        let order: Vec<usize> = (0..dataset.len()).collect();
        let log_every_samples = match std::env::var("SEG_DATASET_LOG_EVERY") {
            Ok(val) => {
                if val.eq_ignore_ascii_case("off") || val.trim() == "0" {
                    None
                } else {
                    val.parse::<usize>().ok().filter(|v| *v > 0)
                }
            }
            Err(_) => Some(DEFAULT_LOG_EVERY_SAMPLES),
        };
        let now = Instant::now();
        let mut iter = Self {
            dataset,
            pipeline,
            cfg,
            order,
            cursor: 0,
            processed_samples: 0,
            processed_batches: 0,
            started: now,
            last_log: now,
            last_logged_samples: 0,
            log_every_samples,
            images_buf: Vec::new(),
            masks_buf: Vec::new(),
        };
        iter.reshuffle();
        iter
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Number of batches one epoch yields at the given batch size.
    pub fn batches(&self, batch_size: usize) -> usize {
        let batch_size = batch_size.max(1);
        if self.cfg.drop_last {
            self.order.len() / batch_size
        } else {
            self.order.len().div_ceil(batch_size)
        }
    }

    /// Rewind for the next epoch, reshuffling if configured.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.reshuffle();
    }

    fn reshuffle(&mut self) {
        if !self.cfg.shuffle {
            return;
        }
        let mut rng = match self.cfg.seed {
            Some(seed) => rand::rngs::StdRng::seed_from_u64(seed),
            None => rand::rngs::StdRng::from_rng(&mut rand::rng()),
        };
        self.order.shuffle(&mut rng);
    }

    pub fn next_batch<B: burn::tensor::backend::Backend>(
        &mut self,
        batch_size: usize,
        device: &B::Device,
    ) -> DatasetResult<Option<SegBatch<B>>> {
        let batch_size = batch_size.max(1);
        if self.cursor >= self.order.len() {
            return Ok(None);
        }
        let end = (self.cursor + batch_size).min(self.order.len());
        let slice: Vec<usize> = self.order[self.cursor..end].to_vec();
        self.cursor = end;
        if self.cfg.drop_last && slice.len() < batch_size {
            return Ok(None);
        }

        let this = &*self;
        let loaded: Vec<DatasetResult<(TensorPlane, TensorPlane)>> = slice
            .par_iter()
            .map(|&idx| this.load_one(idx))
            .collect();

        self.images_buf.clear();
        self.masks_buf.clear();
        let mut expected_size: Option<(u32, u32)> = None;
        for res in loaded {
            let (image, mask) = res?;
            let size = (image.width, image.height);
            match expected_size {
                None => expected_size = Some(size),
                Some(sz) if sz != size => {
                    return Err(SegDatasetError::Other(
                        "batch contains varying image sizes; add a Resize stage to the pipeline"
                            .to_string(),
                    ));
                }
                _ => {}
            }
            self.images_buf.extend_from_slice(&image.data);
            self.masks_buf.extend_from_slice(&mask.data);
        }

        let (width, height) = expected_size.expect("non-empty batch slice sets the size");
        let batch_len = slice.len();
        let images =
            burn::tensor::Tensor::<B, 1>::from_floats(self.images_buf.as_slice(), device)
                .reshape([batch_len, 3, height as usize, width as usize]);
        let masks = burn::tensor::Tensor::<B, 1>::from_floats(self.masks_buf.as_slice(), device)
            .reshape([batch_len, 1, height as usize, width as usize]);

        self.processed_samples += batch_len;
        self.processed_batches += 1;
        self.maybe_log_progress();

        Ok(Some(SegBatch { images, masks }))
    }

    fn load_one(&self, idx: usize) -> DatasetResult<(TensorPlane, TensorPlane)> {
        let sample = self.dataset.get(idx)?;
        let sample = self.pipeline.apply_indexed(sample, idx as u64)?;
        tensor_pair(sample)
    }

    fn maybe_log_progress(&mut self) {
        let Some(threshold) = self.log_every_samples else {
            return;
        };
        let processed_since = self
            .processed_samples
            .saturating_sub(self.last_logged_samples);
        let since_last = self.last_log.elapsed();
        if processed_since < threshold && since_last < Duration::from_secs(30) {
            return;
        }
        let secs = self.started.elapsed().as_secs_f32().max(0.001);
        let rate = self.processed_samples as f32 / secs;
        eprintln!(
            "[dataset] batches={} samples={} elapsed={:.1}s rate={:.1} img/s",
            self.processed_batches, self.processed_samples, secs, rate
        );
        self.last_logged_samples = self.processed_samples;
        self.last_log = Instant::now();
    }
}

fn tensor_pair(sample: Sample) -> DatasetResult<(TensorPlane, TensorPlane)> {
    let Sample { image, groundtruth } = sample;
    let Plane::Tensor(image) = image else {
        return Err(SegDatasetError::ExpectedTensor {
            stage: "batch assembly",
        });
    };
    let Some(Plane::Tensor(mask)) = groundtruth else {
        return Err(SegDatasetError::Other(
            "training batch requires a tensor groundtruth; end the pipeline with ToTensor"
                .to_string(),
        ));
    };
    if image.channels != 3 || mask.channels != 1 {
        return Err(SegDatasetError::Other(format!(
            "expected a 3-channel image and 1-channel mask, got {} and {}",
            image.channels, mask.channels
        )));
    }
    Ok((image, mask))
}
