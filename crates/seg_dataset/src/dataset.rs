//! Filesystem dataset adapters for paired image/groundtruth samples.
//!
//! The training layout is `root/images/**/*.png` plus `root/groundtruth/**/*.png`
//! with matching relative paths; the inference layout is any directory of PNGs.
//! The file index is fixed at construction.

use crate::transform::TransformPipeline;
use crate::types::{DatasetResult, Sample, SegDatasetError};
use image::{GrayImage, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};

/// Indexable collection of samples.
pub trait IndexedDataset {
    type Item;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load the sample at `index`; out-of-range indices are an error.
    fn get(&self, index: usize) -> DatasetResult<Self::Item>;
}

/// Training dataset: raw image/groundtruth pairs loaded by matching filename.
///
/// A missing groundtruth file fails fast with a pairing error instead of a
/// generic file-not-found at decode time.
pub struct TrainDataset {
    img_dir: PathBuf,
    gt_dir: PathBuf,
    names: Vec<PathBuf>,
}

impl TrainDataset {
    pub fn open(root: impl AsRef<Path>) -> DatasetResult<Self> {
        let root = root.as_ref();
        let img_dir = root.join("images");
        let gt_dir = root.join("groundtruth");
        let mut names = Vec::new();
        walk_pngs(&img_dir, &img_dir, &mut names)?;
        names.sort();
        Ok(Self {
            img_dir,
            gt_dir,
            names,
        })
    }

    /// Relative paths of the indexed image files, in index order.
    pub fn names(&self) -> &[PathBuf] {
        &self.names
    }
}

impl IndexedDataset for TrainDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.names.len()
    }

    fn get(&self, index: usize) -> DatasetResult<Sample> {
        let name = self.names.get(index).ok_or(SegDatasetError::OutOfBounds {
            index,
            len: self.names.len(),
        })?;
        let img_path = self.img_dir.join(name);
        let gt_path = self.gt_dir.join(name);
        if !gt_path.exists() {
            return Err(SegDatasetError::MissingGroundtruth {
                image: img_path,
                expected: gt_path,
            });
        }
        let image = open_rgb(&img_path)?;
        let groundtruth = open_gray(&gt_path)?;
        Sample::pair(image, groundtruth)
    }
}

/// Inference dataset: single images run through a transform on access.
/// The default transform converts to a tensor with no normalization.
pub struct InferenceDataset {
    names: Vec<PathBuf>,
    root: PathBuf,
    transform: TransformPipeline,
}

impl InferenceDataset {
    pub fn open(root: impl AsRef<Path>) -> DatasetResult<Self> {
        Self::with_transform(root, TransformPipeline::builder().to_tensor().build())
    }

    pub fn with_transform(
        root: impl AsRef<Path>,
        transform: TransformPipeline,
    ) -> DatasetResult<Self> {
        let root = root.as_ref().to_path_buf();
        let mut names = Vec::new();
        walk_pngs(&root, &root, &mut names)?;
        names.sort();
        Ok(Self {
            names,
            root,
            transform,
        })
    }

    pub fn names(&self) -> &[PathBuf] {
        &self.names
    }
}

impl IndexedDataset for InferenceDataset {
    type Item = Sample;

    fn len(&self) -> usize {
        self.names.len()
    }

    fn get(&self, index: usize) -> DatasetResult<Sample> {
        let name = self.names.get(index).ok_or(SegDatasetError::OutOfBounds {
            index,
            len: self.names.len(),
        })?;
        let image = open_rgb(&self.root.join(name))?;
        self.transform
            .apply_indexed(Sample::image_only(image), index as u64)
    }
}

fn walk_pngs(base: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> DatasetResult<()> {
    let entries = fs::read_dir(dir).map_err(|e| SegDatasetError::Io {
        path: dir.to_path_buf(),
        source: e,
    })?;
    for entry in entries {
        let Ok(entry) = entry else { continue };
        let path = entry.path();
        if path.is_dir() {
            walk_pngs(base, &path, out)?;
            continue;
        }
        if path.extension().and_then(|s| s.to_str()) != Some("png") {
            continue;
        }
        if let Ok(rel) = path.strip_prefix(base) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

fn open_rgb(path: &Path) -> DatasetResult<RgbImage> {
    Ok(image::open(path)
        .map_err(|e| SegDatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_rgb8())
}

fn open_gray(path: &Path) -> DatasetResult<GrayImage> {
    Ok(image::open(path)
        .map_err(|e| SegDatasetError::Image {
            path: path.to_path_buf(),
            source: e,
        })?
        .to_luma8())
}
