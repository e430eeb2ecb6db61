//! Paired image/groundtruth dataset loading, transforms, and burn batching.
//!
//! This crate provides:
//! - Filesystem dataset adapters for training (image + groundtruth mask pairs)
//!   and inference (images only)
//! - A paired transform pipeline where geometric stages move image and mask in
//!   lockstep and photometric stages touch the image only
//! - Burn-compatible batch iteration

pub mod batch;
pub mod dataset;
pub mod transform;
pub mod types;

pub use batch::{BatchIter, LoaderConfig, SegBatch};
pub use dataset::{IndexedDataset, InferenceDataset, TrainDataset};
pub use transform::{Stage, TransformPipeline, TransformPipelineBuilder};
pub use types::*;
