//! Core types and error definitions for seg_dataset.

use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

pub type DatasetResult<T> = Result<T, SegDatasetError>;

#[derive(Debug, Error)]
pub enum SegDatasetError {
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("groundtruth missing for image {image}: expected {expected}")]
    MissingGroundtruth { image: PathBuf, expected: PathBuf },
    #[error("index {index} out of bounds for dataset of length {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("image is {image_w}x{image_h} but groundtruth is {gt_w}x{gt_h}")]
    ShapeMismatch {
        image_w: u32,
        image_h: u32,
        gt_w: u32,
        gt_h: u32,
    },
    #[error("{stage} expects pixel data; run it before ToTensor")]
    ExpectedPixels { stage: &'static str },
    #[error("{stage} expects tensor data; run ToTensor first")]
    ExpectedTensor { stage: &'static str },
    #[error("center crop {target_w}x{target_h} exceeds input {input_w}x{input_h}")]
    InvalidCrop {
        target_w: u32,
        target_h: u32,
        input_w: u32,
        input_h: u32,
    },
    #[error("{0}")]
    Other(String),
}

/// A single image or mask in CHW layout, values in [0, 1] unless normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorPlane {
    pub data: Vec<f32>,
    pub channels: u32,
    pub height: u32,
    pub width: u32,
}

impl TensorPlane {
    pub fn pixels_per_channel(&self) -> usize {
        self.height as usize * self.width as usize
    }
}

/// One side of a sample: decoded pixels or the tensor they became.
#[derive(Debug, Clone, PartialEq)]
pub enum Plane {
    Rgb(RgbImage),
    Gray(GrayImage),
    Tensor(TensorPlane),
}

impl Plane {
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Plane::Rgb(img) => img.dimensions(),
            Plane::Gray(img) => img.dimensions(),
            Plane::Tensor(t) => (t.width, t.height),
        }
    }
}

/// Paired image and (for training) groundtruth mask flowing through the
/// transform pipeline. Image and groundtruth always share spatial dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub image: Plane,
    pub groundtruth: Option<Plane>,
}

impl Sample {
    pub fn pair(image: RgbImage, groundtruth: GrayImage) -> DatasetResult<Self> {
        let sample = Self {
            image: Plane::Rgb(image),
            groundtruth: Some(Plane::Gray(groundtruth)),
        };
        sample.check_aligned()?;
        Ok(sample)
    }

    pub fn image_only(image: RgbImage) -> Self {
        Self {
            image: Plane::Rgb(image),
            groundtruth: None,
        }
    }

    /// Verify the image/groundtruth spatial-dimension invariant.
    pub fn check_aligned(&self) -> DatasetResult<()> {
        let Some(gt) = &self.groundtruth else {
            return Ok(());
        };
        let (image_w, image_h) = self.image.dimensions();
        let (gt_w, gt_h) = gt.dimensions();
        if (image_w, image_h) != (gt_w, gt_h) {
            return Err(SegDatasetError::ShapeMismatch {
                image_w,
                image_h,
                gt_w,
                gt_h,
            });
        }
        Ok(())
    }
}

/// Interpolation filter used by the resize stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeFilter {
    Nearest,
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl ResizeFilter {
    pub(crate) fn filter_type(self) -> image::imageops::FilterType {
        use image::imageops::FilterType;
        match self {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Per-border padding in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Padding {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl Padding {
    pub fn uniform(amount: u32) -> Self {
        Self {
            left: amount,
            top: amount,
            right: amount,
            bottom: amount,
        }
    }

    pub fn symmetric(horizontal: u32, vertical: u32) -> Self {
        Self {
            left: horizontal,
            top: vertical,
            right: horizontal,
            bottom: vertical,
        }
    }
}
