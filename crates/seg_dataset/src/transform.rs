//! Paired image/groundtruth transform pipeline.
//!
//! Stages compose left to right. Geometric stages (rotate, flip, pad, crop,
//! resize) move pixels and therefore apply identically to image and
//! groundtruth, driven by a single random draw per invocation. Photometric
//! stages (color jitter, normalize) change pixel values only and never touch
//! the groundtruth, which encodes class labels rather than color. Every stage
//! is total: a random stage whose draw does not fire returns the sample
//! unchanged.

use crate::types::{
    DatasetResult, Padding, Plane, ResizeFilter, Sample, SegDatasetError, TensorPlane,
};
use image::imageops;
use image::{GrayImage, ImageBuffer, Luma, Pixel, Rgb, RgbImage};
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    /// Convert both planes from pixels to CHW f32 tensors in [0, 1].
    ToTensor,
    /// Rotate both planes by one angle drawn from (-degrees, degrees).
    RandomRotation { degrees: f32 },
    /// Flip both planes horizontally with probability `p` (single draw).
    RandomHorizontalFlip { p: f32 },
    /// Flip both planes vertically with probability `p` (single draw).
    RandomVerticalFlip { p: f32 },
    /// Pad both planes with a constant fill value.
    Pad { padding: Padding, fill: u8 },
    /// Center-crop both planes to the target size.
    CenterCrop { width: u32, height: u32 },
    /// Jitter brightness/contrast/saturation/hue of the image only.
    ColorJitter {
        brightness: f32,
        contrast: f32,
        saturation: f32,
        hue: f32,
    },
    /// Per-channel (x - mean) / std on the tensor image only.
    Normalize { mean: [f32; 3], std: [f32; 3] },
    /// Resize both planes with the same filter.
    Resize {
        width: u32,
        height: u32,
        filter: ResizeFilter,
    },
    /// Convert both planes from tensors back to displayable pixels.
    ToImage,
}

#[derive(Debug, Clone, Default)]
pub struct TransformPipeline {
    stages: Vec<Stage>,
    seed: Option<u64>,
}

impl TransformPipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages, seed: None }
    }

    pub fn builder() -> TransformPipelineBuilder {
        TransformPipelineBuilder::new()
    }

    /// Parse a pipeline from a JSON stage list, e.g.
    /// `["ToTensor", {"Normalize": {"mean": [...], "std": [...]}}]`.
    pub fn from_json(json: &str) -> DatasetResult<Self> {
        let stages: Vec<Stage> = serde_json::from_str(json)
            .map_err(|e| SegDatasetError::Other(format!("invalid pipeline json: {e}")))?;
        Ok(Self::new(stages))
    }

    pub fn to_json(&self) -> DatasetResult<String> {
        serde_json::to_string_pretty(&self.stages)
            .map_err(|e| SegDatasetError::Other(format!("serializing pipeline: {e}")))
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn describe(&self) -> String {
        let stages: Vec<String> = self.stages.iter().map(|s| format!("{s:?}")).collect();
        format!(
            "stages=[{}] seed={}",
            stages.join(", "),
            self.seed
                .map(|s| s.to_string())
                .unwrap_or_else(|| "none".to_string())
        )
    }

    pub fn apply(&self, sample: Sample) -> DatasetResult<Sample> {
        self.apply_indexed(sample, 0)
    }

    /// Apply all stages. With a seed configured the RNG is deterministic per
    /// sample index; otherwise the thread RNG is used.
    pub fn apply_indexed(&self, sample: Sample, index: u64) -> DatasetResult<Sample> {
        let mut rng_local;
        let mut seeded_rng;
        let rng: &mut dyn RngCore = if let Some(seed) = self.seed {
            seeded_rng = rand::rngs::StdRng::seed_from_u64(seed ^ index);
            &mut seeded_rng
        } else {
            rng_local = rand::rng();
            &mut rng_local
        };
        self.apply_with_rng(sample, rng)
    }

    pub fn apply_with_rng(
        &self,
        mut sample: Sample,
        rng: &mut dyn RngCore,
    ) -> DatasetResult<Sample> {
        for stage in &self.stages {
            sample = apply_stage(stage, sample, rng)?;
            sample.check_aligned()?;
        }
        Ok(sample)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TransformPipelineBuilder {
    inner: TransformPipeline,
}

impl TransformPipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn stage(mut self, stage: Stage) -> Self {
        self.inner.stages.push(stage);
        self
    }
    pub fn to_tensor(self) -> Self {
        self.stage(Stage::ToTensor)
    }
    pub fn random_rotation(self, degrees: f32) -> Self {
        self.stage(Stage::RandomRotation { degrees })
    }
    pub fn random_horizontal_flip(self, p: f32) -> Self {
        self.stage(Stage::RandomHorizontalFlip { p })
    }
    pub fn random_vertical_flip(self, p: f32) -> Self {
        self.stage(Stage::RandomVerticalFlip { p })
    }
    pub fn pad(self, padding: Padding, fill: u8) -> Self {
        self.stage(Stage::Pad { padding, fill })
    }
    pub fn center_crop(self, width: u32, height: u32) -> Self {
        self.stage(Stage::CenterCrop { width, height })
    }
    pub fn color_jitter(self, brightness: f32, contrast: f32, saturation: f32, hue: f32) -> Self {
        self.stage(Stage::ColorJitter {
            brightness,
            contrast,
            saturation,
            hue,
        })
    }
    pub fn normalize(self, mean: [f32; 3], std: [f32; 3]) -> Self {
        self.stage(Stage::Normalize { mean, std })
    }
    pub fn resize(self, width: u32, height: u32, filter: ResizeFilter) -> Self {
        self.stage(Stage::Resize {
            width,
            height,
            filter,
        })
    }
    pub fn to_image(self) -> Self {
        self.stage(Stage::ToImage)
    }
    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.inner.seed = seed;
        self
    }
    pub fn build(self) -> TransformPipeline {
        self.inner
    }
}

fn apply_stage(stage: &Stage, sample: Sample, rng: &mut dyn RngCore) -> DatasetResult<Sample> {
    match stage {
        Stage::ToTensor => to_tensor_pair(sample),
        Stage::RandomRotation { degrees } => rotate_pair(sample, *degrees, rng),
        Stage::RandomHorizontalFlip { p } => hflip_pair(sample, *p, rng),
        Stage::RandomVerticalFlip { p } => vflip_pair(sample, *p, rng),
        Stage::Pad { padding, fill } => pad_pair(sample, *padding, *fill),
        Stage::CenterCrop { width, height } => center_crop_pair(sample, *width, *height),
        Stage::ColorJitter {
            brightness,
            contrast,
            saturation,
            hue,
        } => color_jitter(sample, *brightness, *contrast, *saturation, *hue, rng),
        Stage::Normalize { mean, std } => normalize_image(sample, *mean, *std),
        Stage::Resize {
            width,
            height,
            filter,
        } => resize_pair(sample, *width, *height, *filter),
        Stage::ToImage => to_image_pair(sample),
    }
}

fn pixels_map<FR, FG>(
    plane: &Plane,
    stage: &'static str,
    f_rgb: &FR,
    f_gray: &FG,
) -> DatasetResult<Plane>
where
    FR: Fn(&RgbImage) -> RgbImage,
    FG: Fn(&GrayImage) -> GrayImage,
{
    match plane {
        Plane::Rgb(img) => Ok(Plane::Rgb(f_rgb(img))),
        Plane::Gray(img) => Ok(Plane::Gray(f_gray(img))),
        Plane::Tensor(_) => Err(SegDatasetError::ExpectedPixels { stage }),
    }
}

/// Apply the same pixel-space operation to image and groundtruth.
fn map_pair<FR, FG>(
    sample: Sample,
    stage: &'static str,
    f_rgb: FR,
    f_gray: FG,
) -> DatasetResult<Sample>
where
    FR: Fn(&RgbImage) -> RgbImage,
    FG: Fn(&GrayImage) -> GrayImage,
{
    let image = pixels_map(&sample.image, stage, &f_rgb, &f_gray)?;
    let groundtruth = match &sample.groundtruth {
        Some(plane) => Some(pixels_map(plane, stage, &f_rgb, &f_gray)?),
        None => None,
    };
    Ok(Sample { image, groundtruth })
}

pub(crate) fn rotate_pair(
    sample: Sample,
    degrees: f32,
    rng: &mut dyn RngCore,
) -> DatasetResult<Sample> {
    if degrees <= 0.0 {
        return Ok(sample);
    }
    // One draw shared by both planes keeps labels aligned.
    let angle = rng.random_range(-degrees..degrees);
    let (sin, cos) = angle.to_radians().sin_cos();
    map_pair(
        sample,
        "RandomRotation",
        |img| rotate_buffer(img, sin, cos, Rgb([0, 0, 0])),
        |img| rotate_buffer(img, sin, cos, Luma([0u8])),
    )
}

/// Fixed-size rotation about the center via inverse mapping with
/// nearest-neighbor sampling, so mask labels stay discrete.
fn rotate_buffer<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    sin: f32,
    cos: f32,
    fill: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    let (w, h) = img.dimensions();
    let cx = (w as f32 - 1.0) * 0.5;
    let cy = (h as f32 - 1.0) * 0.5;
    ImageBuffer::from_fn(w, h, |x, y| {
        let dx = x as f32 - cx;
        let dy = y as f32 - cy;
        let sx = (cos * dx + sin * dy + cx).round();
        let sy = (-sin * dx + cos * dy + cy).round();
        if sx < 0.0 || sy < 0.0 || sx >= w as f32 || sy >= h as f32 {
            fill
        } else {
            *img.get_pixel(sx as u32, sy as u32)
        }
    })
}

pub(crate) fn hflip_pair(sample: Sample, p: f32, rng: &mut dyn RngCore) -> DatasetResult<Sample> {
    if p <= 0.0 || rng.random_range(0.0..1.0) >= p {
        // A draw that does not fire still yields the untouched pair.
        return Ok(sample);
    }
    map_pair(
        sample,
        "RandomHorizontalFlip",
        |img| imageops::flip_horizontal(img),
        |img| imageops::flip_horizontal(img),
    )
}

pub(crate) fn vflip_pair(sample: Sample, p: f32, rng: &mut dyn RngCore) -> DatasetResult<Sample> {
    if p <= 0.0 || rng.random_range(0.0..1.0) >= p {
        return Ok(sample);
    }
    map_pair(
        sample,
        "RandomVerticalFlip",
        |img| imageops::flip_vertical(img),
        |img| imageops::flip_vertical(img),
    )
}

pub(crate) fn pad_pair(sample: Sample, padding: Padding, fill: u8) -> DatasetResult<Sample> {
    map_pair(
        sample,
        "Pad",
        |img| pad_buffer(img, padding, Rgb([fill, fill, fill])),
        |img| pad_buffer(img, padding, Luma([fill])),
    )
}

fn pad_buffer<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    padding: Padding,
    fill: P,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    let (w, h) = img.dimensions();
    let mut canvas = ImageBuffer::from_pixel(
        w + padding.left + padding.right,
        h + padding.top + padding.bottom,
        fill,
    );
    imageops::replace(&mut canvas, img, padding.left.into(), padding.top.into());
    canvas
}

pub(crate) fn center_crop_pair(sample: Sample, width: u32, height: u32) -> DatasetResult<Sample> {
    let (input_w, input_h) = sample.image.dimensions();
    if width > input_w || height > input_h {
        return Err(SegDatasetError::InvalidCrop {
            target_w: width,
            target_h: height,
            input_w,
            input_h,
        });
    }
    map_pair(
        sample,
        "CenterCrop",
        |img| center_crop_buffer(img, width, height),
        |img| center_crop_buffer(img, width, height),
    )
}

fn center_crop_buffer<P>(
    img: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    let (w, h) = img.dimensions();
    let x = (w - width) / 2;
    let y = (h - height) / 2;
    imageops::crop_imm(img, x, y, width, height).to_image()
}

pub(crate) fn resize_pair(
    sample: Sample,
    width: u32,
    height: u32,
    filter: ResizeFilter,
) -> DatasetResult<Sample> {
    let ft = filter.filter_type();
    map_pair(
        sample,
        "Resize",
        |img| imageops::resize(img, width, height, ft),
        |img| imageops::resize(img, width, height, ft),
    )
}

fn jitter_factor(rng: &mut dyn RngCore, amount: f32) -> f32 {
    if amount <= 0.0 {
        1.0
    } else {
        rng.random_range((1.0 - amount).max(0.0)..1.0 + amount)
    }
}

/// Photometric jitter on the image only; the groundtruth passes through
/// untouched. Factors are each drawn once per invocation.
pub(crate) fn color_jitter(
    sample: Sample,
    brightness: f32,
    contrast: f32,
    saturation: f32,
    hue: f32,
    rng: &mut dyn RngCore,
) -> DatasetResult<Sample> {
    let bright = jitter_factor(rng, brightness);
    let contr = jitter_factor(rng, contrast);
    let satur = jitter_factor(rng, saturation);
    let hue_deg = if hue > 0.0 {
        rng.random_range(-hue..hue)
    } else {
        0.0
    };
    let image = match sample.image {
        Plane::Rgb(img) => Plane::Rgb(jitter_rgb(img, bright, contr, satur, hue_deg)),
        Plane::Gray(img) => Plane::Gray(jitter_gray(img, bright, contr)),
        Plane::Tensor(_) => {
            return Err(SegDatasetError::ExpectedPixels {
                stage: "ColorJitter",
            })
        }
    };
    Ok(Sample {
        image,
        groundtruth: sample.groundtruth,
    })
}

fn jitter_rgb(mut img: RgbImage, bright: f32, contr: f32, satur: f32, hue_deg: f32) -> RgbImage {
    for pixel in img.pixels_mut() {
        let luma = 0.299 * pixel[0] as f32 / 255.0
            + 0.587 * pixel[1] as f32 / 255.0
            + 0.114 * pixel[2] as f32 / 255.0;
        for c in 0..3 {
            let v = pixel[c] as f32 / 255.0;
            let mut v = v * bright;
            v = (v - 0.5) * contr + 0.5;
            v = luma + (v - luma) * satur;
            pixel[c] = (v.clamp(0.0, 1.0) * 255.0) as u8;
        }
    }
    let rotation = hue_deg.round() as i32;
    if rotation != 0 {
        img = imageops::colorops::huerotate(&img, rotation);
    }
    img
}

fn jitter_gray(mut img: GrayImage, bright: f32, contr: f32) -> GrayImage {
    // Single-channel input has no saturation or hue to jitter.
    for pixel in img.pixels_mut() {
        let v = pixel[0] as f32 / 255.0;
        let mut v = v * bright;
        v = (v - 0.5) * contr + 0.5;
        pixel[0] = (v.clamp(0.0, 1.0) * 255.0) as u8;
    }
    img
}

/// Per-channel standardization of the tensor image; the groundtruth mask is
/// not normalized.
pub(crate) fn normalize_image(
    sample: Sample,
    mean: [f32; 3],
    std: [f32; 3],
) -> DatasetResult<Sample> {
    let Plane::Tensor(mut plane) = sample.image else {
        return Err(SegDatasetError::ExpectedTensor { stage: "Normalize" });
    };
    if plane.channels != 3 {
        return Err(SegDatasetError::Other(format!(
            "normalize expects a 3-channel tensor image, got {} channels",
            plane.channels
        )));
    }
    let per_channel = plane.pixels_per_channel();
    for c in 0..3 {
        let base = c * per_channel;
        for v in &mut plane.data[base..base + per_channel] {
            *v = (*v - mean[c]) / std[c];
        }
    }
    Ok(Sample {
        image: Plane::Tensor(plane),
        groundtruth: sample.groundtruth,
    })
}

pub(crate) fn to_tensor_pair(sample: Sample) -> DatasetResult<Sample> {
    let image = to_tensor_plane(sample.image)?;
    let groundtruth = match sample.groundtruth {
        Some(plane) => Some(to_tensor_plane(plane)?),
        None => None,
    };
    Ok(Sample { image, groundtruth })
}

fn to_tensor_plane(plane: Plane) -> DatasetResult<Plane> {
    let tensor = match plane {
        Plane::Rgb(img) => {
            let (width, height) = img.dimensions();
            let per_channel = (width * height) as usize;
            let mut data = vec![0.0f32; per_channel * 3];
            for (y, x, pixel) in img.enumerate_pixels() {
                let base = (y * width + x) as usize;
                data[base] = pixel[0] as f32 / 255.0;
                data[per_channel + base] = pixel[1] as f32 / 255.0;
                data[2 * per_channel + base] = pixel[2] as f32 / 255.0;
            }
            TensorPlane {
                data,
                channels: 3,
                height,
                width,
            }
        }
        Plane::Gray(img) => {
            let (width, height) = img.dimensions();
            let mut data = vec![0.0f32; (width * height) as usize];
            for (y, x, pixel) in img.enumerate_pixels() {
                data[(y * width + x) as usize] = pixel[0] as f32 / 255.0;
            }
            TensorPlane {
                data,
                channels: 1,
                height,
                width,
            }
        }
        Plane::Tensor(_) => return Err(SegDatasetError::ExpectedPixels { stage: "ToTensor" }),
    };
    Ok(Plane::Tensor(tensor))
}

pub(crate) fn to_image_pair(sample: Sample) -> DatasetResult<Sample> {
    let image = to_image_plane(sample.image)?;
    let groundtruth = match sample.groundtruth {
        Some(plane) => Some(to_image_plane(plane)?),
        None => None,
    };
    Ok(Sample { image, groundtruth })
}

fn to_image_plane(plane: Plane) -> DatasetResult<Plane> {
    let Plane::Tensor(t) = plane else {
        return Err(SegDatasetError::ExpectedTensor { stage: "ToImage" });
    };
    let per_channel = t.pixels_per_channel();
    let clamp_u8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    match t.channels {
        3 => Ok(Plane::Rgb(RgbImage::from_fn(t.width, t.height, |x, y| {
            let base = (y * t.width + x) as usize;
            Rgb([
                clamp_u8(t.data[base]),
                clamp_u8(t.data[per_channel + base]),
                clamp_u8(t.data[2 * per_channel + base]),
            ])
        }))),
        1 => Ok(Plane::Gray(GrayImage::from_fn(t.width, t.height, |x, y| {
            Luma([clamp_u8(t.data[(y * t.width + x) as usize])])
        }))),
        other => Err(SegDatasetError::Other(format!(
            "cannot convert {other}-channel tensor to an image"
        ))),
    }
}

#[cfg(test)]
mod transform_tests {
    use super::*;
    use crate::types::{Padding, Plane, ResizeFilter, Sample};
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn gradient_pair(w: u32, h: u32) -> Sample {
        // Mask mirrors the red channel so geometric alignment is observable.
        let image = RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, ((x + y) * 8) as u8])
        });
        let mask = GrayImage::from_fn(w, h, |x, _y| Luma([(x * 16) as u8]));
        Sample::pair(image, mask).unwrap()
    }

    fn mask_of(sample: &Sample) -> &GrayImage {
        match sample.groundtruth.as_ref().unwrap() {
            Plane::Gray(img) => img,
            other => panic!("expected gray groundtruth, got {other:?}"),
        }
    }

    fn image_of(sample: &Sample) -> &RgbImage {
        match &sample.image {
            Plane::Rgb(img) => img,
            other => panic!("expected rgb image, got {other:?}"),
        }
    }

    #[test]
    fn hflip_that_fires_mirrors_both_planes() {
        let sample = gradient_pair(4, 2);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let flipped = hflip_pair(sample.clone(), 1.0, &mut rng).unwrap();
        let orig = image_of(&sample);
        let img = image_of(&flipped);
        let mask = mask_of(&flipped);
        assert_eq!(img.get_pixel(0, 0), orig.get_pixel(3, 0));
        assert_eq!(mask.get_pixel(0, 0)[0], 3 * 16);
    }

    #[test]
    fn flips_that_do_not_fire_return_the_sample_unchanged() {
        let sample = gradient_pair(4, 4);
        let mut rng = rand::rngs::StdRng::seed_from_u64(1);
        let out = hflip_pair(sample.clone(), 0.0, &mut rng).unwrap();
        assert_eq!(out, sample);
        let out = vflip_pair(sample.clone(), 0.0, &mut rng).unwrap();
        assert_eq!(out, sample);
    }

    #[test]
    fn rotation_applies_the_same_angle_to_both_planes() {
        let sample = gradient_pair(16, 16);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        let rotated = rotate_pair(sample, 45.0, &mut rng).unwrap();
        assert_eq!(rotated.image.dimensions(), (16, 16));
        rotated.check_aligned().unwrap();
        let img = image_of(&rotated);
        let mask = mask_of(&rotated);
        for (x, y, pixel) in img.enumerate_pixels() {
            assert_eq!(pixel[0], mask.get_pixel(x, y)[0], "misaligned at {x},{y}");
        }
    }

    #[test]
    fn pad_grows_both_planes() {
        let sample = gradient_pair(4, 4);
        let padded = pad_pair(sample, Padding::uniform(2), 0).unwrap();
        assert_eq!(padded.image.dimensions(), (8, 8));
        padded.check_aligned().unwrap();
        assert_eq!(image_of(&padded).get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(image_of(&padded).get_pixel(2, 2)[0], 0);
    }

    #[test]
    fn center_crop_shrinks_both_planes() {
        let sample = gradient_pair(8, 8);
        let cropped = center_crop_pair(sample, 4, 4).unwrap();
        assert_eq!(cropped.image.dimensions(), (4, 4));
        cropped.check_aligned().unwrap();
        // Top-left of the crop is offset (2, 2) in the source.
        assert_eq!(image_of(&cropped).get_pixel(0, 0)[0], 2 * 16);
    }

    #[test]
    fn center_crop_larger_than_input_is_an_error() {
        let sample = gradient_pair(4, 4);
        assert!(matches!(
            center_crop_pair(sample, 8, 8),
            Err(SegDatasetError::InvalidCrop { .. })
        ));
    }

    #[test]
    fn resize_changes_both_planes_in_lockstep() {
        let sample = gradient_pair(8, 8);
        let resized = resize_pair(sample, 4, 6, ResizeFilter::Nearest).unwrap();
        assert_eq!(resized.image.dimensions(), (4, 6));
        resized.check_aligned().unwrap();
    }

    #[test]
    fn color_jitter_leaves_groundtruth_bit_identical() {
        let sample = gradient_pair(8, 8);
        let before = sample.groundtruth.clone();
        let mut rng = rand::rngs::StdRng::seed_from_u64(3);
        let jittered = color_jitter(sample, 0.5, 0.5, 0.5, 90.0, &mut rng).unwrap();
        assert_eq!(jittered.groundtruth, before);
    }

    #[test]
    fn normalize_standardizes_image_and_skips_groundtruth() {
        let image = RgbImage::from_pixel(1, 1, Rgb([255, 0, 255]));
        let mask = GrayImage::from_pixel(1, 1, Luma([128]));
        let sample = Sample::pair(image, mask).unwrap();
        let sample = to_tensor_pair(sample).unwrap();
        let before_gt = sample.groundtruth.clone();
        let out = normalize_image(sample, [0.5, 0.5, 0.5], [0.5, 0.5, 0.5]).unwrap();
        let Plane::Tensor(t) = &out.image else {
            panic!("expected tensor image");
        };
        assert!((t.data[0] - 1.0).abs() < 1e-6);
        assert!((t.data[1] + 1.0).abs() < 1e-6);
        assert!((t.data[2] - 1.0).abs() < 1e-6);
        assert_eq!(out.groundtruth, before_gt);
    }

    #[test]
    fn normalize_rejects_pixel_input() {
        let sample = gradient_pair(2, 2);
        assert!(matches!(
            normalize_image(sample, [0.5; 3], [0.5; 3]),
            Err(SegDatasetError::ExpectedTensor { .. })
        ));
    }

    #[test]
    fn to_tensor_then_to_image_round_trips_pixels() {
        let sample = gradient_pair(4, 4);
        let original = sample.clone();
        let out = to_image_pair(to_tensor_pair(sample).unwrap()).unwrap();
        assert_eq!(out, original);
    }

    #[test]
    fn to_tensor_shapes_and_range() {
        let sample = gradient_pair(4, 2);
        let out = to_tensor_pair(sample).unwrap();
        let Plane::Tensor(img) = &out.image else {
            panic!("expected tensor image");
        };
        assert_eq!((img.channels, img.height, img.width), (3, 2, 4));
        assert_eq!(img.data.len(), 3 * 2 * 4);
        assert!(img.data.iter().all(|v| (0.0..=1.0).contains(v)));
        let Some(Plane::Tensor(gt)) = &out.groundtruth else {
            panic!("expected tensor groundtruth");
        };
        assert_eq!((gt.channels, gt.height, gt.width), (1, 2, 4));
    }

    #[test]
    fn seeded_pipeline_is_deterministic_per_index() {
        let pipeline = TransformPipeline::builder()
            .random_rotation(30.0)
            .random_horizontal_flip(0.5)
            .random_vertical_flip(0.5)
            .to_tensor()
            .seed(Some(42))
            .build();
        let a = pipeline.apply_indexed(gradient_pair(8, 8), 5).unwrap();
        let b = pipeline.apply_indexed(gradient_pair(8, 8), 5).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pipeline_round_trips_through_json() {
        let pipeline = TransformPipeline::builder()
            .resize(256, 256, ResizeFilter::Triangle)
            .random_horizontal_flip(0.5)
            .normalize([0.485, 0.456, 0.406], [0.229, 0.224, 0.225])
            .to_tensor()
            .build();
        let json = pipeline.to_json().unwrap();
        let parsed = TransformPipeline::from_json(&json).unwrap();
        assert_eq!(parsed.stages(), pipeline.stages());
    }

    #[test]
    fn geometric_stages_preserve_pair_alignment_through_a_full_pipeline() {
        let pipeline = TransformPipeline::builder()
            .resize(12, 12, ResizeFilter::Triangle)
            .pad(Padding::uniform(2), 0)
            .random_rotation(20.0)
            .random_horizontal_flip(1.0)
            .random_vertical_flip(1.0)
            .center_crop(8, 8)
            .color_jitter(0.2, 0.2, 0.2, 10.0)
            .to_tensor()
            .seed(Some(11))
            .build();
        let out = pipeline.apply(gradient_pair(16, 16)).unwrap();
        out.check_aligned().unwrap();
        assert_eq!(out.image.dimensions(), (8, 8));
    }
}
