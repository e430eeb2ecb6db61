//! Burn segmentation models.
//!
//! This crate defines the neural network architectures used for per-pixel
//! segmentation:
//! - `TinySeg`: stacked same-padding convolutions, spatial dims preserved.
//! - `FcnSeg`: downsample/upsample fully-convolutional variant.
//!
//! Both sit behind the `SegmentationModel` trait so the training crate stays
//! generic over the architecture.

use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig, ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::nn::PaddingConfig2d;
use burn::tensor::activation::{relu, sigmoid};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;

/// Common capability of all segmentation architectures: map an `[N, 3, H, W]`
/// image batch to `[N, 1, H, W]` mask probabilities in [0, 1].
pub trait SegmentationModel<B: Backend> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4>;

    /// Stable identifier embedded in checkpoint file names.
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone)]
pub struct TinySegConfig {
    pub hidden: usize,
}

impl Default for TinySegConfig {
    fn default() -> Self {
        Self { hidden: 16 }
    }
}

#[derive(Debug, Module)]
pub struct TinySeg<B: Backend> {
    conv1: Conv2d<B>,
    conv2: Conv2d<B>,
    head: Conv2d<B>,
}

impl<B: Backend> TinySeg<B> {
    pub fn new(cfg: TinySegConfig, device: &B::Device) -> Self {
        let hidden = cfg.hidden.max(1);
        let conv1 = Conv2dConfig::new([3, hidden], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let conv2 = Conv2dConfig::new([hidden, hidden], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let head = Conv2dConfig::new([hidden, 1], [1, 1]).init(device);
        Self { conv1, conv2, head }
    }
}

impl<B: Backend> SegmentationModel<B> for TinySeg<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.conv1.forward(input));
        let x = relu(self.conv2.forward(x));
        sigmoid(self.head.forward(x))
    }

    fn name(&self) -> &'static str {
        "tinyseg"
    }
}

#[derive(Debug, Clone)]
pub struct FcnSegConfig {
    pub hidden: usize,
}

impl Default for FcnSegConfig {
    fn default() -> Self {
        Self { hidden: 16 }
    }
}

/// Fully-convolutional encoder/decoder. Input height and width must be even:
/// the transpose convolution doubles exactly what the pool halved.
#[derive(Debug, Module)]
pub struct FcnSeg<B: Backend> {
    enc1: Conv2d<B>,
    pool: MaxPool2d,
    enc2: Conv2d<B>,
    up: ConvTranspose2d<B>,
    head: Conv2d<B>,
}

impl<B: Backend> FcnSeg<B> {
    pub fn new(cfg: FcnSegConfig, device: &B::Device) -> Self {
        let hidden = cfg.hidden.max(1);
        let enc1 = Conv2dConfig::new([3, hidden], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let pool = MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init();
        let enc2 = Conv2dConfig::new([hidden, hidden * 2], [3, 3])
            .with_padding(PaddingConfig2d::Same)
            .init(device);
        let up = ConvTranspose2dConfig::new([hidden * 2, hidden], [2, 2])
            .with_stride([2, 2])
            .init(device);
        let head = Conv2dConfig::new([hidden, 1], [1, 1]).init(device);
        Self {
            enc1,
            pool,
            enc2,
            up,
            head,
        }
    }
}

impl<B: Backend> SegmentationModel<B> for FcnSeg<B> {
    fn forward(&self, input: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = relu(self.enc1.forward(input));
        let x = self.pool.forward(x);
        let x = relu(self.enc2.forward(x));
        let x = relu(self.up.forward(x));
        sigmoid(self.head.forward(x))
    }

    fn name(&self) -> &'static str {
        "fcnseg"
    }
}

pub mod prelude {
    pub use super::{FcnSeg, FcnSegConfig, SegmentationModel, TinySeg, TinySegConfig};
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray<f32>;

    #[test]
    fn tinyseg_preserves_spatial_dims() {
        let device = <B as Backend>::Device::default();
        let model = TinySeg::<B>::new(TinySegConfig::default(), &device);
        let input = Tensor::<B, 4>::zeros([2, 3, 7, 5], &device);
        assert_eq!(model.forward(input).dims(), [2, 1, 7, 5]);
    }

    #[test]
    fn fcnseg_round_trips_even_dims() {
        let device = <B as Backend>::Device::default();
        let model = FcnSeg::<B>::new(FcnSegConfig::default(), &device);
        let input = Tensor::<B, 4>::zeros([1, 3, 8, 12], &device);
        assert_eq!(model.forward(input).dims(), [1, 1, 8, 12]);
    }

    #[test]
    fn outputs_are_probabilities() {
        let device = <B as Backend>::Device::default();
        let model = TinySeg::<B>::new(TinySegConfig::default(), &device);
        let input = Tensor::<B, 4>::ones([1, 3, 4, 4], &device);
        let data = model.forward(input).into_data().to_vec::<f32>().unwrap();
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
