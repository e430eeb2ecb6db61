//! Training configuration and loss criterion.

use burn::nn::loss::{MseLoss, Reduction};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::Deserialize;
use std::path::PathBuf;

/// Loss criterion comparing model output to groundtruth masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Criterion {
    Mse,
    Bce,
}

impl Criterion {
    pub fn loss<B: Backend>(&self, output: Tensor<B, 4>, target: Tensor<B, 4>) -> Tensor<B, 1> {
        match self {
            Criterion::Mse => MseLoss::new().forward(output, target, Reduction::Mean),
            Criterion::Bce => {
                let count: usize = output.dims().iter().product();
                let eps = 1e-6;
                let probs = output.clamp(eps, 1.0 - eps);
                let ones = Tensor::<B, 4>::ones(probs.dims(), &probs.device());
                let target_inv = ones.clone() - target.clone();
                -((target * probs.clone().log()) + (target_inv * (ones - probs).log()))
                    .sum()
                    .div_scalar(count as f32)
            }
        }
    }
}

/// Everything the training loop needs, passed in explicitly rather than read
/// from globals.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainConfig {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Save a checkpoint when `epoch % checkpoint_every == 0` (epoch 0
    /// included). The final epoch only checkpoints if it lands on the modulus.
    pub checkpoint_every: usize,
    /// Emit a progress line every N batches (0 disables).
    pub log_every_batches: usize,
    pub checkpoints_dir: PathBuf,
    pub criterion: Criterion,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            batch_size: 4,
            learning_rate: 1e-3,
            checkpoint_every: 5,
            log_every_batches: 100,
            checkpoints_dir: PathBuf::from("checkpoints"),
            criterion: Criterion::Bce,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray<f32>;

    #[test]
    fn bce_of_confident_correct_prediction_is_small() {
        let device = <B as Backend>::Device::default();
        let output = Tensor::<B, 4>::ones([1, 1, 2, 2], &device) * 0.999;
        let target = Tensor::<B, 4>::ones([1, 1, 2, 2], &device);
        let loss = Criterion::Bce.loss(output, target);
        let v = loss.into_data().to_vec::<f32>().unwrap()[0];
        assert!(v > 0.0 && v < 0.01, "loss was {v}");
    }

    #[test]
    fn mse_of_exact_prediction_is_zero() {
        let device = <B as Backend>::Device::default();
        let output = Tensor::<B, 4>::ones([1, 1, 2, 2], &device) * 0.5;
        let target = output.clone();
        let loss = Criterion::Mse.loss(output, target);
        let v = loss.into_data().to_vec::<f32>().unwrap()[0];
        assert!(v.abs() < 1e-7);
    }
}
