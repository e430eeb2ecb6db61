//! Periodic model checkpoints.
//!
//! File names carry a wall-clock stamp plus the epoch and loss at save time,
//! e.g. `20260827-143012_tinyseg_epoch_5_loss_0.084.bin`, so a directory of
//! checkpoints sorts chronologically and is self-describing.

use anyhow::Context;
use burn::module::Module;
use burn::record::{BinFileRecorder, FullPrecisionSettings, RecorderError};
use burn::tensor::backend::Backend;
use chrono::Local;
use models::{FcnSeg, FcnSegConfig, TinySeg, TinySegConfig};
use std::path::{Path, PathBuf};

/// Builds a checkpoint file name. The `.bin` extension is part of the name:
/// the recorder appends one otherwise and would clobber the loss decimals.
pub fn checkpoint_file_name(model_name: &str, epoch: usize, loss: f32) -> String {
    let stamp = Local::now().format("%Y%m%d-%H%M%S");
    format!("{stamp}_{model_name}_epoch_{epoch}_loss_{loss:.3}.bin")
}

/// Serializes the model under `dir` and returns the path written.
pub fn save_checkpoint<B: Backend, M: Module<B>>(
    model: M,
    model_name: &str,
    epoch: usize,
    loss: f32,
    dir: &Path,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("creating checkpoint dir {}", dir.display()))?;
    let path = dir.join(checkpoint_file_name(model_name, epoch, loss));
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    model
        .save_file(&path, &recorder)
        .with_context(|| format!("saving checkpoint {}", path.display()))?;
    Ok(path)
}

pub fn load_tinyseg_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<TinySeg<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    TinySeg::new(TinySegConfig::default(), device).load_file(path.as_ref(), &recorder, device)
}

pub fn load_fcnseg_from_checkpoint<B: Backend, P: AsRef<Path>>(
    path: P,
    device: &B::Device,
) -> Result<FcnSeg<B>, RecorderError> {
    let recorder = BinFileRecorder::<FullPrecisionSettings>::new();
    FcnSeg::new(FcnSegConfig::default(), device).load_file(path.as_ref(), &recorder, device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_embeds_model_epoch_and_loss() {
        let name = checkpoint_file_name("tinyseg", 7, 0.08437);
        assert!(name.ends_with("_tinyseg_epoch_7_loss_0.084.bin"), "{name}");
        // stamp prefix: YYYYMMDD-HHMMSS_
        assert_eq!(name.as_bytes()[8], b'-');
        assert_eq!(name.as_bytes()[15], b'_');
    }
}
