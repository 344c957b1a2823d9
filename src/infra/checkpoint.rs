// ============================================================
// Layer 6: Model Checkpoints
// ============================================================
// Saves and restores model weights using Burn's CompactRecorder.
//
// The recorder appends its own extension, so a checkpoint
// "models/padim" lives on disk as "models/padim.mpk". Loading
// needs an initialised model of the same architecture: the
// record only holds parameter values, which load_record()
// copies into that model.

use anyhow::{Context, Result};
use burn::{
    prelude::*,
    record::{CompactRecorder, Recorder},
};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// One model checkpoint on disk.
#[derive(Debug, Clone)]
pub struct ModelCheckpoint {
    /// Path without extension; the recorder adds it
    path: PathBuf,
}

impl ModelCheckpoint {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let mut path: PathBuf = path.into();
        // Accept the path with or without the recorder's extension
        if path.extension().map(|e| e == "mpk").unwrap_or(false) {
            path.set_extension("");
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the model's weights, creating parent directories as needed.
    pub fn save<B: Backend, M: Module<B>>(&self, model: &M) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create checkpoint dir '{}'", parent.display()))?;
        }

        Recorder::<B>::record(&CompactRecorder::new(), model.clone().into_record(), self.path.clone())
            .with_context(|| format!("Failed to save checkpoint to '{}'", self.path.display()))?;

        tracing::debug!("Saved checkpoint '{}'", self.path.display());
        Ok(())
    }

    /// Load the saved weights into `model`.
    /// The architecture must match the one that was saved.
    pub fn load<B: Backend, M: Module<B>>(&self, model: M, device: &B::Device) -> Result<M> {
        let record: M::Record = CompactRecorder::new()
            .load(self.path.clone(), device)
            .with_context(|| format!("Cannot load checkpoint '{}'", self.path.display()))?;

        tracing::info!("Loaded checkpoint '{}'", self.path.display());
        Ok(model.load_record(record))
    }
}
