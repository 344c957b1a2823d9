// ============================================================
// Layer 2: InspectUseCase
// ============================================================
// Builds a folder datamodule and reports what the split policy
// made of it:
//
//   Step 1: Build the datamodule        (Layer 4 - data)
//   Step 2: Run setup (split policy)    (Layer 4 - data)
//   Step 3: Count labels per split      (Layer 4 - data)
//   Step 4: Export CSV manifests        (Layer 6 - infra, optional)

use anyhow::Result;
use std::path::PathBuf;

use crate::data::datamodule::{SplitSummary, Stage};
use crate::data::folder::{FolderConfig, FolderDataModule};
use crate::domain::labels::Split;
use crate::infra::manifest::ManifestWriter;

/// Per-split label counts, plus the manifests written (if any).
#[derive(Debug, Clone)]
pub struct InspectReport {
    pub splits:    Vec<SplitSummary>,
    pub manifests: Vec<PathBuf>,
}

pub struct InspectUseCase {
    config:       FolderConfig,
    manifest_dir: Option<PathBuf>,
}

impl InspectUseCase {
    pub fn new(config: FolderConfig, manifest_dir: Option<PathBuf>) -> Self {
        Self { config, manifest_dir }
    }

    pub fn execute(&self) -> Result<InspectReport> {
        tracing::info!("Inspecting folder dataset at '{}'", self.config.layout.normal_dir.display());

        let mut datamodule = FolderDataModule::build(self.config.clone())?;
        datamodule.setup(Some(Stage::Fit))?;

        let mut manifests = Vec::new();
        if let Some(dir) = &self.manifest_dir {
            let writer = ManifestWriter::new(dir)?;
            manifests.push(writer.write(Split::Train, datamodule.train_data().samples())?);
            if let Some(val) = datamodule.val_data() {
                manifests.push(writer.write(Split::Val, val.samples())?);
            }
            manifests.push(writer.write(Split::Test, datamodule.test_data().samples())?);
            tracing::info!("Wrote {} manifests to '{}'", manifests.len(), dir.display());
        }

        Ok(InspectReport { splits: datamodule.summary(), manifests })
    }
}
