// ============================================================
// Layer 4: Anomaly DataModule
// ============================================================
// Owns the train / validation / test datasets and derives the
// subsets the folder layout does not already provide.
//
// setup() runs once and in this order:
//
//   1. train.setup(), test.setup()
//   2. test split  (TestSplitMode)
//        test has normal rows → separate them from the anomalous rows
//        otherwise            → sample test_split_ratio of train
//                               (skipped when the mode is None)
//        FromDir   → test = anomalous + normal
//        Synthetic → test = synthetic anomalies made from normal
//        None      → test = anomalous rows only
//   3. validation split (ValSplitMode)
//        FromTest   → label-aware random split of test
//        SameAsTest → copy of test
//        Synthetic  → split normal rows off train, synthesise
//        None       → no validation set
//
// All three subsets are produced on the first setup() call
// regardless of stage, because validation is usually carved out
// of the test set and the test set must therefore exist already
// at fit time.

use anyhow::{anyhow, ensure, Result};
use burn::{
    data::dataloader::{DataLoader, DataLoaderBuilder},
    prelude::*,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::data::{
    batcher::{AnomalyBatch, AnomalyBatcher},
    dataset::AnomalyDataset,
    splitter::{random_split, split_by_label},
    synthetic::synthetic_from_dataset,
};
use crate::domain::labels::{Split, TestSplitMode, ValSplitMode};
use crate::domain::sample::LabelCounts;

/// Stage hint passed to setup(). Every stage sets up all subsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fit,
    Validate,
    Test,
    Predict,
}

// ─── Configuration ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataModuleConfig {
    pub train_batch_size: usize,
    pub eval_batch_size:  usize,
    pub num_workers:      usize,
    pub val_split_mode:   ValSplitMode,
    pub val_split_ratio:  f64,
    pub test_split_mode:  TestSplitMode,
    pub test_split_ratio: Option<f64>,
    pub seed:             Option<u64>,
}

impl Default for DataModuleConfig {
    fn default() -> Self {
        Self {
            train_batch_size: 32,
            eval_batch_size:  32,
            num_workers:      8,
            val_split_mode:   ValSplitMode::FromTest,
            val_split_ratio:  0.5,
            test_split_mode:  TestSplitMode::FromDir,
            test_split_ratio: Some(0.2),
            seed:             None,
        }
    }
}

/// Per-split label counts after setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSummary {
    pub split:  Split,
    pub counts: LabelCounts,
}

// ─── AnomalyDataModule ────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AnomalyDataModule {
    config:     DataModuleConfig,
    train_data: AnomalyDataset,
    val_data:   Option<AnomalyDataset>,
    test_data:  AnomalyDataset,
}

impl AnomalyDataModule {
    pub fn new(config: DataModuleConfig, train_data: AnomalyDataset, test_data: AnomalyDataset) -> Self {
        Self { config, train_data, val_data: None, test_data }
    }

    pub fn config(&self) -> &DataModuleConfig {
        &self.config
    }

    pub fn train_data(&self) -> &AnomalyDataset {
        &self.train_data
    }

    pub fn val_data(&self) -> Option<&AnomalyDataset> {
        self.val_data.as_ref()
    }

    pub fn test_data(&self) -> &AnomalyDataset {
        &self.test_data
    }

    /// True once any of the train / val / test datasets is set up.
    pub fn is_setup(&self) -> bool {
        self.train_data.is_setup()
            || self.test_data.is_setup()
            || self.val_data.as_ref().map(AnomalyDataset::is_setup).unwrap_or(false)
    }

    /// Set up all datasets and derive the subsets. Later calls are no-ops.
    pub fn setup(&mut self, stage: Option<Stage>) -> Result<()> {
        if !self.is_setup() {
            tracing::debug!("Setting up datamodule (stage {:?})", stage);
            self.setup_subsets()?;
        }
        ensure!(self.is_setup(), "datamodule setup finished without any dataset being set up");
        Ok(())
    }

    fn setup_subsets(&mut self) -> Result<()> {
        self.train_data.setup()?;
        self.test_data.setup()?;

        self.create_test_split()?;
        self.create_val_split()?;

        for summary in self.summary() {
            tracing::info!(
                "{:>5} split: {} samples ({} normal, {} abnormal)",
                summary.split.as_str(),
                summary.counts.total(),
                summary.counts.normal,
                summary.counts.abnormal,
            );
        }
        Ok(())
    }

    fn create_test_split(&mut self) -> Result<()> {
        let mode = self.config.test_split_mode;

        let normal_test = if self.test_data.has_normal() {
            let (normal, anomalous) = split_by_label(&self.test_data)?;
            self.test_data = anomalous;
            Some(normal)
        } else if mode != TestSplitMode::None {
            let ratio = self.config.test_split_ratio.ok_or_else(|| {
                anyhow!("no normal test images found and test_split_ratio is not set")
            })?;
            tracing::info!(
                "No normal test images found. Sampling from training set using a split ratio of {:.2}",
                ratio
            );
            let (train, normal) = random_split(&self.train_data, ratio, false, self.config.seed)?;
            self.train_data = train;
            Some(normal)
        } else {
            None
        };

        match (mode, normal_test) {
            (TestSplitMode::FromDir, Some(normal)) => {
                self.test_data = self.test_data.concat(&normal)?;
            }
            (TestSplitMode::Synthetic, Some(normal)) => {
                self.test_data = synthetic_from_dataset(&normal, self.config.seed)?;
            }
            (TestSplitMode::None, Some(normal)) => {
                tracing::debug!("Test split mode is none: dropping {} normal test images", normal.sample_count());
            }
            (_, None) => {}
        }
        Ok(())
    }

    fn create_val_split(&mut self) -> Result<()> {
        let ratio = self.config.val_split_ratio;
        let seed  = self.config.seed;

        match self.config.val_split_mode {
            ValSplitMode::FromTest => {
                let (test, val) = random_split(&self.test_data, ratio, true, seed)?;
                self.test_data = test;
                self.val_data  = Some(val);
            }
            ValSplitMode::SameAsTest => {
                self.val_data = Some(self.test_data.clone());
            }
            ValSplitMode::Synthetic => {
                let (train, normal_val) = random_split(&self.train_data, ratio, false, seed)?;
                self.train_data = train;
                self.val_data   = Some(synthetic_from_dataset(&normal_val, seed)?);
            }
            ValSplitMode::None => {
                self.val_data = None;
            }
        }
        Ok(())
    }

    /// Label counts of every subset that exists.
    pub fn summary(&self) -> Vec<SplitSummary> {
        let mut out = vec![SplitSummary { split: Split::Train, counts: self.train_data.label_counts() }];
        if let Some(val) = &self.val_data {
            out.push(SplitSummary { split: Split::Val, counts: val.label_counts() });
        }
        out.push(SplitSummary { split: Split::Test, counts: self.test_data.label_counts() });
        out
    }

    // ─── Dataloaders ──────────────────────────────────────────────────────────
    fn loader<B: Backend>(
        &self,
        dataset:    &AnomalyDataset,
        batch_size: usize,
        shuffle:    Option<u64>,
        device:     &B::Device,
    ) -> Result<Arc<dyn DataLoader<AnomalyBatch<B>>>> {
        ensure!(self.is_setup(), "call setup() before requesting a dataloader");
        ensure!(batch_size > 0, "batch size must be positive");
        // burn's loader ends the pass at the first row that fails to load
        dataset.verify_files()?;

        let mut builder = DataLoaderBuilder::new(AnomalyBatcher::<B>::new(device.clone()))
            .batch_size(batch_size);
        if let Some(seed) = shuffle {
            builder = builder.shuffle(seed);
        }
        if self.config.num_workers > 0 {
            builder = builder.num_workers(self.config.num_workers);
        }
        Ok(builder.build(dataset.clone()))
    }

    /// Shuffled loader over the training set.
    pub fn train_dataloader<B: Backend>(&self, device: &B::Device) -> Result<Arc<dyn DataLoader<AnomalyBatch<B>>>> {
        let seed = self.config.seed.unwrap_or_else(rand::random);
        self.loader(&self.train_data, self.config.train_batch_size, Some(seed), device)
    }

    pub fn val_dataloader<B: Backend>(&self, device: &B::Device) -> Result<Arc<dyn DataLoader<AnomalyBatch<B>>>> {
        let val = self
            .val_data
            .as_ref()
            .ok_or_else(|| anyhow!("no validation set (val_split_mode is none)"))?;
        self.loader(val, self.config.eval_batch_size, None, device)
    }

    pub fn test_dataloader<B: Backend>(&self, device: &B::Device) -> Result<Arc<dyn DataLoader<AnomalyBatch<B>>>> {
        self.loader(&self.test_data, self.config.eval_batch_size, None, device)
    }

    /// Prediction runs over the test set.
    pub fn predict_dataloader<B: Backend>(&self, device: &B::Device) -> Result<Arc<dyn DataLoader<AnomalyBatch<B>>>> {
        self.test_dataloader(device)
    }
}
