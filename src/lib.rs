//! Folder datasets, split policies and an image anomaly inference
//! pipeline built on burn.
//!
//! Layers, outermost first:
//!
//!   cli         - clap commands (Layer 1)
//!   application - use cases (Layer 2)
//!   domain      - labels, sample rows, errors (Layer 3)
//!   data        - folder tables, datasets, splits, dataloaders (Layer 4)
//!   ml          - model contract and inferencers (Layer 5)
//!   infra       - checkpoints, metadata, manifests (Layer 6)
//!
//! Running a checkpointed model on one image:
//!
//! ```ignore
//! use anomaly_kit::ml::{burn_inferencer::BurnInferencer, inferencer::Inferencer};
//!
//! let inferencer = BurnInferencer::from_checkpoint(
//!     model, checkpoint, Some(metadata), transform, TaskType::Segmentation, device,
//! )?;
//! let result = inferencer.predict(image_path, None)?;
//! ```

pub mod application;
pub mod cli;
pub mod data;
pub mod domain;
pub mod infra;
pub mod ml;
