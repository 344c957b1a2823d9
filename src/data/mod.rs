// ============================================================
// Layer 4: Data Pipeline
// ============================================================
// Everything from a directory of images to tensor batches:
//
//   folder layout on disk
//       │
//       ▼
//   FolderSource      → sample table (paths, labels, splits)
//       │
//       ▼
//   AnomalyDataset    → lazy table + per-row loading / transforms
//       │
//       ▼
//   AnomalyDataModule → test / validation split policy
//       │
//       ▼
//   AnomalyBatcher    → stacks items into tensor batches
//       │
//       ▼
//   DataLoader        → burn's loader over each subset
//
// mask.rs holds the binary-mask morphology shared with the
// inference post-processing.

/// Path resolution and recursive image listing
pub mod path;

/// Folder layouts (2D and 3D) and the folder datamodule
pub mod folder;

/// Resize / crop / normalise into CHW float buffers
pub mod transform;

/// Implements Burn's Dataset trait over a sample table
pub mod dataset;

/// Label split and random (label-aware) subset splits
pub mod splitter;

/// Synthetic anomalies generated from normal images
pub mod synthetic;

/// Mask thresholding, morphology and bounding boxes
pub mod mask;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Train / validation / test subsets and their dataloaders
pub mod datamodule;
