// ============================================================
// Layer 5: ML / Inference Layer (Burn)
// ============================================================
// The model itself lives outside this crate. This layer only
// knows the narrow contract a model has to meet and how to run
// one on a single image:
//
//   model.rs           - AnomalyModel trait and its output
//   inferencer.rs      - Inferencer trait, predict() pipeline,
//                        normalization and segmentation overlay
//   burn_inferencer.rs - Inferencer for checkpointed burn models

/// The forward-pass contract of an anomaly model
pub mod model;

/// Backend-agnostic inference pipeline and post-processing helpers
pub mod inferencer;

/// Inference with a burn model restored from a checkpoint
pub mod burn_inferencer;
