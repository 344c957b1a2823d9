// ============================================================
// Layer 6: Infrastructure Layer
// ============================================================
// Files on disk that outlive a single run:
//
//   checkpoint.rs - model weights via Burn's CompactRecorder
//   metadata.rs   - thresholds and min/max statistics (JSON)
//   manifest.rs   - per-split sample tables (CSV)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Inference metadata loading and saving
pub mod metadata;

/// Sample table CSV export
pub mod manifest;
