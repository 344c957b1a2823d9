// ============================================================
// Layer 3: Domain Layer
// ============================================================
// Plain Rust structs, enums and traits that define the core
// concepts of the system: labels, directory roles, splits,
// split policies and the sample table row.
//
// Rules for this layer:
//   - NO burn framework types
//   - NO file I/O
//   - Only plain data, conversions and traits

/// Labels, directory roles, splits, task types and split modes
pub mod labels;

/// One row of a sample table
pub mod sample;

/// Typed errors shared by the data layer
pub mod error;

/// Abstractions implemented by the data layer
pub mod traits;
