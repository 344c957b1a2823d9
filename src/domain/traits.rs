// ============================================================
// Layer 3: Core Traits (Abstractions)
// ============================================================
// A dataset does not know where its rows come from. It holds a
// SampleSource and asks it for the table the first time setup()
// is called:
//   - FolderSource  → walks a folder layout on disk
//   - tests         → return a fixed Vec of records

use std::fmt::Debug;

use crate::domain::error::DataResult;
use crate::domain::sample::SampleRecord;

// ─── SampleSource ─────────────────────────────────────────────────────────────
/// Any component that can produce a sample table.
///
/// Send + Sync because datasets are shared with burn's
/// dataloader worker threads.
pub trait SampleSource: Debug + Send + Sync {
    /// Build the full, ordered sample table for this source.
    fn load_samples(&self) -> DataResult<Vec<SampleRecord>>;
}

/// A fixed, in-memory table. Handy for tests and for tables
/// loaded from an exported manifest.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub samples: Vec<SampleRecord>,
}

impl StaticSource {
    pub fn new(samples: Vec<SampleRecord>) -> Self {
        Self { samples }
    }
}

impl SampleSource for StaticSource {
    fn load_samples(&self) -> DataResult<Vec<SampleRecord>> {
        Ok(self.samples.clone())
    }
}
