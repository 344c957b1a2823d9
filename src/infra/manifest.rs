// ============================================================
// Layer 6: Sample Manifests
// ============================================================
// Writes a split's sample table to CSV so the result of the
// split policy can be inspected or diffed between runs.
//
// Example output (split_test.csv):
//   image_path,label,label_index,mask_path,depth_path,split
//   /data/bad/000.png,abnormal,1,/data/ground_truth/000_mask.png,,test
//   /data/good/004.png,normal,0,,,train
//
// Empty cells stand for missing paths.

use anyhow::{Context, Result};
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::labels::Split;
use crate::domain::sample::SampleRecord;

const HEADER: &str = "image_path,label,label_index,mask_path,depth_path,split";

/// Writes one CSV file per split into a directory.
pub struct ManifestWriter {
    dir: PathBuf,
}

impl ManifestWriter {
    /// Create the writer, creating `dir` if it does not exist.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create manifest dir '{}'", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, split: Split) -> PathBuf {
        self.dir.join(format!("split_{split}.csv"))
    }

    /// Write `samples` to `split_<split>.csv`, replacing any previous file.
    pub fn write(&self, split: Split, samples: &[SampleRecord]) -> Result<PathBuf> {
        let path = self.path_for(split);
        let file = File::create(&path)
            .with_context(|| format!("Cannot create manifest '{}'", path.display()))?;
        let mut out = BufWriter::new(file);

        writeln!(out, "{HEADER}")?;
        for s in samples {
            writeln!(
                out,
                "{},{},{},{},{},{}",
                csv_field(&s.image_path),
                s.label,
                s.label_index.index(),
                s.mask_path.as_deref().map(csv_field).unwrap_or_default(),
                s.depth_path.as_deref().map(csv_field).unwrap_or_default(),
                s.split,
            )?;
        }
        out.flush()?;

        tracing::debug!("Wrote {} rows to '{}'", samples.len(), path.display());
        Ok(path)
    }
}

/// Quote a path when it contains a comma, quote or newline.
fn csv_field(path: &Path) -> String {
    let s = path.to_string_lossy();
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.into_owned()
    }
}
