// ============================================================
// Layer 3: Sample Record
// ============================================================
// One row of a sample table. A dataset is, before any pixels
// are read, nothing more than an ordered Vec of these rows:
//
//   image_path  → RGB image on disk
//   label       → directory role the image came from
//   label_index → normal (0) / abnormal (1)
//   depth_path  → paired depth map (3D layouts only)
//   mask_path   → paired ground-truth mask (abnormal images only)
//   split       → train / test assignment from the folder layout

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::domain::labels::{DirType, LabelName, Split};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub image_path:  PathBuf,
    pub label:       DirType,
    pub label_index: LabelName,
    pub depth_path:  Option<PathBuf>,
    pub mask_path:   Option<PathBuf>,
    pub split:       Split,
}

impl SampleRecord {
    pub fn new(
        image_path:  impl Into<PathBuf>,
        label:       DirType,
        label_index: LabelName,
        split:       Split,
    ) -> Self {
        Self {
            image_path: image_path.into(),
            label,
            label_index,
            depth_path: None,
            mask_path:  None,
            split,
        }
    }

    pub fn with_mask(mut self, mask_path: impl Into<PathBuf>) -> Self {
        self.mask_path = Some(mask_path.into());
        self
    }

    pub fn with_depth(mut self, depth_path: impl Into<PathBuf>) -> Self {
        self.depth_path = Some(depth_path.into());
        self
    }

    pub fn is_normal(&self) -> bool {
        self.label_index == LabelName::Normal
    }

    pub fn is_anomalous(&self) -> bool {
        self.label_index == LabelName::Abnormal
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

/// Normal / abnormal counts of a sample table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCounts {
    pub normal:   usize,
    pub abnormal: usize,
}

impl LabelCounts {
    pub fn of(samples: &[SampleRecord]) -> Self {
        samples.iter().fold(Self::default(), |mut acc, s| {
            match s.label_index {
                LabelName::Normal   => acc.normal += 1,
                LabelName::Abnormal => acc.abnormal += 1,
            }
            acc
        })
    }

    pub fn total(&self) -> usize {
        self.normal + self.abnormal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_counts() {
        let samples = vec![
            SampleRecord::new("a.png", DirType::Normal, LabelName::Normal, Split::Train),
            SampleRecord::new("b.png", DirType::Abnormal, LabelName::Abnormal, Split::Test)
                .with_mask("b_mask.png"),
            SampleRecord::new("c.png", DirType::NormalTest, LabelName::Normal, Split::Test),
        ];
        let counts = LabelCounts::of(&samples);
        assert_eq!(counts, LabelCounts { normal: 2, abnormal: 1 });
        assert_eq!(counts.total(), 3);
        assert!(samples[1].is_anomalous());
        assert_eq!(samples[1].mask_path.as_deref(), Some(Path::new("b_mask.png")));
    }
}
