// ============================================================
// Layer 3: Labels, Splits and Modes
// ============================================================
// The small closed vocabularies the rest of the crate speaks:
//
//   LabelName      → normal (0) / abnormal (1)
//   DirType        → which role a directory plays in a folder layout
//   Split          → full / train / val / test
//   TaskType       → classification / detection / segmentation
//   TestSplitMode  → how the test subset is obtained
//   ValSplitMode   → how the validation subset is obtained
//
// Every enum round-trips through snake_case strings so it can
// come from a CLI flag or a JSON config. Unknown strings are
// rejected with DataError::UnsupportedValue.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::DataError;

// ─── LabelName ────────────────────────────────────────────────────────────────
/// Ground-truth or predicted label of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelName {
    Normal   = 0,
    Abnormal = 1,
}

impl LabelName {
    /// Integer index used in tensors and manifests.
    pub fn index(self) -> i64 {
        self as i64
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Normal),
            1 => Some(Self::Abnormal),
            _ => None,
        }
    }
}

// ─── DirType ──────────────────────────────────────────────────────────────────
/// Role of a directory in a folder dataset layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DirType {
    Normal,
    Abnormal,
    NormalTest,
    NormalDepth,
    AbnormalDepth,
    NormalTestDepth,
    Mask,
}

impl DirType {
    /// True for the directory roles that hold RGB images rather than
    /// depth maps or masks.
    pub fn is_image(self) -> bool {
        matches!(self, Self::Normal | Self::Abnormal | Self::NormalTest)
    }
}

// ─── Split ────────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Split {
    Full,
    Train,
    Val,
    Test,
}

// ─── TaskType ─────────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    Classification,
    Detection,
    Segmentation,
}

impl TaskType {
    /// Detection and segmentation both need a per-pixel mask per sample.
    pub fn needs_mask(self) -> bool {
        matches!(self, Self::Detection | Self::Segmentation)
    }
}

// ─── Split modes ──────────────────────────────────────────────────────────────
/// How the test subset is obtained when the folder layout does not
/// already provide normal test images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestSplitMode {
    None,
    FromDir,
    Synthetic,
}

/// How the validation subset is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValSplitMode {
    None,
    SameAsTest,
    FromTest,
    Synthetic,
}

// ─── String conversions ───────────────────────────────────────────────────────
// One macro instead of six hand-written FromStr/Display pairs.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = DataError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(DataError::UnsupportedValue {
                        kind:  $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

string_enum!(LabelName, "label", {
    Normal   => "normal",
    Abnormal => "abnormal",
});

string_enum!(DirType, "directory type", {
    Normal          => "normal",
    Abnormal        => "abnormal",
    NormalTest      => "normal_test",
    NormalDepth     => "normal_depth",
    AbnormalDepth   => "abnormal_depth",
    NormalTestDepth => "normal_test_depth",
    Mask            => "mask",
});

string_enum!(Split, "split", {
    Full  => "full",
    Train => "train",
    Val   => "val",
    Test  => "test",
});

string_enum!(TaskType, "task type", {
    Classification => "classification",
    Detection      => "detection",
    Segmentation   => "segmentation",
});

string_enum!(TestSplitMode, "test split mode", {
    None      => "none",
    FromDir   => "from_dir",
    Synthetic => "synthetic",
});

string_enum!(ValSplitMode, "validation split mode", {
    None       => "none",
    SameAsTest => "same_as_test",
    FromTest   => "from_test",
    Synthetic  => "synthetic",
});

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_modes_parse_snake_case() {
        assert_eq!("from_dir".parse::<TestSplitMode>().unwrap(), TestSplitMode::FromDir);
        assert_eq!("same_as_test".parse::<ValSplitMode>().unwrap(), ValSplitMode::SameAsTest);
        assert_eq!(" Synthetic ".parse::<ValSplitMode>().unwrap(), ValSplitMode::Synthetic);
    }

    #[test]
    fn test_unknown_split_mode_is_rejected() {
        let err = "from_train".parse::<ValSplitMode>().unwrap_err();
        assert!(err.to_string().contains("from_train"));
        assert!("random".parse::<TestSplitMode>().is_err());
    }

    #[test]
    fn test_label_index_round_trip() {
        assert_eq!(LabelName::Normal.index(), 0);
        assert_eq!(LabelName::from_index(1), Some(LabelName::Abnormal));
        assert_eq!(LabelName::from_index(7), None);
    }

    #[test]
    fn test_display_matches_parse() {
        let task = TaskType::Segmentation;
        assert_eq!(task.to_string().parse::<TaskType>().unwrap(), task);
        assert!(task.needs_mask());
        assert!(!TaskType::Classification.needs_mask());
    }
}
