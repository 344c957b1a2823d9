// ============================================================
// Layer 1: CLI Commands and Arguments
// ============================================================
// One subcommand, `inspect`, that builds a folder datamodule
// and prints what the split policy produced.
//
// Every folder-datamodule parameter is a flag. With --config
// the flags are ignored and the JSON file is used instead.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::data::datamodule::DataModuleConfig;
use crate::data::folder::{FolderConfig, FolderLayout};
use crate::data::transform::{ImageTransform, InputNormalization};
use crate::domain::labels::{TaskType, TestSplitMode, ValSplitMode};

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build a folder dataset, run the split policy and report label counts
    Inspect(InspectArgs),
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// JSON file holding a complete folder configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory of normal (good) images
    #[arg(long, default_value = "good")]
    pub normal_dir: PathBuf,

    /// Root that relative directories are resolved against
    #[arg(long)]
    pub root: Option<PathBuf>,

    #[arg(long)]
    pub abnormal_dir: Option<PathBuf>,

    #[arg(long)]
    pub normal_test_dir: Option<PathBuf>,

    /// Ground-truth masks, paired with abnormal images by sorted order
    #[arg(long)]
    pub mask_dir: Option<PathBuf>,

    #[arg(long)]
    pub normal_depth_dir: Option<PathBuf>,

    #[arg(long)]
    pub abnormal_depth_dir: Option<PathBuf>,

    #[arg(long)]
    pub normal_test_depth_dir: Option<PathBuf>,

    /// Accepted image extensions, e.g. --extensions .png,.jpg
    #[arg(long, value_delimiter = ',')]
    pub extensions: Option<Vec<String>>,

    /// Resize target as HEIGHT WIDTH
    #[arg(long, num_args = 2, value_names = ["HEIGHT", "WIDTH"], default_values_t = [256, 256])]
    pub image_size: Vec<u32>,

    /// Center crop as HEIGHT WIDTH
    #[arg(long, num_args = 2, value_names = ["HEIGHT", "WIDTH"])]
    pub center_crop: Option<Vec<u32>>,

    /// imagenet | none
    #[arg(long, default_value = "imagenet")]
    pub normalization: InputNormalization,

    /// classification | detection | segmentation
    #[arg(long, default_value = "segmentation")]
    pub task: TaskType,

    #[arg(long, default_value_t = 32)]
    pub train_batch_size: usize,

    #[arg(long, default_value_t = 32)]
    pub eval_batch_size: usize,

    #[arg(long, default_value_t = 8)]
    pub num_workers: usize,

    /// none | from_dir | synthetic
    #[arg(long, default_value = "from_dir")]
    pub test_split_mode: TestSplitMode,

    /// Fraction of normal training images moved to the test set
    /// when the layout has no normal test images
    #[arg(long, default_value_t = 0.2)]
    pub test_split_ratio: f64,

    /// none | same_as_test | from_test | synthetic
    #[arg(long, default_value = "from_test")]
    pub val_split_mode: ValSplitMode,

    #[arg(long, default_value_t = 0.5)]
    pub val_split_ratio: f64,

    /// Seed for every random split
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write one CSV manifest per split into this directory
    #[arg(long)]
    pub manifest_dir: Option<PathBuf>,
}

fn pair(v: &[u32]) -> Option<(u32, u32)> {
    match v {
        [h, w] => Some((*h, *w)),
        _ => None,
    }
}

/// Convert CLI flags into the data-layer FolderConfig.
/// The application layer never sees clap types.
/// The transform flags apply to both train and eval; a JSON config
/// can set them separately.
impl From<InspectArgs> for FolderConfig {
    fn from(a: InspectArgs) -> Self {
        let transform = ImageTransform {
            image_size:    pair(&a.image_size).unwrap_or((256, 256)),
            center_crop:   a.center_crop.as_deref().and_then(pair),
            normalization: a.normalization,
        };
        FolderConfig {
            layout: FolderLayout {
                normal_dir:            a.normal_dir,
                root:                  a.root,
                abnormal_dir:          a.abnormal_dir,
                normal_test_dir:       a.normal_test_dir,
                mask_dir:              a.mask_dir,
                normal_depth_dir:      a.normal_depth_dir,
                abnormal_depth_dir:    a.abnormal_depth_dir,
                normal_test_depth_dir: a.normal_test_depth_dir,
                extensions:            a.extensions,
            },
            train_transform: transform,
            eval_transform:  transform,
            task:            a.task,
            datamodule:      DataModuleConfig {
                train_batch_size: a.train_batch_size,
                eval_batch_size:  a.eval_batch_size,
                num_workers:      a.num_workers,
                val_split_mode:   a.val_split_mode,
                val_split_ratio:  a.val_split_ratio,
                test_split_mode:  a.test_split_mode,
                test_split_ratio: Some(a.test_split_ratio),
                seed:             a.seed,
            },
        }
    }
}
