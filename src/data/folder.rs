// ============================================================
// Layer 4: Folder Dataset (2D and 3D)
// ============================================================
// Builds a sample table from a plain directory layout:
//
//   root/
//   ├── good/            normal_dir         (required)
//   ├── bad/             abnormal_dir
//   ├── good_test/       normal_test_dir
//   ├── ground_truth/    mask_dir
//   ├── good_xyz/        normal_depth_dir
//   ├── bad_xyz/         abnormal_depth_dir
//   └── good_test_xyz/   normal_test_depth_dir
//
// Depth maps and masks are paired with images by position in
// sorted order, so their file names must sort the same way as
// the image names. Rows from normal_dir go to the train split,
// rows from abnormal_dir and normal_test_dir to the test split.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::datamodule::{AnomalyDataModule, DataModuleConfig};
use crate::data::dataset::AnomalyDataset;
use crate::data::path::{prepare_files_labels, validate_and_resolve_path};
use crate::data::transform::ImageTransform;
use crate::domain::error::{DataError, DataResult};
use crate::domain::labels::{DirType, LabelName, Split, TaskType};
use crate::domain::sample::SampleRecord;
use crate::domain::traits::SampleSource;

// ─── FolderLayout ─────────────────────────────────────────────────────────────
/// Where each directory role lives. Relative paths are resolved
/// against `root` when it is given.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderLayout {
    pub normal_dir:            PathBuf,
    pub root:                  Option<PathBuf>,
    pub abnormal_dir:          Option<PathBuf>,
    pub normal_test_dir:       Option<PathBuf>,
    pub mask_dir:              Option<PathBuf>,
    pub normal_depth_dir:      Option<PathBuf>,
    pub abnormal_depth_dir:    Option<PathBuf>,
    pub normal_test_depth_dir: Option<PathBuf>,
    pub extensions:            Option<Vec<String>>,
}

impl FolderLayout {
    pub fn new(normal_dir: impl Into<PathBuf>) -> Self {
        Self { normal_dir: normal_dir.into(), ..Self::default() }
    }
}

/// The resolved directories of a layout.
struct ResolvedDirs {
    normal:            PathBuf,
    abnormal:          Option<PathBuf>,
    normal_test:       Option<PathBuf>,
    mask:              Option<PathBuf>,
    normal_depth:      Option<PathBuf>,
    abnormal_depth:    Option<PathBuf>,
    normal_test_depth: Option<PathBuf>,
}

impl ResolvedDirs {
    fn resolve(layout: &FolderLayout) -> DataResult<Self> {
        let root = layout.root.as_deref();
        let opt  = |p: &Option<PathBuf>| -> DataResult<Option<PathBuf>> {
            p.as_deref().map(|p| validate_and_resolve_path(p, root)).transpose()
        };

        let normal = validate_and_resolve_path(&layout.normal_dir, root)?;
        if !normal.is_dir() {
            return Err(DataError::NotADirectory {
                path: normal,
                msg:  "a folder location must be provided in normal_dir".into(),
            });
        }

        Ok(Self {
            normal,
            abnormal:          opt(&layout.abnormal_dir)?,
            normal_test:       opt(&layout.normal_test_dir)?,
            mask:              opt(&layout.mask_dir)?,
            normal_depth:      opt(&layout.normal_depth_dir)?,
            abnormal_depth:    opt(&layout.abnormal_depth_dir)?,
            normal_test_depth: opt(&layout.normal_test_depth_dir)?,
        })
    }
}

// ─── Table construction ───────────────────────────────────────────────────────
fn list(dir: Option<&Path>, dir_type: DirType, extensions: Option<&[String]>) -> DataResult<Vec<PathBuf>> {
    match dir {
        Some(dir) => Ok(prepare_files_labels(dir, dir_type, extensions)?.0),
        None => Ok(Vec::new()),
    }
}

fn rows(files: Vec<PathBuf>, dir_type: DirType, label: LabelName, split: Split) -> Vec<SampleRecord> {
    files
        .into_iter()
        .map(|path| SampleRecord::new(path, dir_type, label, split))
        .collect()
}

/// Attach `others[i]` to `rows[i]` through `attach`. Counts must match.
fn pair_positionally(
    rows:   &mut [SampleRecord],
    others: Vec<PathBuf>,
    left:   DirType,
    right:  DirType,
    attach: impl Fn(&mut SampleRecord, PathBuf),
) -> DataResult<()> {
    if rows.len() != others.len() {
        return Err(DataError::CountMismatch {
            left:        left.to_string(),
            right:       right.to_string(),
            left_count:  rows.len(),
            right_count: others.len(),
        });
    }
    for (row, other) in rows.iter_mut().zip(others) {
        attach(row, other);
    }
    Ok(())
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
}

/// Build the sample table of a folder layout.
///
/// With `split` of `None` or `Some(Split::Full)` every row is kept;
/// otherwise only the rows of that split.
pub fn make_folder_dataset(layout: &FolderLayout, split: Option<Split>) -> DataResult<Vec<SampleRecord>> {
    let dirs = ResolvedDirs::resolve(layout)?;
    let exts = layout.extensions.as_deref();

    let mut normal = rows(
        list(Some(dirs.normal.as_path()), DirType::Normal, exts)?,
        DirType::Normal,
        LabelName::Normal,
        Split::Train,
    );
    let mut abnormal = rows(
        list(dirs.abnormal.as_deref(), DirType::Abnormal, exts)?,
        DirType::Abnormal,
        LabelName::Abnormal,
        Split::Test,
    );
    let mut normal_test = rows(
        list(dirs.normal_test.as_deref(), DirType::NormalTest, exts)?,
        DirType::NormalTest,
        LabelName::Normal,
        Split::Test,
    );

    // Depth maps are only paired when the normal depth dir is given
    if dirs.normal_depth.is_some() {
        let attach_depth = |row: &mut SampleRecord, depth: PathBuf| row.depth_path = Some(depth);

        let normal_depth = list(dirs.normal_depth.as_deref(), DirType::NormalDepth, exts)?;
        pair_positionally(&mut normal, normal_depth, DirType::Normal, DirType::NormalDepth, attach_depth)?;

        if !abnormal.is_empty() {
            let abnormal_depth = list(dirs.abnormal_depth.as_deref(), DirType::AbnormalDepth, exts)?;
            pair_positionally(&mut abnormal, abnormal_depth, DirType::Abnormal, DirType::AbnormalDepth, attach_depth)?;
        }

        if dirs.normal_test.is_some() {
            let test_depth = list(dirs.normal_test_depth.as_deref(), DirType::NormalTestDepth, exts)?;
            pair_positionally(&mut normal_test, test_depth, DirType::NormalTest, DirType::NormalTestDepth, attach_depth)?;
        }

        for row in &abnormal {
            if let Some(depth) = &row.depth_path {
                if !file_stem(depth).contains(&file_stem(&row.image_path)) {
                    return Err(DataError::DepthNameMismatch {
                        image: row.image_path.clone(),
                        depth: depth.clone(),
                    });
                }
            }
        }

        for depth in normal.iter().chain(&abnormal).chain(&normal_test).filter_map(|r| r.depth_path.as_ref()) {
            if !depth.exists() {
                return Err(DataError::MissingFile { kind: "depth image", path: depth.clone() });
            }
        }
    }

    // Masks belong to abnormal images only
    if let (Some(mask_dir), Some(_)) = (&dirs.mask, &dirs.abnormal) {
        let masks = list(Some(mask_dir.as_path()), DirType::Mask, exts)?;
        pair_positionally(&mut abnormal, masks, DirType::Abnormal, DirType::Mask, |row, mask| {
            row.mask_path = Some(mask)
        })?;

        for mask in abnormal.iter().filter_map(|r| r.mask_path.as_ref()) {
            if !mask.exists() {
                return Err(DataError::MissingFile { kind: "mask", path: mask.clone() });
            }
        }
    }

    let mut samples: Vec<SampleRecord> = normal.into_iter().chain(abnormal).chain(normal_test).collect();
    samples.sort_by(|a, b| a.image_path.as_os_str().cmp(b.image_path.as_os_str()));

    match split {
        None | Some(Split::Full) => {}
        Some(split) => samples.retain(|s| s.split == split),
    }

    Ok(samples)
}

// ─── FolderSource ─────────────────────────────────────────────────────────────
/// Lazily builds the sample table of a layout for one split.
#[derive(Debug, Clone)]
pub struct FolderSource {
    pub layout: FolderLayout,
    pub split:  Option<Split>,
}

impl FolderSource {
    pub fn new(layout: FolderLayout, split: Option<Split>) -> Self {
        Self { layout, split }
    }
}

impl SampleSource for FolderSource {
    fn load_samples(&self) -> DataResult<Vec<SampleRecord>> {
        make_folder_dataset(&self.layout, self.split)
    }
}

// ─── FolderConfig ─────────────────────────────────────────────────────────────
/// Everything needed to build a folder datamodule.
/// Can be read from a JSON file; missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolderConfig {
    #[serde(flatten)]
    pub layout:          FolderLayout,
    /// Applied to the train split
    pub train_transform: ImageTransform,
    /// Applied to the test split and everything carved out of it
    pub eval_transform:  ImageTransform,
    pub task:            TaskType,
    #[serde(flatten)]
    pub datamodule:      DataModuleConfig,
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            layout:          FolderLayout::default(),
            train_transform: ImageTransform::default(),
            eval_transform:  ImageTransform::default(),
            task:            TaskType::Segmentation,
            datamodule:      DataModuleConfig::default(),
        }
    }
}

impl FolderConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config '{}'", path.display()))
    }
}

// ─── FolderDataModule ─────────────────────────────────────────────────────────
pub struct FolderDataModule;

impl FolderDataModule {
    /// Train dataset over the train split with the train transform,
    /// test dataset over the test split with the eval transform.
    pub fn build(config: FolderConfig) -> Result<AnomalyDataModule> {
        ensure!(
            !(config.task == TaskType::Classification && config.layout.mask_dir.is_some()),
            DataError::MaskWithClassification
        );

        let checked = |t: ImageTransform, which: &str| {
            ImageTransform::new(t.image_size, t.center_crop, t.normalization)
                .with_context(|| format!("invalid {which} transform"))
        };
        let train_transform = checked(config.train_transform, "train")?;
        let eval_transform  = checked(config.eval_transform, "eval")?;

        let train = AnomalyDataset::new(
            config.task,
            train_transform,
            FolderSource::new(config.layout.clone(), Some(Split::Train)),
        );
        let test = AnomalyDataset::new(
            config.task,
            eval_transform,
            FolderSource::new(config.layout, Some(Split::Test)),
        );

        Ok(AnomalyDataModule::new(config.datamodule, train, test))
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::datamodule::Stage;
    use crate::data::transform::InputNormalization;
    use burn::data::dataloader::DataLoader;
    use crate::domain::labels::{TestSplitMode, ValSplitMode};
    use crate::domain::sample::LabelCounts;
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::fs;
    use tempfile::TempDir;

    fn write_rgb(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            RgbImage::from_pixel(16, 16, Rgb([100, 50, 25])).save(dir.join(name)).unwrap();
        }
    }

    fn write_masks(dir: &Path, names: &[&str]) {
        fs::create_dir_all(dir).unwrap();
        for name in names {
            let mut m = GrayImage::new(16, 16);
            for y in 4..8 {
                for x in 4..8 {
                    m.put_pixel(x, y, Luma([255]));
                }
            }
            m.save(dir.join(name)).unwrap();
        }
    }

    /// good/ (5), bad/ (2), ground_truth/ (2)
    fn mvtec_like() -> TempDir {
        let tmp = tempfile::tempdir().unwrap();
        write_rgb(&tmp.path().join("good"), &["000.png", "001.png", "002.png", "003.png", "004.png"]);
        write_rgb(&tmp.path().join("bad"), &["000.png", "001.png"]);
        write_masks(&tmp.path().join("ground_truth"), &["000_mask.png", "001_mask.png"]);
        tmp
    }

    fn layout(tmp: &TempDir) -> FolderLayout {
        FolderLayout {
            root:         Some(tmp.path().to_path_buf()),
            abnormal_dir: Some("bad".into()),
            mask_dir:     Some("ground_truth".into()),
            ..FolderLayout::new("good")
        }
    }

    #[test]
    fn test_full_table_labels_and_splits() {
        let tmp     = mvtec_like();
        let samples = make_folder_dataset(&layout(&tmp), None).unwrap();
        assert_eq!(samples.len(), 7);

        for s in &samples {
            match s.label {
                DirType::Normal => {
                    assert_eq!(s.label_index, LabelName::Normal);
                    assert_eq!(s.split, Split::Train);
                    assert!(s.mask_path.is_none());
                }
                DirType::Abnormal => {
                    assert_eq!(s.label_index, LabelName::Abnormal);
                    assert_eq!(s.split, Split::Test);
                    let mask = s.mask_path.as_ref().unwrap();
                    assert!(file_stem(mask).starts_with(&file_stem(&s.image_path)));
                }
                other => panic!("unexpected dir type {other}"),
            }
        }

        let mut sorted = samples.clone();
        sorted.sort_by(|a, b| a.image_path.as_os_str().cmp(b.image_path.as_os_str()));
        assert_eq!(samples, sorted);
    }

    #[test]
    fn test_rows_sorted_by_path_string() {
        let tmp = tempfile::tempdir().unwrap();
        write_rgb(&tmp.path().join("good"), &["sub-a.png"]);
        write_rgb(&tmp.path().join("good").join("sub"), &["x.png"]);

        let layout  = FolderLayout { root: Some(tmp.path().to_path_buf()), ..FolderLayout::new("good") };
        let samples = make_folder_dataset(&layout, None).unwrap();
        let names: Vec<String> = samples
            .iter()
            .map(|s| s.image_path.strip_prefix(tmp.path().canonicalize().unwrap()).unwrap().to_string_lossy().into_owned())
            .collect();
        // '-' sorts before '/', so the flat file comes first
        assert_eq!(names, vec!["good/sub-a.png".to_string(), "good/sub/x.png".to_string()]);
    }

    #[test]
    fn test_split_filter() {
        let tmp   = mvtec_like();
        let train = make_folder_dataset(&layout(&tmp), Some(Split::Train)).unwrap();
        let test  = make_folder_dataset(&layout(&tmp), Some(Split::Test)).unwrap();
        assert_eq!(train.len(), 5);
        assert_eq!(test.len(), 2);
        assert_eq!(make_folder_dataset(&layout(&tmp), Some(Split::Full)).unwrap().len(), 7);
    }

    #[test]
    fn test_masks_ignored_without_abnormal_dir() {
        let tmp = mvtec_like();
        let layout = FolderLayout { abnormal_dir: None, ..layout(&tmp) };
        let samples = make_folder_dataset(&layout, None).unwrap();
        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|s| s.mask_path.is_none()));
    }

    #[test]
    fn test_mask_count_mismatch() {
        let tmp = mvtec_like();
        write_masks(&tmp.path().join("ground_truth"), &["002_mask.png"]);
        let err = make_folder_dataset(&layout(&tmp), None).unwrap_err();
        assert!(matches!(err, DataError::CountMismatch { .. }));
    }

    #[test]
    fn test_missing_normal_dir() {
        let tmp = mvtec_like();
        let err = make_folder_dataset(&FolderLayout { root: Some(tmp.path().into()), ..FolderLayout::new("nope") }, None)
            .unwrap_err();
        assert!(matches!(err, DataError::MissingPath { .. }));
    }

    #[test]
    fn test_depth_pairing() {
        let tmp = tempfile::tempdir().unwrap();
        let p   = tmp.path();
        write_rgb(&p.join("good"), &["000.png", "001.png"]);
        write_rgb(&p.join("good_xyz"), &["000.tiff", "001.tiff"]);
        write_rgb(&p.join("bad"), &["007.png"]);
        write_rgb(&p.join("bad_xyz"), &["007.tiff"]);

        let layout = FolderLayout {
            root:               Some(p.to_path_buf()),
            abnormal_dir:       Some("bad".into()),
            normal_depth_dir:   Some("good_xyz".into()),
            abnormal_depth_dir: Some("bad_xyz".into()),
            ..FolderLayout::new("good")
        };
        let samples = make_folder_dataset(&layout, None).unwrap();
        assert_eq!(samples.len(), 3);
        for s in &samples {
            let depth = s.depth_path.as_ref().unwrap();
            assert_eq!(file_stem(depth), file_stem(&s.image_path));
        }
    }

    #[test]
    fn test_depth_name_mismatch() {
        let tmp = tempfile::tempdir().unwrap();
        let p   = tmp.path();
        write_rgb(&p.join("good"), &["000.png"]);
        write_rgb(&p.join("good_xyz"), &["000.tiff"]);
        write_rgb(&p.join("bad"), &["007.png"]);
        write_rgb(&p.join("bad_xyz"), &["008.tiff"]);

        let layout = FolderLayout {
            root:               Some(p.to_path_buf()),
            abnormal_dir:       Some("bad".into()),
            normal_depth_dir:   Some("good_xyz".into()),
            abnormal_depth_dir: Some("bad_xyz".into()),
            ..FolderLayout::new("good")
        };
        let err = make_folder_dataset(&layout, None).unwrap_err();
        assert!(matches!(err, DataError::DepthNameMismatch { .. }));
    }

    #[test]
    fn test_classification_with_mask_rejected() {
        let tmp    = mvtec_like();
        let config = FolderConfig { layout: layout(&tmp), task: TaskType::Classification, ..FolderConfig::default() };
        assert!(FolderDataModule::build(config).is_err());
    }

    #[test]
    fn test_config_from_json_uses_defaults() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("folder.json");
        fs::write(&path, r#"{ "normal_dir": "good", "abnormal_dir": "bad", "seed": 3, "task": "classification" }"#).unwrap();

        let config = FolderConfig::from_json_file(&path).unwrap();
        assert_eq!(config.layout.normal_dir, PathBuf::from("good"));
        assert_eq!(config.layout.abnormal_dir, Some(PathBuf::from("bad")));
        assert_eq!(config.task, TaskType::Classification);
        assert_eq!(config.datamodule.seed, Some(3));
        assert_eq!(config.datamodule.test_split_mode, TestSplitMode::FromDir);
        assert_eq!(config.train_transform, ImageTransform::default());
        assert_eq!(config.eval_transform, ImageTransform::default());
    }

    #[test]
    fn test_train_and_eval_transforms() {
        let tmp   = mvtec_like();
        let train = ImageTransform::new((16, 16), Some((12, 12)), InputNormalization::Imagenet).unwrap();
        let eval  = ImageTransform::new((8, 8), None, InputNormalization::None).unwrap();
        let config = FolderConfig {
            layout:          layout(&tmp),
            train_transform: train,
            eval_transform:  eval,
            datamodule:      DataModuleConfig { seed: Some(1), num_workers: 0, ..DataModuleConfig::default() },
            ..FolderConfig::default()
        };

        let mut dm = FolderDataModule::build(config).unwrap();
        dm.setup(None).unwrap();
        assert_eq!(*dm.train_data().transform(), train);
        assert_eq!(*dm.test_data().transform(), eval);
        assert_eq!(*dm.val_data().unwrap().transform(), eval);
    }

    #[test]
    fn test_invalid_eval_transform_rejected() {
        let tmp    = mvtec_like();
        let config = FolderConfig {
            layout:         layout(&tmp),
            eval_transform: ImageTransform { image_size: (8, 8), center_crop: Some((16, 16)), normalization: InputNormalization::None },
            ..FolderConfig::default()
        };
        let err = FolderDataModule::build(config).err().unwrap();
        assert!(err.to_string().contains("eval"));
    }

    #[test]
    fn test_config_json_transforms() {
        let config: FolderConfig = serde_json::from_str(
            r#"{ "normal_dir": "good", "eval_transform": { "image_size": [64, 48], "normalization": "none" } }"#,
        )
        .unwrap();
        assert_eq!(config.train_transform, ImageTransform::default());
        assert_eq!(config.eval_transform.image_size, (64, 48));
        assert_eq!(config.eval_transform.normalization, InputNormalization::None);
        assert!(config.eval_transform.center_crop.is_none());
    }

    #[test]
    fn test_datamodule_end_to_end() {
        type B = burn::backend::NdArray;

        let tmp   = mvtec_like();
        let small = ImageTransform::new((8, 8), None, InputNormalization::None).unwrap();
        let config = FolderConfig {
            layout:          layout(&tmp),
            train_transform: small,
            eval_transform:  small,
            datamodule:      DataModuleConfig {
                eval_batch_size: 4,
                num_workers:     0,
                val_split_mode:  ValSplitMode::SameAsTest,
                seed:            Some(0),
                ..DataModuleConfig::default()
            },
            ..FolderConfig::default()
        };

        let mut dm = FolderDataModule::build(config).unwrap();
        dm.setup(Some(Stage::Test)).unwrap();

        // No normal_test_dir: 20% of the 5 normal images move to test
        assert_eq!(dm.train_data().sample_count(), 4);
        assert_eq!(dm.test_data().label_counts(), LabelCounts { normal: 1, abnormal: 2 });

        let device  = Default::default();
        let batches: Vec<_> = dm.test_dataloader::<B>(&device).unwrap().iter().collect();
        assert_eq!(batches.len(), 1);

        let batch = &batches[0];
        assert_eq!(batch.image.dims(), [3, 3, 8, 8]);
        assert_eq!(batch.mask.as_ref().map(|m| m.dims()), Some([3, 8, 8]));
        let labels = batch.label.clone().into_data().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![1, 1, 0]);
    }
}
