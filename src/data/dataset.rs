// ============================================================
// Layer 4: Anomaly Dataset
// ============================================================
// An AnomalyDataset is a sample table plus the knowledge of how
// to turn one row into tensors-to-be:
//
//   SampleSource ──setup()──▶ Vec<SampleRecord> ──get(i)──▶ AnomalyItem
//
// The table is filled lazily by setup(), so a datamodule can be
// constructed cheaply and split later. After setup the table is
// shared behind an Arc: subsets produced by the splitter are new
// datasets over new tables, never views into the old one.
//
// Implements burn's Dataset trait so a DataLoader can index it.

use burn::data::dataset::Dataset;
use image::{GrayImage, Rgb32FImage, RgbImage};
use std::{collections::HashSet, path::Path, sync::Arc};
use tempfile::TempDir;

use crate::data::mask::mask_values_to_boxes;
use crate::data::transform::ImageTransform;
use crate::domain::error::{DataError, DataResult};
use crate::domain::labels::{LabelName, TaskType};
use crate::domain::sample::{LabelCounts, SampleRecord};
use crate::domain::traits::{SampleSource, StaticSource};

// ─── AnomalyItem ──────────────────────────────────────────────────────────────
/// One fully loaded and transformed sample.
#[derive(Debug, Clone)]
pub struct AnomalyItem {
    pub image_path: String,
    pub label:      LabelName,
    /// RGB image, CHW, length 3 * height * width
    pub image:      Vec<f32>,
    pub height:     usize,
    pub width:      usize,
    /// Ground-truth mask in {0, 1}, length height * width.
    /// Present for detection and segmentation tasks.
    pub mask:       Option<Vec<f32>>,
    pub mask_path:  Option<String>,
    /// Depth map, CHW, same spatial size as the image
    pub depth_image: Option<Vec<f32>>,
    pub depth_path:  Option<String>,
    /// `[x1, y1, x2, y2]` per mask component (detection task only)
    pub boxes:      Option<Vec<[f32; 4]>>,
}

// ─── Image readers ────────────────────────────────────────────────────────────
pub fn read_image(path: &Path) -> DataResult<RgbImage> {
    let img = image::open(path).map_err(|source| DataError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb8())
}

pub fn read_mask(path: &Path) -> DataResult<GrayImage> {
    let img = image::open(path).map_err(|source| DataError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_luma8())
}

/// Depth maps are usually 32-bit float TIFFs holding xyz coordinates.
pub fn read_depth_image(path: &Path) -> DataResult<Rgb32FImage> {
    let img = image::open(path).map_err(|source| DataError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(img.to_rgb32f())
}

/// Open `path` and decode only its header.
pub fn check_image_header(path: &Path) -> DataResult<()> {
    let io_err = |source| DataError::Io { path: path.to_path_buf(), source };
    image::ImageReader::open(path)
        .map_err(io_err)?
        .with_guessed_format()
        .map_err(io_err)?
        .into_dimensions()
        .map_err(|source| DataError::Image { path: path.to_path_buf(), source })?;
    Ok(())
}

// ─── AnomalyDataset ───────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AnomalyDataset {
    task:      TaskType,
    transform: ImageTransform,
    source:    Arc<dyn SampleSource>,
    samples:   Option<Arc<Vec<SampleRecord>>>,
    /// Temporary directories holding generated files this table points
    /// into. Dropped with the last dataset that references them.
    scratch:   Vec<Arc<TempDir>>,
}

impl AnomalyDataset {
    /// A dataset that reads its table from `source` on setup().
    pub fn new(task: TaskType, transform: ImageTransform, source: impl SampleSource + 'static) -> Self {
        Self {
            task,
            transform,
            source:  Arc::new(source),
            samples: None,
            scratch: Vec::new(),
        }
    }

    /// An already set-up dataset over a fixed table.
    pub fn from_samples(task: TaskType, transform: ImageTransform, samples: Vec<SampleRecord>) -> Self {
        let mut ds = Self::new(task, transform, StaticSource::new(samples.clone()));
        ds.samples = Some(Arc::new(samples));
        ds
    }

    /// Same task, transform and scratch space, different table.
    pub fn with_samples(&self, samples: Vec<SampleRecord>) -> Self {
        Self {
            task:      self.task,
            transform: self.transform,
            source:    Arc::clone(&self.source),
            samples:   Some(Arc::new(samples)),
            scratch:   self.scratch.clone(),
        }
    }

    pub(crate) fn attach_scratch(&mut self, dir: Arc<TempDir>) {
        self.scratch.push(dir);
    }

    pub fn task(&self) -> TaskType {
        self.task
    }

    pub fn transform(&self) -> &ImageTransform {
        &self.transform
    }

    /// Populate the sample table. Calling it again is a no-op.
    pub fn setup(&mut self) -> DataResult<()> {
        if self.samples.is_some() {
            return Ok(());
        }
        let samples = self.source.load_samples()?;
        let counts  = LabelCounts::of(&samples);
        tracing::debug!(
            "Dataset set up: {} samples ({} normal, {} abnormal)",
            counts.total(),
            counts.normal,
            counts.abnormal,
        );
        self.samples = Some(Arc::new(samples));
        Ok(())
    }

    pub fn is_setup(&self) -> bool {
        self.samples.is_some()
    }

    /// The sample table; empty until setup() has run.
    pub fn samples(&self) -> &[SampleRecord] {
        self.samples.as_deref().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn sample_count(&self) -> usize {
        self.samples().len()
    }

    pub fn label_counts(&self) -> LabelCounts {
        LabelCounts::of(self.samples())
    }

    pub fn has_normal(&self) -> bool {
        self.samples().iter().any(SampleRecord::is_normal)
    }

    pub fn has_anomalous(&self) -> bool {
        self.samples().iter().any(SampleRecord::is_anomalous)
    }

    fn require_setup(&self) -> DataResult<&[SampleRecord]> {
        match &self.samples {
            Some(s) => Ok(s.as_slice()),
            None => Err(DataError::NotSetUp),
        }
    }

    /// New dataset holding the rows at `indices`, in that order.
    pub fn subsample(&self, indices: &[usize]) -> DataResult<Self> {
        let samples = self.require_setup()?;

        let unique: HashSet<usize> = indices.iter().copied().collect();
        if unique.len() != indices.len() {
            return Err(DataError::DuplicateIndices);
        }

        let rows = indices
            .iter()
            .map(|&i| {
                samples.get(i).cloned().ok_or(DataError::IndexOutOfRange {
                    index: i,
                    len:   samples.len(),
                })
            })
            .collect::<DataResult<Vec<_>>>()?;

        Ok(self.with_samples(rows))
    }

    /// New dataset with `other`'s rows appended to this one's.
    /// Task and transform are taken from `self`.
    pub fn concat(&self, other: &Self) -> DataResult<Self> {
        let mut rows = self.require_setup()?.to_vec();
        rows.extend_from_slice(other.require_setup()?);

        let mut out = self.with_samples(rows);
        out.scratch.extend(other.scratch.iter().cloned());
        Ok(out)
    }

    /// Check every row before iteration: image, depth and (for tasks
    /// that need one) mask files must open and carry a readable image
    /// header, and abnormal rows must have a mask when the task needs it.
    pub fn verify_files(&self) -> DataResult<()> {
        for record in self.require_setup()? {
            check_image_header(&record.image_path)?;
            if let Some(depth) = &record.depth_path {
                check_image_header(depth)?;
            }
            if !self.task.needs_mask() || record.is_normal() {
                continue;
            }
            match &record.mask_path {
                Some(mask) => check_image_header(mask)?,
                None => {
                    return Err(DataError::MaskRequired {
                        path: record.image_path.clone(),
                        task: self.task.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Read and transform the sample at `index`.
    ///
    /// Normal samples get an all-zero mask; abnormal samples read
    /// theirs from disk. Boxes are derived from the transformed mask.
    pub fn load_item(&self, index: usize) -> DataResult<AnomalyItem> {
        let samples = self.require_setup()?;
        let record  = samples.get(index).ok_or(DataError::IndexOutOfRange {
            index,
            len: samples.len(),
        })?;

        let image = read_image(&record.image_path)?;
        let chw   = self.transform.apply_rgb(&image);

        let depth_image = match &record.depth_path {
            Some(path) => Some(self.transform.apply_depth(&read_depth_image(path)?).data),
            None => None,
        };

        let (mask, boxes) = if self.task.needs_mask() {
            let raw = match (record.label_index, &record.mask_path) {
                (LabelName::Normal, _) => GrayImage::new(image.width(), image.height()),
                (LabelName::Abnormal, Some(path)) => read_mask(path)?,
                (LabelName::Abnormal, None) => {
                    return Err(DataError::MaskRequired {
                        path: record.image_path.clone(),
                        task: self.task.to_string(),
                    })
                }
            };
            let m = self.transform.apply_mask(&raw);
            let boxes = (self.task == TaskType::Detection)
                .then(|| mask_values_to_boxes(&m.data, m.height, m.width));
            (Some(m.data), boxes)
        } else {
            (None, None)
        };

        Ok(AnomalyItem {
            image_path: record.image_path.to_string_lossy().into_owned(),
            label:      record.label_index,
            image:      chw.data,
            height:     chw.height,
            width:      chw.width,
            mask,
            mask_path:  record.mask_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            depth_image,
            depth_path: record.depth_path.as_ref().map(|p| p.to_string_lossy().into_owned()),
            boxes,
        })
    }
}

// ─── Burn Dataset Trait Implementation ────────────────────────────────────────
impl Dataset<AnomalyItem> for AnomalyDataset {
    fn get(&self, index: usize) -> Option<AnomalyItem> {
        match self.load_item(index) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!("Failed to load sample {}: {}", index, e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.sample_count()
    }
}
