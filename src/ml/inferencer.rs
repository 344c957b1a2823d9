// ============================================================
// Layer 5: Inferencer
// ============================================================
// Every deployed model goes through the same four steps:
//
//   image ──pre_process──▶ input ──forward──▶ raw output
//                                                │
//          ImageResult ◀──────── post_process ◀──┘ (+ metadata)
//
// Implementors provide the four steps; predict() chains them
// and records the original image shape in the metadata so
// post-processing can resize maps back to it.
//
// Metadata carries the thresholds and min/max statistics
// collected at training time. With both min and max present,
// scores and maps are rescaled so the threshold lands at 0.5:
//
//   normalized = clamp((x - threshold) / (max - min) + 0.5, 0, 1)

use anyhow::{ensure, Context, Result};
use image::{imageops::FilterType, GrayImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::dataset::read_image;
use crate::data::mask::{compute_mask, dilate, find_boundaries, AnomalyMap};
use crate::domain::labels::LabelName;

/// Outline colour painted by [`superimpose_segmentation_mask`].
pub const OUTLINE_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Outlines are thickened to a 7×7 square around each boundary pixel.
const OUTLINE_RADIUS: u8 = 3;

// ─── Metadata ─────────────────────────────────────────────────────────────────
/// Statistics saved alongside a trained model.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceMetadata {
    pub image_threshold: Option<f32>,
    pub pixel_threshold: Option<f32>,
    pub min:             Option<f32>,
    pub max:             Option<f32>,
    /// (height, width) of the image being predicted
    pub image_shape:     Option<(u32, u32)>,
}

// ─── Inputs and outputs ───────────────────────────────────────────────────────
/// What predict() accepts: a path to read, or an already decoded image.
#[derive(Debug, Clone)]
pub enum ImageSource {
    Path(PathBuf),
    Image(RgbImage),
}

impl From<&Path> for ImageSource {
    fn from(p: &Path) -> Self {
        Self::Path(p.to_path_buf())
    }
}

impl From<PathBuf> for ImageSource {
    fn from(p: PathBuf) -> Self {
        Self::Path(p)
    }
}

impl From<RgbImage> for ImageSource {
    fn from(image: RgbImage) -> Self {
        Self::Image(image)
    }
}

/// Output of post_process(), before it is paired with the image.
#[derive(Debug, Clone, Default)]
pub struct PostProcessed {
    pub pred_score:  f32,
    pub pred_label:  Option<LabelName>,
    pub anomaly_map: Option<AnomalyMap>,
    /// 0 / 255
    pub pred_mask:   Option<GrayImage>,
    pub pred_boxes:  Option<Vec<[f32; 4]>>,
    pub box_labels:  Option<Vec<LabelName>>,
}

/// Prediction for one image.
#[derive(Debug, Clone)]
pub struct ImageResult {
    pub image:       RgbImage,
    pub pred_score:  f32,
    pub pred_label:  Option<LabelName>,
    pub anomaly_map: Option<AnomalyMap>,
    pub pred_mask:   Option<GrayImage>,
    pub pred_boxes:  Option<Vec<[f32; 4]>>,
    pub box_labels:  Option<Vec<LabelName>>,
}

impl ImageResult {
    pub fn new(image: RgbImage, output: PostProcessed) -> Self {
        Self {
            image,
            pred_score:  output.pred_score,
            pred_label:  output.pred_label,
            anomaly_map: output.anomaly_map,
            pred_mask:   output.pred_mask,
            pred_boxes:  output.pred_boxes,
            box_labels:  output.box_labels,
        }
    }

    pub fn is_anomalous(&self) -> bool {
        self.pred_label == Some(LabelName::Abnormal)
    }
}

// ─── Inferencer trait ─────────────────────────────────────────────────────────
pub trait Inferencer {
    /// The loaded model.
    type Model;
    /// Pre-processed model input.
    type Input;
    /// Raw model output.
    type Output;

    fn load_model(&self, path: &Path) -> Result<Self::Model>;

    fn pre_process(&self, image: &RgbImage) -> Result<Self::Input>;

    fn forward(&self, input: Self::Input) -> Result<Self::Output>;

    fn post_process(&self, output: Self::Output, metadata: &InferenceMetadata) -> Result<PostProcessed>;

    /// Metadata loaded with the model, used when predict() is given none.
    fn metadata(&self) -> Option<&InferenceMetadata> {
        None
    }

    /// pre_process → forward → post_process on one image.
    fn predict(&self, image: impl Into<ImageSource>, metadata: Option<&InferenceMetadata>) -> Result<ImageResult>
    where
        Self: Sized,
    {
        let mut metadata = metadata
            .or_else(|| self.metadata())
            .cloned()
            .unwrap_or_default();

        let image = match image.into() {
            ImageSource::Path(path) => read_image(&path)
                .with_context(|| format!("Failed to read image '{}'", path.display()))?,
            ImageSource::Image(image) => image,
        };
        metadata.image_shape = Some((image.height(), image.width()));

        let input  = self.pre_process(&image)?;
        let output = self.forward(input)?;
        let output = self.post_process(output, &metadata)?;

        tracing::debug!("Predicted score {:.4} ({:?})", output.pred_score, output.pred_label);
        Ok(ImageResult::new(image, output))
    }
}

// ─── Normalization ────────────────────────────────────────────────────────────
pub fn normalize_min_max(value: f32, threshold: f32, min: f32, max: f32) -> f32 {
    ((value - threshold) / (max - min) + 0.5).clamp(0.0, 1.0)
}

/// Min-max normalize the score (and map, when given) when the metadata
/// holds both `min` and `max`; otherwise return them unchanged.
pub fn normalize(
    pred_score:  f32,
    metadata:    &InferenceMetadata,
    anomaly_map: Option<AnomalyMap>,
) -> Result<(Option<AnomalyMap>, f32)> {
    let (Some(min), Some(max)) = (metadata.min, metadata.max) else {
        return Ok((anomaly_map, pred_score));
    };
    ensure!(max > min, "metadata max ({max}) must be greater than min ({min})");

    let anomaly_map = match anomaly_map {
        Some(mut map) => {
            let t = metadata
                .pixel_threshold
                .context("metadata has min/max but no pixel_threshold")?;
            map.pixels_mut().for_each(|p| p[0] = normalize_min_max(p[0], t, min, max));
            Some(map)
        }
        None => None,
    };

    let t = metadata
        .image_threshold
        .context("metadata has min/max but no image_threshold")?;
    Ok((anomaly_map, normalize_min_max(pred_score, t, min, max)))
}

// ─── Segmentation overlay ─────────────────────────────────────────────────────
/// Outline the region where a normalized anomaly map exceeds 0.5 on
/// `image`, in red, with outlines thickened by a 7×7 square.
pub fn superimpose_segmentation_mask(
    metadata:    &InferenceMetadata,
    anomaly_map: &AnomalyMap,
    mut image:   RgbImage,
) -> RgbImage {
    let (height, width) = metadata
        .image_shape
        .unwrap_or((image.height(), image.width()));

    let mask = compute_mask(anomaly_map, 0.5);
    let mask = image::imageops::resize(&mask, width, height, FilterType::Nearest);
    let outlines = dilate(&find_boundaries(&mask), OUTLINE_RADIUS);

    for (x, y, p) in outlines.enumerate_pixels() {
        if p[0] > 0 && x < image.width() && y < image.height() {
            image.put_pixel(x, y, OUTLINE_COLOR);
        }
    }
    image
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn metadata() -> InferenceMetadata {
        InferenceMetadata {
            image_threshold: Some(4.0),
            pixel_threshold: Some(2.0),
            min:             Some(0.0),
            max:             Some(8.0),
            image_shape:     None,
        }
    }

    #[test]
    fn test_threshold_maps_to_half() {
        assert_eq!(normalize_min_max(4.0, 4.0, 0.0, 8.0), 0.5);
        assert_eq!(normalize_min_max(6.0, 4.0, 0.0, 8.0), 0.75);
        assert_eq!(normalize_min_max(100.0, 4.0, 0.0, 8.0), 1.0);
        assert_eq!(normalize_min_max(-100.0, 4.0, 0.0, 8.0), 0.0);
    }

    #[test]
    fn test_normalize_uses_separate_thresholds() {
        let map = AnomalyMap::from_pixel(2, 2, Luma([2.0]));
        let (map, score) = normalize(4.0, &metadata(), Some(map)).unwrap();
        assert_eq!(score, 0.5);
        assert!(map.unwrap().pixels().all(|p| p[0] == 0.5));
    }

    #[test]
    fn test_normalize_without_min_max_is_identity() {
        let meta = InferenceMetadata { min: None, ..metadata() };
        let (map, score) = normalize(7.25, &meta, None).unwrap();
        assert!(map.is_none());
        assert_eq!(score, 7.25);
    }

    #[test]
    fn test_normalize_missing_threshold_is_an_error() {
        let meta = InferenceMetadata { image_threshold: None, ..metadata() };
        assert!(normalize(1.0, &meta, None).is_err());
    }

    #[test]
    fn test_normalize_rejects_empty_range() {
        let flat = InferenceMetadata { min: Some(3.0), max: Some(3.0), ..metadata() };
        assert!(normalize(1.0, &flat, None).is_err());

        let inverted = InferenceMetadata { min: Some(5.0), max: Some(1.0), ..metadata() };
        let map = AnomalyMap::from_pixel(2, 2, Luma([2.0]));
        assert!(normalize(1.0, &inverted, Some(map)).is_err());
    }

    #[test]
    fn test_metadata_json_defaults() {
        let meta: InferenceMetadata = serde_json::from_str(r#"{ "image_threshold": 0.3 }"#).unwrap();
        assert_eq!(meta.image_threshold, Some(0.3));
        assert!(meta.min.is_none());
        assert!(meta.image_shape.is_none());
    }

    #[test]
    fn test_superimpose_paints_outline_only_near_region() {
        let mut map = AnomalyMap::new(40, 40);
        for y in 10..30 {
            for x in 10..30 {
                map.put_pixel(x, y, Luma([0.9]));
            }
        }
        let image = RgbImage::from_pixel(40, 40, Rgb([0, 0, 0]));
        let out   = superimpose_segmentation_mask(&InferenceMetadata::default(), &map, image);

        assert_eq!(*out.get_pixel(10, 20), OUTLINE_COLOR);
        assert_eq!(*out.get_pixel(29, 20), OUTLINE_COLOR);
        // Far inside and far outside the region stay untouched
        assert_eq!(*out.get_pixel(20, 20), Rgb([0, 0, 0]));
        assert_eq!(*out.get_pixel(0, 0), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_superimpose_empty_map_leaves_image() {
        let map   = AnomalyMap::new(16, 16);
        let image = RgbImage::from_pixel(16, 16, Rgb([9, 9, 9]));
        let out   = superimpose_segmentation_mask(&InferenceMetadata::default(), &map, image.clone());
        assert_eq!(out, image);
    }

    struct Doubler;

    impl Inferencer for Doubler {
        type Model  = ();
        type Input  = f32;
        type Output = f32;

        fn load_model(&self, _path: &Path) -> Result<()> {
            Ok(())
        }

        fn pre_process(&self, image: &RgbImage) -> Result<f32> {
            Ok(image.get_pixel(0, 0)[0] as f32)
        }

        fn forward(&self, input: f32) -> Result<f32> {
            Ok(input * 2.0)
        }

        fn post_process(&self, output: f32, metadata: &InferenceMetadata) -> Result<PostProcessed> {
            let (_, pred_score) = normalize(output, metadata, None)?;
            let pred_label = metadata.image_threshold.map(|t| {
                if output >= t { LabelName::Abnormal } else { LabelName::Normal }
            });
            Ok(PostProcessed { pred_score, pred_label, ..PostProcessed::default() })
        }
    }

    #[test]
    fn test_predict_chains_steps_and_records_shape() {
        let image  = RgbImage::from_pixel(3, 5, Rgb([3, 0, 0]));
        let result = Doubler.predict(image, Some(&metadata())).unwrap();
        // raw 6.0, threshold 4.0, range 8.0 → 0.75
        assert_eq!(result.pred_score, 0.75);
        assert!(result.is_anomalous());
        assert_eq!(result.image.dimensions(), (3, 5));
    }

    #[test]
    fn test_predict_reads_path() {
        let tmp  = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 1, 1])).save(&path).unwrap();

        let result = Doubler.predict(path.as_path(), None).unwrap();
        assert_eq!(result.pred_score, 2.0);
        assert!(result.pred_label.is_none());
        assert!(Doubler.predict(tmp.path().join("missing.png"), None).is_err());
    }
}
