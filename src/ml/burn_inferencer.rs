// ============================================================
// Layer 5: Burn Inferencer
// ============================================================
// Runs a checkpointed AnomalyModel on any burn backend:
//
//   RgbImage ──ImageTransform──▶ [1, 3, H, W]
//            ──model.forward──▶ anomaly_map [1, 1, H, W], score
//            ──post_process──▶ label, mask, normalized map/score,
//                              resized to the original image,
//                              boxes (detection only)
//
// The label and mask are decided on the raw values against the
// raw thresholds; normalization only rescales what is returned.

use anyhow::{ensure, Context, Result};
use burn::{prelude::*, tensor::TensorData};
use image::{imageops::FilterType, GrayImage, Luma, RgbImage};
use std::path::Path;

use crate::data::mask::{masks_to_boxes, AnomalyMap};
use crate::data::transform::ImageTransform;
use crate::domain::labels::{LabelName, TaskType};
use crate::infra::checkpoint::ModelCheckpoint;
use crate::infra::metadata::load_metadata;
use crate::ml::inferencer::{normalize, InferenceMetadata, Inferencer, PostProcessed};
use crate::ml::model::{AnomalyModel, ModelOutput};

pub struct BurnInferencer<B: Backend, M: AnomalyModel<B>> {
    model:     M,
    device:    B::Device,
    transform: ImageTransform,
    task:      TaskType,
    metadata:  InferenceMetadata,
}

impl<B: Backend, M: AnomalyModel<B>> BurnInferencer<B, M> {
    /// Wrap an already loaded model.
    pub fn new(
        model:     M,
        device:    B::Device,
        transform: ImageTransform,
        task:      TaskType,
        metadata:  InferenceMetadata,
    ) -> Self {
        Self { model, device, transform, task, metadata }
    }

    /// Load `checkpoint` into the initialised `model` and read the
    /// metadata file when one is given.
    pub fn from_checkpoint(
        model:      M,
        checkpoint: &Path,
        metadata:   Option<&Path>,
        transform:  ImageTransform,
        task:       TaskType,
        device:     B::Device,
    ) -> Result<Self> {
        let mut inferencer = Self::new(model, device, transform, task, load_metadata(metadata)?);
        inferencer.model = inferencer.load_model(checkpoint)?;
        Ok(inferencer)
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn task(&self) -> TaskType {
        self.task
    }
}

fn first_map<B: Backend>(map: Tensor<B, 4>) -> Result<AnomalyMap> {
    let [_, _, h, w] = map.dims();
    let values = map
        .slice([0..1, 0..1, 0..h, 0..w])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| anyhow::anyhow!("Cannot read anomaly map: {e:?}"))?;
    AnomalyMap::from_raw(w as u32, h as u32, values).context("anomaly map has the wrong number of values")
}

impl<B: Backend, M: AnomalyModel<B>> Inferencer for BurnInferencer<B, M> {
    type Model  = M;
    type Input  = Tensor<B, 4>;
    type Output = ModelOutput<B>;

    fn load_model(&self, path: &Path) -> Result<M> {
        ModelCheckpoint::new(path).load(self.model.clone(), &self.device)
    }

    fn pre_process(&self, image: &RgbImage) -> Result<Tensor<B, 4>> {
        let chw = self.transform.apply_rgb(image);
        let shape = [1, chw.channels, chw.height, chw.width];
        Ok(Tensor::from_data(TensorData::new(chw.data, shape), &self.device))
    }

    fn forward(&self, input: Tensor<B, 4>) -> Result<ModelOutput<B>> {
        let output = self.model.forward(input);
        ensure!(output.anomaly_map.dims()[1] == 1, "anomaly map must have a single channel");
        Ok(output)
    }

    fn post_process(&self, output: ModelOutput<B>, metadata: &InferenceMetadata) -> Result<PostProcessed> {
        let pred_score = output
            .scores()
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| anyhow::anyhow!("Cannot read prediction score: {e:?}"))?
            .first()
            .copied()
            .context("model returned no score")?;

        let pred_label = metadata.image_threshold.map(|t| {
            if pred_score >= t { LabelName::Abnormal } else { LabelName::Normal }
        });

        if self.task == TaskType::Classification {
            let (_, pred_score) = normalize(pred_score, metadata, None)?;
            return Ok(PostProcessed { pred_score, pred_label, ..PostProcessed::default() });
        }

        let raw_map   = first_map(output.anomaly_map)?;
        let pred_mask = metadata.pixel_threshold.map(|t| {
            GrayImage::from_fn(raw_map.width(), raw_map.height(), |x, y| {
                Luma([if raw_map.get_pixel(x, y)[0] >= t { 255 } else { 0 }])
            })
        });

        let (anomaly_map, pred_score) = normalize(pred_score, metadata, Some(raw_map))?;

        // Back to the size of the image that was passed in
        let (anomaly_map, pred_mask) = match metadata.image_shape {
            Some((h, w)) => (
                anomaly_map.map(|m| image::imageops::resize(&m, w, h, FilterType::Triangle)),
                pred_mask.map(|m| image::imageops::resize(&m, w, h, FilterType::Nearest)),
            ),
            None => (anomaly_map, pred_mask),
        };

        let (pred_boxes, box_labels) = match (&pred_mask, self.task) {
            (Some(mask), TaskType::Detection) => {
                let boxes  = masks_to_boxes(mask);
                let labels = vec![LabelName::Abnormal; boxes.len()];
                (Some(boxes), Some(labels))
            }
            _ => (None, None),
        };

        Ok(PostProcessed { pred_score, pred_label, anomaly_map, pred_mask, pred_boxes, box_labels })
    }

    fn metadata(&self) -> Option<&InferenceMetadata> {
        Some(&self.metadata)
    }
}
