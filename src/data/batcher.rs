// ============================================================
// Layer 4: Anomaly Batcher
// ============================================================
// Implements Burn's Batcher trait to stack a Vec<AnomalyItem>
// into tensors:
//
//   image       [N, 3, H, W]   float
//   label       [N]            int (0 normal, 1 abnormal)
//   mask        [N, H, W]      float, when every item has one
//   depth_image [N, 3, H, W]   float, when every item has one
//   boxes       Vec<Vec<box>>  one list per item, not a tensor
//
// Boxes stay a plain list because every image has a different
// number of them. Every item already has the same H and W
// because they all went through the same ImageTransform.

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
    tensor::TensorData,
};

use crate::data::dataset::AnomalyItem;

// ─── AnomalyBatch ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct AnomalyBatch<B: Backend> {
    pub image:       Tensor<B, 4>,
    pub label:       Tensor<B, 1, Int>,
    pub mask:        Option<Tensor<B, 3>>,
    pub depth_image: Option<Tensor<B, 4>>,
    pub boxes:       Option<Vec<Vec<[f32; 4]>>>,
    pub image_path:  Vec<String>,
    pub mask_path:   Vec<Option<String>>,
    pub depth_path:  Vec<Option<String>>,
}

impl<B: Backend> AnomalyBatch<B> {
    pub fn batch_size(&self) -> usize {
        self.image_path.len()
    }
}

// ─── AnomalyBatcher ───────────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct AnomalyBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> AnomalyBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    fn stack_chw(&self, planes: Vec<&[f32]>, channels: usize, height: usize, width: usize) -> Tensor<B, 4> {
        let n    = planes.len();
        let flat = planes.concat();
        Tensor::<B, 4>::from_data(TensorData::new(flat, [n, channels, height, width]), &self.device)
    }
}

// ─── Burn Batcher Trait Implementation ────────────────────────────────────────
impl<B: Backend> Batcher<AnomalyItem, AnomalyBatch<B>> for AnomalyBatcher<B> {
    fn batch(&self, items: Vec<AnomalyItem>) -> AnomalyBatch<B> {
        let n = items.len();
        let (height, width) = items.first().map(|i| (i.height, i.width)).unwrap_or((0, 0));

        let image = self.stack_chw(items.iter().map(|i| i.image.as_slice()).collect(), 3, height, width);

        let labels: Vec<i64> = items.iter().map(|i| i.label.index()).collect();
        let label = Tensor::<B, 1, Int>::from_data(TensorData::new(labels, [n]), &self.device);

        // Optional entries are only collated when every item carries them
        let mask = if n > 0 && items.iter().all(|i| i.mask.is_some()) {
            let flat: Vec<f32> = items.iter().flat_map(|i| i.mask.iter().flatten().copied()).collect();
            Some(Tensor::<B, 3>::from_data(TensorData::new(flat, [n, height, width]), &self.device))
        } else {
            None
        };

        let depth_image = if n > 0 && items.iter().all(|i| i.depth_image.is_some()) {
            let planes = items.iter().filter_map(|i| i.depth_image.as_deref()).collect();
            Some(self.stack_chw(planes, 3, height, width))
        } else {
            None
        };

        let boxes = if n > 0 && items.iter().all(|i| i.boxes.is_some()) {
            Some(items.iter().map(|i| i.boxes.clone().unwrap_or_default()).collect())
        } else {
            None
        };

        AnomalyBatch {
            image,
            label,
            mask,
            depth_image,
            boxes,
            image_path: items.iter().map(|i| i.image_path.clone()).collect(),
            mask_path:  items.iter().map(|i| i.mask_path.clone()).collect(),
            depth_path: items.iter().map(|i| i.depth_path.clone()).collect(),
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::labels::LabelName;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn item(label: LabelName, value: f32, with_mask: bool, boxes: Option<Vec<[f32; 4]>>) -> AnomalyItem {
        AnomalyItem {
            image_path:  format!("{value}.png"),
            label,
            image:       vec![value; 3 * 2 * 2],
            height:      2,
            width:       2,
            mask:        with_mask.then(|| vec![value; 4]),
            mask_path:   None,
            depth_image: None,
            depth_path:  None,
            boxes,
        }
    }

    #[test]
    fn test_batch_shapes() {
        let batcher = AnomalyBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            item(LabelName::Normal, 0.0, true, Some(vec![])),
            item(LabelName::Abnormal, 1.0, true, Some(vec![[0.0, 0.0, 1.0, 1.0]])),
        ]);

        assert_eq!(batch.image.dims(), [2, 3, 2, 2]);
        assert_eq!(batch.label.dims(), [2]);
        assert_eq!(batch.mask.as_ref().map(|m| m.dims()), Some([2, 2, 2]));
        assert!(batch.depth_image.is_none());
        assert_eq!(batch.batch_size(), 2);

        let boxes = batch.boxes.unwrap();
        assert!(boxes[0].is_empty());
        assert_eq!(boxes[1], vec![[0.0, 0.0, 1.0, 1.0]]);

        let labels = batch.label.into_data().to_vec::<i64>().unwrap();
        assert_eq!(labels, vec![0, 1]);

        let pixels = batch.image.into_data().to_vec::<f32>().unwrap();
        assert_eq!(pixels[..12], [0.0; 12]);
        assert_eq!(pixels[12..], [1.0; 12]);
    }

    #[test]
    fn test_mask_dropped_when_any_item_lacks_it() {
        let batcher = AnomalyBatcher::<TestBackend>::new(Default::default());
        let batch = batcher.batch(vec![
            item(LabelName::Normal, 0.0, true, None),
            item(LabelName::Normal, 0.5, false, None),
        ]);
        assert!(batch.mask.is_none());
        assert!(batch.boxes.is_none());
    }
}
