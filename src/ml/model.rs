// ============================================================
// Layer 5: Model Contract
// ============================================================
// Architectures live outside this crate. All the inference
// pipeline needs from a model is one forward pass:
//
//   images [N, 3, H, W] ──forward──▶ anomaly_map [N, 1, H, W]
//                                    pred_score  [N]  (optional)
//
// Models that only produce a map leave pred_score empty and the
// inferencer falls back to the map maximum.

use burn::prelude::*;

/// Raw, un-normalised model predictions for a batch.
#[derive(Debug, Clone)]
pub struct ModelOutput<B: Backend> {
    pub anomaly_map: Tensor<B, 4>,
    pub pred_score:  Option<Tensor<B, 1>>,
}

impl<B: Backend> ModelOutput<B> {
    /// Per-image scores: the model's own when it has them, otherwise
    /// the maximum of each anomaly map.
    pub fn scores(&self) -> Tensor<B, 1> {
        match &self.pred_score {
            Some(score) => score.clone(),
            None => {
                let [n, _, _, _] = self.anomaly_map.dims();
                self.anomaly_map.clone().reshape([n as i32, -1]).max_dim(1).reshape([n])
            }
        }
    }
}

/// An anomaly detection model on any burn backend.
pub trait AnomalyModel<B: Backend>: Module<B> {
    fn forward(&self, images: Tensor<B, 4>) -> ModelOutput<B>;
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::{backend::NdArray, tensor::TensorData};

    type B = NdArray;

    #[test]
    fn test_scores_fall_back_to_map_max() {
        let device = Default::default();
        let map = Tensor::<B, 4>::from_data(
            TensorData::new(vec![0.1f32, 0.9, 0.3, 0.2, 0.4, 0.7, 0.0, 0.5], [2, 1, 2, 2]),
            &device,
        );
        let out = ModelOutput { anomaly_map: map, pred_score: None };
        let scores = out.scores().into_data().to_vec::<f32>().unwrap();
        assert_eq!(scores, vec![0.9, 0.7]);
    }

    #[test]
    fn test_scores_prefer_model_score() {
        let device = Default::default();
        let out = ModelOutput {
            anomaly_map: Tensor::<B, 4>::zeros([1, 1, 2, 2], &device),
            pred_score:  Some(Tensor::<B, 1>::from_data(TensorData::new(vec![3.5f32], [1]), &device)),
        };
        assert_eq!(out.scores().into_data().to_vec::<f32>().unwrap(), vec![3.5]);
    }
}
