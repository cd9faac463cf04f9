//! In-process prediction from an exported ONNX model.
//!
//! The model takes one float input of shape `[1, 21]` in `FEATURE_ORDER`
//! and its first output holds the prediction, either a float score or an
//! integer class label. Text features are coded through a sidecar
//! `<model>.categories.json` next to the `.onnx` file.

use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;
use ort::value::TensorRef;

use super::features::{FeatureEncoding, FeatureVector, FEATURE_ORDER};
use super::{PredictionEngine, PredictionError};
use crate::models::PredictionOutcome;

/// `ort::Session::run` needs `&mut self`, the engine trait hands out `&self`.
pub struct OnnxModel {
    session: Mutex<Session>,
    encoding: FeatureEncoding,
}

impl OnnxModel {
    pub fn load(model_path: &Path) -> Result<Self, PredictionError> {
        if !model_path.exists() {
            return Err(PredictionError::ModelNotFound(model_path.to_path_buf()));
        }
        let encoding = FeatureEncoding::load(&model_path.with_extension("categories.json"))?;

        let session = Session::builder()
            .map_err(|e: ort::Error| PredictionError::ModelLoad(e.to_string()))?
            .with_intra_threads(2)
            .map_err(|e: ort::Error| PredictionError::ModelLoad(e.to_string()))?
            .commit_from_file(model_path)
            .map_err(|e: ort::Error| PredictionError::ModelLoad(format!("ONNX load failed: {e}")))?;

        tracing::info!(path = %model_path.display(), "ONNX prediction model loaded");

        Ok(Self {
            session: Mutex::new(session),
            encoding,
        })
    }

    fn infer(&self, features: &FeatureVector) -> Result<f64, PredictionError> {
        let encoded = self.encoding.encode(features);
        let input = ndarray::Array2::from_shape_vec((1, FEATURE_ORDER.len()), encoded)
            .map_err(|e| PredictionError::InvalidFeature(e.to_string()))?;
        let tensor = TensorRef::from_array_view(&input)
            .map_err(|e| PredictionError::InvalidFeature(e.to_string()))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| PredictionError::ModelLoad("Session lock poisoned".to_string()))?;

        let outputs = session
            .run(ort::inputs![tensor])
            .map_err(|e| PredictionError::InvalidFeature(format!("ONNX inference failed: {e}")))?;

        // Regressors emit floats, classifiers an int64 label first.
        let first = if let Ok((_, data)) = outputs[0].try_extract_tensor::<f32>() {
            data.first().map(|v| f64::from(*v))
        } else {
            let (_, data) = outputs[0].try_extract_tensor::<i64>().map_err(|e| {
                PredictionError::InvalidFeature(format!("Output extraction: {e}"))
            })?;
            data.first().map(|v| *v as f64)
        };
        first.ok_or_else(|| PredictionError::InvalidFeature("Model produced an empty output".into()))
    }
}

impl PredictionEngine for OnnxModel {
    fn name(&self) -> &'static str {
        "onnx"
    }

    fn predict(&self, features: &FeatureVector) -> Result<PredictionOutcome, PredictionError> {
        let rate = self.infer(features)?;
        if !rate.is_finite() {
            return Err(PredictionError::InvalidFeature(format!(
                "Model produced a non-finite score ({rate})"
            )));
        }
        Ok(PredictionOutcome::Rate { rate })
    }
}
