//! Prediction engines: map a patient's attributes to an outcome estimate.
//!
//! Interchangeable implementations sit behind `PredictionEngine`:
//! - `OnnxModel`: exported model run in-process with ONNX Runtime
//!   (`onnx-model` feature)
//! - `LocalModel`: in-process linear model loaded from a JSON artifact
//! - `RemoteScorer`: blocking HTTP call to an external scoring service
//!
//! Engines are synchronous. Async callers run them on the blocking pool.

pub mod features;
pub mod local;
#[cfg(feature = "onnx-model")]
pub mod onnx;
pub mod remote;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::models::{PatientAttributes, PredictionOutcome};

pub use features::{FeatureEncoding, FeatureVector, FEATURE_ORDER};
pub use local::LocalModel;
#[cfg(feature = "onnx-model")]
pub use onnx::OnnxModel;
pub use remote::RemoteScorer;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Model artifact not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Invalid feature input: {0}")]
    InvalidFeature(String),

    #[error("Scoring service unreachable: {0}")]
    Upstream(String),

    #[error("Scoring service returned {status}: {body}")]
    UpstreamStatus { status: u16, body: String },

    #[error("Scoring response parsing failed: {0}")]
    ResponseParsing(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PredictionError {
    /// Failures caused by the remote scorer rather than by local state.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::Upstream(_) | Self::UpstreamStatus { .. } | Self::ResponseParsing(_)
        )
    }
}

/// Maps a fixed-order feature vector to a prediction.
pub trait PredictionEngine: Send + Sync {
    /// Short label for logs and the health endpoint.
    fn name(&self) -> &'static str;

    fn predict(&self, features: &FeatureVector) -> Result<PredictionOutcome, PredictionError>;
}

/// Load the in-process engine for `path`: an `.onnx` file runs through
/// ONNX Runtime, anything else is read as a JSON linear artifact.
pub fn load_local_engine(path: &Path) -> Result<Arc<dyn PredictionEngine>, PredictionError> {
    let is_onnx = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    if !is_onnx {
        return Ok(Arc::new(LocalModel::load(path)?));
    }

    #[cfg(feature = "onnx-model")]
    {
        Ok(Arc::new(OnnxModel::load(path)?))
    }
    #[cfg(not(feature = "onnx-model"))]
    {
        Err(PredictionError::Config(format!(
            "{} is an ONNX model; rebuild with the onnx-model feature",
            path.display()
        )))
    }
}

/// Build the feature vector for `attrs` and run `engine` on it.
pub fn predict_for(
    engine: &dyn PredictionEngine,
    attrs: &PatientAttributes,
) -> Result<PredictionOutcome, PredictionError> {
    let features = FeatureVector::from_attributes(attrs);
    let started = std::time::Instant::now();
    let result = engine.predict(&features);
    match &result {
        Ok(_) => tracing::debug!(
            engine = engine.name(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Prediction computed"
        ),
        Err(e) => tracing::warn!(engine = engine.name(), error = %e, "Prediction failed"),
    }
    result
}

/// Test engine: returns a fixed outcome (or a fixed upstream failure),
/// counts how often it was called and keeps the last vector it saw.
pub struct MockPredictionEngine {
    outcome: Option<PredictionOutcome>,
    calls: AtomicUsize,
    last: Mutex<Option<FeatureVector>>,
}

impl MockPredictionEngine {
    pub fn new(outcome: PredictionOutcome) -> Self {
        Self {
            outcome: Some(outcome),
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    /// An engine whose every call fails like an unreachable scorer.
    pub fn failing() -> Self {
        Self {
            outcome: None,
            calls: AtomicUsize::new(0),
            last: Mutex::new(None),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Features passed to the most recent `predict` call.
    pub fn last_features(&self) -> Option<FeatureVector> {
        self.last.lock().ok().and_then(|last| last.clone())
    }
}

impl PredictionEngine for MockPredictionEngine {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn predict(&self, features: &FeatureVector) -> Result<PredictionOutcome, PredictionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = Some(features.clone());
        }
        self.outcome
            .ok_or_else(|| PredictionError::UpstreamStatus {
                status: 503,
                body: "mock scorer unavailable".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_counts_calls() {
        let engine = MockPredictionEngine::new(PredictionOutcome::Rate { rate: 0.2 });
        let attrs = PatientAttributes::default();
        assert_eq!(predict_for(&engine, &attrs).unwrap().rate(), Some(0.2));
        assert_eq!(predict_for(&engine, &attrs).unwrap().rate(), Some(0.2));
        assert_eq!(engine.calls(), 2);
    }

    #[test]
    fn mock_keeps_last_features() {
        let engine = MockPredictionEngine::new(PredictionOutcome::Rate { rate: 0.2 });
        assert!(engine.last_features().is_none());
        let attrs = PatientAttributes {
            name: "Cy".into(),
            age: Some(70),
            ..Default::default()
        };
        predict_for(&engine, &attrs).unwrap();
        let last = engine.last_features().unwrap();
        assert_eq!(
            last.get(crate::models::PatientField::Age),
            Some(&crate::models::FieldValue::Integer(Some(70)))
        );
    }

    #[test]
    fn json_artifact_loads_as_linear_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"intercept": 0.0}"#).unwrap();
        assert_eq!(load_local_engine(&path).unwrap().name(), "local");
    }

    #[cfg(not(feature = "onnx-model"))]
    #[test]
    fn onnx_path_without_feature_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.ONNX");
        std::fs::write(&path, b"onnx").unwrap();
        let err = load_local_engine(&path).err().unwrap();
        assert!(matches!(err, PredictionError::Config(ref m) if m.contains("onnx-model")));
    }

    #[cfg(feature = "onnx-model")]
    #[test]
    fn onnx_path_selects_onnx_engine() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_local_engine(&dir.path().join("model.onnx")).err().unwrap();
        assert!(matches!(err, PredictionError::ModelNotFound(_)));
    }

    #[test]
    fn failing_mock_is_upstream() {
        let engine = MockPredictionEngine::failing();
        let err = predict_for(&engine, &PatientAttributes::default()).unwrap_err();
        assert!(err.is_upstream());
    }

    #[test]
    fn config_errors_are_not_upstream() {
        assert!(!PredictionError::Config("missing key".into()).is_upstream());
        assert!(!PredictionError::ModelLoad("bad".into()).is_upstream());
    }
}
