//! In-process prediction from a preloaded model artifact.
//!
//! The artifact is a JSON linear model over the patient feature vector:
//!
//! ```json
//! {
//!   "intercept": -2.1,
//!   "link": "logistic",
//!   "weights": { "age": 0.031, "breast": 0.4, "cod_strokeYN": 1.2 },
//!   "categories": { "sex": { "Male": 0.2, "Female": -0.1 } },
//!   "defaults": { "age": 62.0 }
//! }
//! ```
//!
//! Integer and boolean features use `weights`; text features use
//! `categories`, where an unseen value contributes nothing. A null numeric
//! feature is imputed from `defaults` (zero when absent).

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::features::{FeatureVector, FEATURE_ORDER};
use super::{PredictionEngine, PredictionError};
use crate::models::{FieldKind, FieldValue, PredictionOutcome};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Link {
    Identity,
    #[default]
    Logistic,
}

impl Link {
    fn apply(self, x: f64) -> f64 {
        match self {
            Link::Identity => x,
            Link::Logistic => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// On-disk model description.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelArtifact {
    pub intercept: f64,
    #[serde(default)]
    pub link: Link,
    #[serde(default)]
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub categories: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    pub defaults: HashMap<String, f64>,
}

/// Linear model loaded once at startup and shared by all requests.
#[derive(Debug, Clone)]
pub struct LocalModel {
    artifact: ModelArtifact,
}

impl LocalModel {
    /// Load and validate a model artifact from disk.
    pub fn load(path: &Path) -> Result<Self, PredictionError> {
        if !path.exists() {
            return Err(PredictionError::ModelNotFound(path.to_path_buf()));
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PredictionError::ModelLoad(format!("{}: {e}", path.display())))?;
        let model = Self::from_json(&raw)?;
        tracing::info!(
            path = %path.display(),
            weights = model.artifact.weights.len(),
            categorical = model.artifact.categories.len(),
            "Local prediction model loaded"
        );
        Ok(model)
    }

    pub fn from_json(raw: &str) -> Result<Self, PredictionError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)
            .map_err(|e| PredictionError::ModelLoad(format!("Invalid model artifact: {e}")))?;
        Self::from_artifact(artifact)
    }

    /// Reject artifacts that reference features the vector does not carry,
    /// or that weight a feature with the wrong kind of term.
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, PredictionError> {
        let kind_of = |name: &str| {
            FEATURE_ORDER
                .iter()
                .find(|f| f.column() == name)
                .map(|f| f.kind())
        };

        for name in artifact.weights.keys().chain(artifact.defaults.keys()) {
            match kind_of(name) {
                Some(FieldKind::Integer) | Some(FieldKind::Flag) => {}
                Some(FieldKind::Text) => {
                    return Err(PredictionError::ModelLoad(format!(
                        "Feature {name} is categorical; weight it under `categories`"
                    )))
                }
                None => {
                    return Err(PredictionError::ModelLoad(format!("Unknown feature: {name}")))
                }
            }
        }
        for name in artifact.categories.keys() {
            match kind_of(name) {
                Some(FieldKind::Text) => {}
                Some(_) => {
                    return Err(PredictionError::ModelLoad(format!(
                        "Feature {name} is numeric; weight it under `weights`"
                    )))
                }
                None => {
                    return Err(PredictionError::ModelLoad(format!("Unknown feature: {name}")))
                }
            }
        }
        if !artifact.intercept.is_finite() {
            return Err(PredictionError::ModelLoad("Intercept must be finite".into()));
        }

        Ok(Self { artifact })
    }

    fn term(&self, column: &str, value: &FieldValue) -> f64 {
        let a = &self.artifact;
        match value {
            FieldValue::Text(text) => text
                .as_deref()
                .and_then(|t| a.categories.get(column).and_then(|c| c.get(t)))
                .copied()
                .unwrap_or(0.0),
            FieldValue::Integer(n) => {
                let weight = a.weights.get(column).copied().unwrap_or(0.0);
                let x = n
                    .map(|n| n as f64)
                    .or_else(|| a.defaults.get(column).copied())
                    .unwrap_or(0.0);
                weight * x
            }
            FieldValue::Flag(b) => {
                let weight = a.weights.get(column).copied().unwrap_or(0.0);
                let x = b
                    .map(|b| if b { 1.0 } else { 0.0 })
                    .or_else(|| a.defaults.get(column).copied())
                    .unwrap_or(0.0);
                weight * x
            }
        }
    }
}

impl PredictionEngine for LocalModel {
    fn name(&self) -> &'static str {
        "local"
    }

    fn predict(&self, features: &FeatureVector) -> Result<PredictionOutcome, PredictionError> {
        let score = features
            .iter()
            .fold(self.artifact.intercept, |acc, (field, value)| {
                acc + self.term(field.column(), value)
            });
        let rate = self.artifact.link.apply(score);
        if !rate.is_finite() {
            return Err(PredictionError::InvalidFeature(format!(
                "Model produced a non-finite score ({score})"
            )));
        }
        Ok(PredictionOutcome::Rate { rate })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::PatientAttributes;

    fn vector(attrs: PatientAttributes) -> FeatureVector {
        FeatureVector::from_attributes(&attrs)
    }

    fn identity_model(body: serde_json::Value) -> LocalModel {
        LocalModel::from_json(&body.to_string()).unwrap()
    }

    #[test]
    fn identity_link_sums_terms() {
        let model = identity_model(json!({
            "intercept": 1.0,
            "link": "identity",
            "weights": {"age": 0.5, "breast": 2.0},
            "categories": {"sex": {"Male": 10.0}}
        }));
        let attrs = PatientAttributes {
            name: "A".into(),
            age: Some(4),
            sex: Some("Male".into()),
            sites: crate::models::SiteFlags {
                breast: Some(true),
                ..Default::default()
            },
            ..Default::default()
        };
        let outcome = model.predict(&vector(attrs)).unwrap();
        assert_eq!(outcome, PredictionOutcome::Rate { rate: 1.0 + 2.0 + 10.0 + 2.0 });
    }

    #[test]
    fn nulls_use_defaults_and_unseen_categories_are_ignored() {
        let model = identity_model(json!({
            "intercept": 0.0,
            "link": "identity",
            "weights": {"age": 1.0},
            "categories": {"sex": {"Male": 10.0}},
            "defaults": {"age": 60.0}
        }));
        let attrs = PatientAttributes {
            name: "A".into(),
            sex: Some("Unknown".into()),
            ..Default::default()
        };
        assert_eq!(model.predict(&vector(attrs)).unwrap().rate(), Some(60.0));
    }

    #[test]
    fn logistic_link_is_default_and_bounded() {
        let model = LocalModel::from_json(r#"{"intercept": 0.0}"#).unwrap();
        let rate = model
            .predict(&vector(PatientAttributes::default()))
            .unwrap()
            .rate()
            .unwrap();
        assert!((rate - 0.5).abs() < 1e-12);
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let err = LocalModel::from_json(r#"{"intercept": 0.0, "weights": {"height": 1.0}}"#).unwrap_err();
        assert!(matches!(err, PredictionError::ModelLoad(ref m) if m.contains("height")));
    }

    #[test]
    fn categorical_feature_under_weights_is_rejected() {
        let err = LocalModel::from_json(r#"{"intercept": 0.0, "weights": {"sex": 1.0}}"#).unwrap_err();
        assert!(matches!(err, PredictionError::ModelLoad(_)));
    }

    #[test]
    fn malformed_artifact_is_rejected() {
        assert!(matches!(
            LocalModel::from_json("not json"),
            Err(PredictionError::ModelLoad(_))
        ));
        assert!(matches!(
            LocalModel::from_json(r#"{"intercept": 0.0, "bias": 1}"#),
            Err(PredictionError::ModelLoad(_))
        ));
    }

    #[test]
    fn load_missing_file_is_model_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalModel::load(&dir.path().join("model.json")).unwrap_err();
        assert!(matches!(err, PredictionError::ModelNotFound(_)));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, r#"{"intercept": 0.25, "link": "identity"}"#).unwrap();
        let model = LocalModel::load(&path).unwrap();
        assert_eq!(
            model.predict(&vector(PatientAttributes::default())).unwrap(),
            PredictionOutcome::Rate { rate: 0.25 }
        );
    }
}
