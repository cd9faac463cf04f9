use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::features::FeatureVector;
use super::{PredictionEngine, PredictionError};
use crate::models::{FieldValue, PredictionOutcome, Probabilities};

/// Request body expected by the scoring service.
#[derive(Debug, Serialize)]
pub struct ScoringRequest {
    #[serde(rename = "Inputs")]
    pub inputs: ScoringInputs,
    #[serde(rename = "GlobalParameters")]
    pub global_parameters: GlobalParameters,
}

#[derive(Debug, Serialize)]
pub struct ScoringInputs {
    pub data: Vec<Map<String, Value>>,
}

#[derive(Debug, Serialize)]
pub struct GlobalParameters {
    pub method: &'static str,
}

/// Response body from the scoring service: one `[negative, positive]` row
/// per input record.
#[derive(Debug, Deserialize)]
pub struct ScoringResponse {
    #[serde(rename = "Results")]
    pub results: Vec<Vec<f64>>,
}

impl ScoringRequest {
    /// Build the single-record payload, keyed by the scorer's field names.
    pub fn from_features(features: &FeatureVector) -> Self {
        let mut record = Map::new();
        for (field, value) in features.iter() {
            let Some(name) = field.scorer_name() else {
                continue;
            };
            let json = match value {
                FieldValue::Text(v) => v.clone().map(Value::String).unwrap_or(Value::Null),
                FieldValue::Integer(v) => v.map(Value::from).unwrap_or(Value::Null),
                FieldValue::Flag(v) => v.map(Value::Bool).unwrap_or(Value::Null),
            };
            record.insert(name.to_string(), json);
        }
        Self {
            inputs: ScoringInputs { data: vec![record] },
            global_parameters: GlobalParameters {
                method: "predict_proba",
            },
        }
    }
}

impl ScoringResponse {
    pub fn into_probabilities(self) -> Result<Probabilities, PredictionError> {
        match self.results.first().map(Vec::as_slice) {
            Some([negative, positive, ..]) => Ok(Probabilities {
                negative: *negative,
                positive: *positive,
            }),
            _ => Err(PredictionError::ResponseParsing(
                "Results must contain a [negative, positive] pair".into(),
            )),
        }
    }
}

/// HTTP client for the external scoring endpoint.
///
/// One POST per prediction, bounded by the configured timeout. No retries.
pub struct RemoteScorer {
    url: String,
    api_key: String,
    client: reqwest::blocking::Client,
    timeout: Duration,
}

impl std::fmt::Debug for RemoteScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteScorer")
            .field("url", &self.url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RemoteScorer {
    /// An empty API key is a configuration error, caught at startup.
    pub fn new(url: &str, api_key: &str, timeout: Duration) -> Result<Self, PredictionError> {
        if api_key.trim().is_empty() {
            return Err(PredictionError::Config(
                "Scoring API key must be set for the remote variant".into(),
            ));
        }
        if url.trim().is_empty() {
            return Err(PredictionError::Config("Scoring URL must be set".into()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PredictionError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            url: url.to_string(),
            api_key: api_key.to_string(),
            client,
            timeout,
        })
    }
}

impl PredictionEngine for RemoteScorer {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn predict(&self, features: &FeatureVector) -> Result<PredictionOutcome, PredictionError> {
        let body = ScoringRequest::from_features(features);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    PredictionError::Upstream(format!(
                        "Request timed out after {}s",
                        self.timeout.as_secs()
                    ))
                } else {
                    PredictionError::Upstream(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(PredictionError::UpstreamStatus {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ScoringResponse = response
            .json()
            .map_err(|e| PredictionError::ResponseParsing(e.to_string()))?;

        Ok(PredictionOutcome::Probabilities(parsed.into_probabilities()?))
    }
}
