use chrono::NaiveDate;
use serde::Serialize;

/// Class probabilities returned by the remote scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Probabilities {
    pub negative: f64,
    pub positive: f64,
}

/// Result payload of one prediction. Serializes as bare fields:
/// `{"rate": ..}` or `{"negative": .., "positive": ..}`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PredictionOutcome {
    Rate { rate: f64 },
    Probabilities(Probabilities),
}

impl PredictionOutcome {
    pub fn rate(&self) -> Option<f64> {
        match self {
            Self::Rate { rate } => Some(*rate),
            Self::Probabilities(_) => None,
        }
    }

    pub fn probabilities(&self) -> Option<Probabilities> {
        match self {
            Self::Rate { .. } => None,
            Self::Probabilities(p) => Some(*p),
        }
    }
}

/// Immutable history row: one prediction for one patient on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionRecord {
    pub id: i64,
    pub patient_id: i64,
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
    pub entry_date: NaiveDate,
}
