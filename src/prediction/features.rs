use std::collections::HashMap;
use std::path::Path;

use super::PredictionError;
use crate::models::{FieldKind, FieldValue, PatientAttributes, PatientField};

/// Patient attributes in the order the model was trained on.
pub const FEATURE_ORDER: [PatientField; 21] = [
    PatientField::Age,
    PatientField::Sex,
    PatientField::YearOfDiagnosis,
    PatientField::RaceRecode,
    PatientField::Treatment,
    PatientField::YearOfFollowUp,
    PatientField::Breast,
    PatientField::Endocrine,
    PatientField::EyeAndAdnexa,
    PatientField::Gastrointestinal,
    PatientField::Gynecological,
    PatientField::HeadAndNeck,
    PatientField::Hematopoietic,
    PatientField::MaleGenital,
    PatientField::Musculoskeletal,
    PatientField::NervousSystem,
    PatientField::Respiratory,
    PatientField::Skin,
    PatientField::Unspecified,
    PatientField::Urinary,
    PatientField::CodStroke,
];

/// Fixed-order snapshot of the attributes a prediction engine consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<(PatientField, FieldValue)>,
}

impl FeatureVector {
    pub fn from_attributes(attrs: &PatientAttributes) -> Self {
        let values = FEATURE_ORDER
            .iter()
            .map(|field| (*field, attrs.get(*field)))
            .collect();
        Self { values }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(PatientField, FieldValue)> {
        self.values.iter()
    }

    pub fn get(&self, field: PatientField) -> Option<&FieldValue> {
        self.values
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Numeric encoding of a `FeatureVector` for tensor-based models.
///
/// Text features are ordinal-coded by their position in a per-feature
/// category list. Nulls and unseen categories become NaN, which tree
/// ensembles route down their missing-value branch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureEncoding {
    categories: HashMap<PatientField, Vec<String>>,
}

impl FeatureEncoding {
    /// Read category lists from `path`, e.g. `{"sex": ["Female", "Male"]}`.
    /// A missing file yields an encoding with no categories.
    pub fn load(path: &Path) -> Result<Self, PredictionError> {
        if !path.exists() {
            tracing::warn!(path = %path.display(), "No category file, text features encode as missing");
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PredictionError::ModelLoad(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, PredictionError> {
        let lists: HashMap<String, Vec<String>> = serde_json::from_str(raw)
            .map_err(|e| PredictionError::ModelLoad(format!("Invalid category file: {e}")))?;

        let mut categories = HashMap::with_capacity(lists.len());
        for (name, values) in lists {
            let field = FEATURE_ORDER
                .iter()
                .copied()
                .find(|f| f.column() == name)
                .ok_or_else(|| PredictionError::ModelLoad(format!("Unknown feature: {name}")))?;
            if field.kind() != FieldKind::Text {
                return Err(PredictionError::ModelLoad(format!(
                    "Feature {name} is numeric and takes no categories"
                )));
            }
            categories.insert(field, values);
        }
        Ok(Self { categories })
    }

    /// One `f32` per feature, in `FEATURE_ORDER`.
    pub fn encode(&self, features: &FeatureVector) -> Vec<f32> {
        features
            .iter()
            .map(|(field, value)| match value {
                FieldValue::Integer(n) => n.map_or(f32::NAN, |n| n as f32),
                FieldValue::Flag(b) => b.map_or(f32::NAN, |b| if b { 1.0 } else { 0.0 }),
                FieldValue::Text(text) => text
                    .as_deref()
                    .and_then(|t| {
                        self.categories
                            .get(field)
                            .and_then(|list| list.iter().position(|c| c == t))
                    })
                    .map_or(f32::NAN, |idx| idx as f32),
            })
            .collect()
    }
}
