//! Allow-listed merge of a JSON request body onto patient attributes.
//!
//! Only keys that name a patient column are accepted. Each value is checked
//! against the column's kind before anything is assigned; `null` clears the
//! column, an absent key leaves it untouched.

use serde_json::{Map, Value};
use thiserror::Error;

use super::patient::{FieldKind, FieldValue, PatientAttributes, PatientField};

#[derive(Error, Debug, PartialEq)]
pub enum PatchError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Field {field} must be {expected}")]
    InvalidType { field: String, expected: &'static str },

    #[error("Field name is required and cannot be empty")]
    NameRequired,

    #[error("Field id cannot be set")]
    IdNotWritable,
}

/// Sparse set of attribute changes, in JSON key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatientPatch {
    changes: Vec<(PatientField, FieldValue)>,
}

impl PatientPatch {
    /// Validate a raw JSON body into a patch.
    ///
    /// `allow_id` lets a serialized patient (which carries its `id`) be fed
    /// back into create; the id is ignored rather than written.
    pub fn from_json(body: &Value, allow_id: bool) -> Result<Self, PatchError> {
        let object = body.as_object().ok_or(PatchError::NotAnObject)?;
        Self::from_map(object, allow_id)
    }

    fn from_map(object: &Map<String, Value>, allow_id: bool) -> Result<Self, PatchError> {
        let mut changes = Vec::with_capacity(object.len());
        for (key, raw) in object {
            if key == "id" {
                if allow_id {
                    continue;
                }
                return Err(PatchError::IdNotWritable);
            }
            let field: PatientField = key
                .parse()
                .map_err(PatchError::UnknownField)?;
            let value = coerce(field, raw)?;
            if field == PatientField::Name {
                match &value {
                    FieldValue::Text(Some(name)) if !name.trim().is_empty() => {}
                    _ => return Err(PatchError::NameRequired),
                }
            }
            changes.push((field, value));
        }
        Ok(Self { changes })
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn fields(&self) -> impl Iterator<Item = PatientField> + '_ {
        self.changes.iter().map(|(field, _)| *field)
    }

    /// New name carried by this patch, if any.
    pub fn name(&self) -> Option<&str> {
        self.changes.iter().find_map(|(field, value)| match (field, value) {
            (PatientField::Name, FieldValue::Text(Some(name))) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Apply every change to `attrs`. Values were type-checked on parse.
    pub fn apply(&self, attrs: &mut PatientAttributes) -> Result<(), PatchError> {
        for (field, value) in &self.changes {
            if !attrs.set(*field, value.clone()) {
                return Err(PatchError::InvalidType {
                    field: field.column().to_string(),
                    expected: expected_label(field.kind()),
                });
            }
        }
        Ok(())
    }

    /// Build the attributes for a new patient. `name` must be present.
    pub fn into_new_patient(self) -> Result<PatientAttributes, PatchError> {
        if self.name().is_none() {
            return Err(PatchError::NameRequired);
        }
        let mut attrs = PatientAttributes::default();
        self.apply(&mut attrs)?;
        Ok(attrs)
    }
}

fn expected_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "a string or null",
        FieldKind::Integer => "an integer or null",
        FieldKind::Flag => "a boolean or null",
    }
}

fn coerce(field: PatientField, raw: &Value) -> Result<FieldValue, PatchError> {
    let kind = field.kind();
    let invalid = || PatchError::InvalidType {
        field: field.column().to_string(),
        expected: expected_label(kind),
    };
    let value = match (kind, raw) {
        (FieldKind::Text, Value::Null) => FieldValue::Text(None),
        (FieldKind::Text, Value::String(s)) => FieldValue::Text(Some(s.clone())),
        (FieldKind::Integer, Value::Null) => FieldValue::Integer(None),
        (FieldKind::Integer, Value::Number(n)) => FieldValue::Integer(Some(n.as_i64().ok_or_else(invalid)?)),
        (FieldKind::Flag, Value::Null) => FieldValue::Flag(None),
        (FieldKind::Flag, Value::Bool(b)) => FieldValue::Flag(Some(*b)),
        _ => return Err(invalid()),
    };
    Ok(value)
}
