use rusqlite::types::ToSqlOutput;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, ToSql};

use super::prediction::latest_prediction_for_patient;
use crate::db::DatabaseError;
use crate::models::*;

/// Message returned to clients when a patient name is already taken.
pub const DUPLICATE_NAME: &str = "User already exists";

impl ToSql for FieldValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            FieldValue::Text(v) => v.to_sql(),
            FieldValue::Integer(v) => v.to_sql(),
            FieldValue::Flag(v) => v.to_sql(),
        }
    }
}

/// Comma-separated attribute columns in `PatientField::ALL` order.
fn attribute_columns() -> String {
    PatientField::ALL
        .iter()
        .map(|f| f.column())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decode `id` at column 0 followed by every attribute column in order.
fn patient_from_row(row: &Row<'_>) -> rusqlite::Result<Patient> {
    let mut attributes = PatientAttributes::default();
    for (idx, field) in PatientField::ALL.iter().enumerate() {
        let col = idx + 1;
        let value = match field.kind() {
            FieldKind::Text => FieldValue::Text(row.get(col)?),
            FieldKind::Integer => FieldValue::Integer(row.get(col)?),
            FieldKind::Flag => FieldValue::Flag(row.get(col)?),
        };
        attributes.set(*field, value);
    }
    Ok(Patient {
        id: row.get(0)?,
        attributes,
    })
}

fn map_write_error(err: rusqlite::Error) -> DatabaseError {
    if DatabaseError::is_unique_violation(&err) {
        DatabaseError::Conflict(DUPLICATE_NAME.to_string())
    } else {
        DatabaseError::Sqlite(err)
    }
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT id, {} FROM patients ORDER BY id",
        attribute_columns()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], patient_from_row)?;
    let mut patients = Vec::new();
    for row in rows {
        patients.push(row?);
    }
    Ok(patients)
}

/// All patients, each with the probabilities of its most recent history row.
///
/// Patients without history, or whose latest row holds a local rate, get `None`.
pub fn list_patients_with_latest(conn: &Connection) -> Result<Vec<PatientOverview>, DatabaseError> {
    let patients = list_patients(conn)?;
    let mut overviews = Vec::with_capacity(patients.len());
    for patient in patients {
        let prediction = latest_prediction_for_patient(conn, patient.id)?
            .and_then(|record| record.outcome.probabilities());
        overviews.push(PatientOverview { patient, prediction });
    }
    Ok(overviews)
}

pub fn count_patients(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    Ok(count)
}

pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    let sql = format!(
        "SELECT id, {} FROM patients WHERE id = ?1",
        attribute_columns()
    );
    let patient = conn
        .query_row(&sql, params![id], patient_from_row)
        .optional()?;
    Ok(patient)
}

/// Insert a new patient. A taken name yields `DatabaseError::Conflict`.
pub fn insert_patient(conn: &Connection, attrs: &PatientAttributes) -> Result<Patient, DatabaseError> {
    let placeholders = (1..=PatientField::ALL.len())
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO patients ({}) VALUES ({placeholders})",
        attribute_columns()
    );
    let values: Vec<FieldValue> = PatientField::ALL.iter().map(|f| attrs.get(*f)).collect();
    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(map_write_error)?;

    Ok(Patient {
        id: conn.last_insert_rowid(),
        attributes: attrs.clone(),
    })
}

/// Apply a sparse patch to an existing patient and return the stored result.
///
/// Only the columns named by the patch are written.
pub fn update_patient(
    conn: &Connection,
    id: i64,
    patch: &PatientPatch,
) -> Result<Patient, DatabaseError> {
    let mut patient = get_patient(conn, id)?.ok_or(DatabaseError::NotFound {
        entity_type: "patient",
        id,
    })?;
    if patch.is_empty() {
        return Ok(patient);
    }

    patch
        .apply(&mut patient.attributes)
        .map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))?;

    let fields: Vec<PatientField> = patch.fields().collect();
    let assignments = fields
        .iter()
        .enumerate()
        .map(|(i, f)| format!("{} = ?{}", f.column(), i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE patients SET {assignments} WHERE id = ?{}",
        fields.len() + 1
    );

    let mut values: Vec<FieldValue> = fields.iter().map(|f| patient.attributes.get(*f)).collect();
    values.push(FieldValue::Integer(Some(id)));

    conn.execute(&sql, params_from_iter(values.iter()))
        .map_err(map_write_error)?;

    Ok(patient)
}

/// Delete a patient by id. History rows are left in place.
/// Returns the number of rows removed (0 when the id is unknown).
pub fn delete_patient(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let removed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use serde_json::json;

    use super::*;
    use crate::db::open_memory_database;
    use crate::db::{insert_prediction, list_predictions_for_patient};

    fn attrs(body: serde_json::Value) -> PatientAttributes {
        PatientPatch::from_json(&body, false)
            .unwrap()
            .into_new_patient()
            .unwrap()
    }

    fn probabilities(negative: f64, positive: f64) -> PredictionOutcome {
        PredictionOutcome::Probabilities(Probabilities { negative, positive })
    }

    #[test]
    fn insert_and_get_round_trip() {
        let conn = open_memory_database().unwrap();
        let created = insert_patient(
            &conn,
            &attrs(json!({
                "name": "Alice", "sex": "Female", "age": 61, "breast": true,
                "race_recode_W_B_AI_API": "White", "cod_strokeYN": false
            })),
        )
        .unwrap();
        let fetched = get_patient(&conn, created.id).unwrap().unwrap();
        assert_eq!(fetched, created);
        assert_eq!(fetched.attributes.sites.breast, Some(true));
        assert_eq!(fetched.attributes.sites.skin, None);
        assert_eq!(fetched.attributes.cod_stroke, Some(false));
    }

    #[test]
    fn duplicate_name_is_conflict_and_not_stored() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &attrs(json!({"name": "Alice"}))).unwrap();
        let err = insert_patient(&conn, &attrs(json!({"name": "Alice", "age": 3}))).unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(ref m) if m == DUPLICATE_NAME));
        let alices: i64 = conn
            .query_row("SELECT COUNT(*) FROM patients WHERE name = 'Alice'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(alices, 1);
    }

    #[test]
    fn get_unknown_is_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_patient(&conn, 404).unwrap().is_none());
    }

    #[test]
    fn update_writes_only_patched_columns() {
        let conn = open_memory_database().unwrap();
        let created = insert_patient(
            &conn,
            &attrs(json!({"name": "Bob", "age": 50, "treatment": "Surgery", "skin": true})),
        )
        .unwrap();
        let patch = PatientPatch::from_json(&json!({"age": 55}), false).unwrap();
        let updated = update_patient(&conn, created.id, &patch).unwrap();
        assert_eq!(updated.attributes.age, Some(55));

        let stored = get_patient(&conn, created.id).unwrap().unwrap();
        assert_eq!(stored, updated);
        assert_eq!(stored.attributes.treatment.as_deref(), Some("Surgery"));
        assert_eq!(stored.attributes.sites.skin, Some(true));
    }

    #[test]
    fn update_unknown_is_not_found() {
        let conn = open_memory_database().unwrap();
        let patch = PatientPatch::from_json(&json!({"age": 1}), false).unwrap();
        let err = update_patient(&conn, 77, &patch).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { id: 77, .. }));
    }

    #[test]
    fn rename_onto_taken_name_is_conflict() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &attrs(json!({"name": "Alice"}))).unwrap();
        let bob = insert_patient(&conn, &attrs(json!({"name": "Bob"}))).unwrap();
        let patch = PatientPatch::from_json(&json!({"name": "Alice"}), false).unwrap();
        let err = update_patient(&conn, bob.id, &patch).unwrap_err();
        assert!(matches!(err, DatabaseError::Conflict(_)));
        assert_eq!(get_patient(&conn, bob.id).unwrap().unwrap().attributes.name, "Bob");
    }

    #[test]
    fn delete_keeps_history_rows() {
        let conn = open_memory_database().unwrap();
        let alice = insert_patient(&conn, &attrs(json!({"name": "Alice"}))).unwrap();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        insert_prediction(&conn, alice.id, &PredictionOutcome::Rate { rate: 0.3 }, today).unwrap();

        assert_eq!(delete_patient(&conn, alice.id).unwrap(), 1);
        assert!(get_patient(&conn, alice.id).unwrap().is_none());
        assert_eq!(list_predictions_for_patient(&conn, alice.id).unwrap().len(), 1);
    }

    #[test]
    fn delete_unknown_is_noop() {
        let conn = open_memory_database().unwrap();
        assert_eq!(delete_patient(&conn, 5).unwrap(), 0);
    }

    #[test]
    fn count_matches_list() {
        let conn = open_memory_database().unwrap();
        for name in ["A", "B", "C"] {
            insert_patient(&conn, &attrs(json!({ "name": name }))).unwrap();
        }
        assert_eq!(count_patients(&conn).unwrap(), 3);
        assert_eq!(list_patients(&conn).unwrap().len(), 3);
        assert_eq!(list_patients_with_latest(&conn).unwrap().len(), 3);
    }

    #[test]
    fn overview_uses_latest_entry_date() {
        let conn = open_memory_database().unwrap();
        let alice = insert_patient(&conn, &attrs(json!({"name": "Alice"}))).unwrap();
        let bob = insert_patient(&conn, &attrs(json!({"name": "Bob"}))).unwrap();

        let later = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();
        let earlier = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        // Inserted newest first so id order disagrees with date order.
        insert_prediction(&conn, alice.id, &probabilities(0.2, 0.8), later).unwrap();
        insert_prediction(&conn, alice.id, &probabilities(0.9, 0.1), earlier).unwrap();

        let overviews = list_patients_with_latest(&conn).unwrap();
        let alice_view = overviews.iter().find(|o| o.patient.id == alice.id).unwrap();
        assert_eq!(
            alice_view.prediction,
            Some(Probabilities { negative: 0.2, positive: 0.8 })
        );
        let bob_view = overviews.iter().find(|o| o.patient.id == bob.id).unwrap();
        assert_eq!(bob_view.prediction, None);
    }
}
