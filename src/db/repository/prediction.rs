use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::DatabaseError;
use crate::models::*;

const HISTORY_COLUMNS: &str = "id, patient_id, rate, negative, positive, entry_date";

type PredictionRow = (i64, i64, Option<f64>, Option<f64>, Option<f64>, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<PredictionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn record_from_row(row: PredictionRow) -> Result<PredictionRecord, DatabaseError> {
    let (id, patient_id, rate, negative, positive, entry_date) = row;
    let outcome = match (rate, negative, positive) {
        (Some(rate), _, _) => PredictionOutcome::Rate { rate },
        (None, Some(negative), Some(positive)) => {
            PredictionOutcome::Probabilities(Probabilities { negative, positive })
        }
        _ => {
            return Err(DatabaseError::ConstraintViolation(format!(
                "prediction {id} has no result payload"
            )))
        }
    };
    let entry_date = NaiveDate::parse_from_str(&entry_date, "%Y-%m-%d")
        .map_err(|e| DatabaseError::ConstraintViolation(format!("prediction {id} entry_date: {e}")))?;
    Ok(PredictionRecord {
        id,
        patient_id,
        outcome,
        entry_date,
    })
}

/// Store one prediction for a patient. The row is never updated afterwards.
pub fn insert_prediction(
    conn: &Connection,
    patient_id: i64,
    outcome: &PredictionOutcome,
    entry_date: NaiveDate,
) -> Result<PredictionRecord, DatabaseError> {
    let probabilities = outcome.probabilities();
    conn.execute(
        "INSERT INTO prediction_history (patient_id, rate, negative, positive, entry_date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            patient_id,
            outcome.rate(),
            probabilities.map(|p| p.negative),
            probabilities.map(|p| p.positive),
            entry_date.to_string(),
        ],
    )?;
    Ok(PredictionRecord {
        id: conn.last_insert_rowid(),
        patient_id,
        outcome: *outcome,
        entry_date,
    })
}

/// History for a patient, oldest entry first. Works for deleted patients too.
pub fn list_predictions_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Vec<PredictionRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {HISTORY_COLUMNS} FROM prediction_history
         WHERE patient_id = ?1 ORDER BY entry_date, id"
    ))?;
    let rows = stmt.query_map(params![patient_id], read_row)?;
    let mut records = Vec::new();
    for row in rows {
        records.push(record_from_row(row?)?);
    }
    Ok(records)
}

pub fn get_prediction(conn: &Connection, id: i64) -> Result<Option<PredictionRecord>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {HISTORY_COLUMNS} FROM prediction_history WHERE id = ?1"),
        params![id],
        read_row,
    )
    .optional()?
    .map(record_from_row)
    .transpose()
}

/// Most recent prediction for a patient by entry date, ties broken by id.
pub fn latest_prediction_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Option<PredictionRecord>, DatabaseError> {
    conn.query_row(
        &format!(
            "SELECT {HISTORY_COLUMNS} FROM prediction_history
             WHERE patient_id = ?1 ORDER BY entry_date DESC, id DESC LIMIT 1"
        ),
        params![patient_id],
        read_row,
    )
    .optional()?
    .map(record_from_row)
    .transpose()
}

/// Delete one history row. Returns rows removed (0 when the id is unknown).
pub fn delete_prediction(conn: &Connection, id: i64) -> Result<usize, DatabaseError> {
    let removed = conn.execute("DELETE FROM prediction_history WHERE id = ?1", params![id])?;
    Ok(removed)
}
