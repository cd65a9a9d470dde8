use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const MEDICATION_COLUMNS: &str = "id, resident_id, name, dosage, frequency, current_count, status,
     prescribing_physician, special_instructions, created_at";

pub fn insert_medication(conn: &Connection, med: &Medication) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO medications (id, resident_id, name, dosage, frequency, current_count, status,
         prescribing_physician, special_instructions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            med.id.to_string(),
            med.resident_id.to_string(),
            med.name,
            med.dosage,
            med.frequency,
            med.current_count,
            med.status.as_str(),
            med.prescribing_physician,
            med.special_instructions,
            format_datetime(&med.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_medication(conn: &Connection, id: &Uuid) -> Result<Option<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {MEDICATION_COLUMNS} FROM medications WHERE id = ?1"
    ))?;

    let row = stmt
        .query_row(params![id.to_string()], medication_row_from_rusqlite)
        .optional()?;

    row.map(medication_from_row).transpose()
}

/// Medications for one resident (or all residents), ordered by name.
pub fn list_medications(
    conn: &Connection,
    resident_id: Option<&Uuid>,
    include_discontinued: bool,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut sql = format!("SELECT {MEDICATION_COLUMNS} FROM medications WHERE 1=1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(resident_id) = resident_id {
        sql.push_str(" AND resident_id = ?1");
        params_vec.push(Box::new(resident_id.to_string()));
    }
    if !include_discontinued {
        sql.push_str(" AND status = 'active'");
    }
    sql.push_str(" ORDER BY LOWER(name), created_at");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(param_refs.as_slice(), medication_row_from_rusqlite)?;

    let mut meds = Vec::new();
    for row in rows {
        meds.push(medication_from_row(row?)?);
    }
    Ok(meds)
}

/// Read only the running count. `None` if the medication is unknown.
pub fn get_medication_count(conn: &Connection, id: &Uuid) -> Result<Option<i64>, DatabaseError> {
    let count = conn
        .query_row(
            "SELECT current_count FROM medications WHERE id = ?1",
            params![id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    Ok(count)
}

/// Add `delta` to the running count and return the new value.
pub fn update_medication_count(
    conn: &Connection,
    id: &Uuid,
    delta: i64,
) -> Result<i64, DatabaseError> {
    let new_count = conn
        .query_row(
            "UPDATE medications SET current_count = current_count + ?1 WHERE id = ?2
             RETURNING current_count",
            params![delta, id.to_string()],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;

    new_count.ok_or_else(|| DatabaseError::NotFound {
        entity_type: "Medication".into(),
        id: id.to_string(),
    })
}

pub fn update_medication_status(
    conn: &Connection,
    id: &Uuid,
    status: &MedicationStatus,
) -> Result<(), DatabaseError> {
    let updated = conn.execute(
        "UPDATE medications SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id.to_string()],
    )?;
    if updated == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "Medication".into(),
            id: id.to_string(),
        });
    }
    Ok(())
}

// Internal row type for Medication mapping
struct MedicationRow {
    id: String,
    resident_id: String,
    name: String,
    dosage: String,
    frequency: String,
    current_count: i64,
    status: String,
    prescribing_physician: Option<String>,
    special_instructions: Option<String>,
    created_at: String,
}

fn medication_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<MedicationRow, rusqlite::Error> {
    Ok(MedicationRow {
        id: row.get(0)?,
        resident_id: row.get(1)?,
        name: row.get(2)?,
        dosage: row.get(3)?,
        frequency: row.get(4)?,
        current_count: row.get(5)?,
        status: row.get(6)?,
        prescribing_physician: row.get(7)?,
        special_instructions: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn medication_from_row(row: MedicationRow) -> Result<Medication, DatabaseError> {
    Ok(Medication {
        id: parse_uuid(&row.id)?,
        resident_id: parse_uuid(&row.resident_id)?,
        name: row.name,
        dosage: row.dosage,
        frequency: row.frequency,
        current_count: row.current_count,
        status: MedicationStatus::from_str(&row.status)?,
        prescribing_physician: row.prescribing_physician,
        special_instructions: row.special_instructions,
        created_at: parse_datetime(&row.created_at)?,
    })
}
