use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

/// Append a custody record. `record.id` is ignored and the assigned id returned.
pub fn insert_custody_record(conn: &Connection, record: &CustodyRecord) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO custody_events (medication_id, cause, cause_ref, delta, resulting_count,
         recorded_at, prev_hash, hash)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            record.medication_id.to_string(),
            record.cause.as_str(),
            record.cause_ref,
            record.delta,
            record.resulting_count,
            format_datetime(&record.recorded_at),
            record.prev_hash,
            record.hash,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Hash of the most recent record for a medication, if any.
pub fn last_custody_hash(conn: &Connection, medication_id: &Uuid) -> Result<Option<String>, DatabaseError> {
    let hash = conn
        .query_row(
            "SELECT hash FROM custody_events WHERE medication_id = ?1 ORDER BY id DESC LIMIT 1",
            params![medication_id.to_string()],
            |row| row.get::<_, String>(0),
        )
        .optional()?;
    Ok(hash)
}

/// Full history for a medication in commit order.
pub fn list_custody_records(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<CustodyRecord>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, medication_id, cause, cause_ref, delta, resulting_count, recorded_at,
                prev_hash, hash
         FROM custody_events WHERE medication_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![medication_id.to_string()], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, i64>(4)?,
            row.get::<_, i64>(5)?,
            row.get::<_, String>(6)?,
            row.get::<_, String>(7)?,
            row.get::<_, String>(8)?,
        ))
    })?;

    let mut records = Vec::new();
    for row in rows {
        let (id, med_id, cause, cause_ref, delta, resulting_count, recorded_at, prev_hash, hash) = row?;
        records.push(CustodyRecord {
            id,
            medication_id: parse_uuid(&med_id)?,
            cause: CustodyCause::from_str(&cause)?,
            cause_ref,
            delta,
            resulting_count,
            recorded_at: parse_datetime(&recorded_at)?,
            prev_hash,
            hash,
        });
    }
    Ok(records)
}
