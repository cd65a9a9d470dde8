use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_date, parse_datetime, parse_time, parse_uuid, TIME_FORMAT};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const SUBMISSION_COLUMNS: &str = "id, audit_date, audit_time, shift, submitted_by, notes, status,
     reviewed_by, review_notes, reviewed_at, created_at";

/// Persist a new submission in `pending_review` with its ordered entries.
pub fn insert_audit_submission(
    conn: &Connection,
    input: &NewAuditSubmission,
    entries: &[AuditCountEntry],
    created_at: &NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_submissions (audit_date, audit_time, shift, submitted_by, notes,
         status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            input.audit_date.to_string(),
            input.audit_time.format(TIME_FORMAT).to_string(),
            input.shift.as_str(),
            input.submitted_by.to_string(),
            input.notes,
            AuditStatus::PendingReview.as_str(),
            format_datetime(created_at),
        ],
    )?;
    let audit_id = conn.last_insert_rowid();

    let mut stmt = conn.prepare(
        "INSERT INTO audit_entries (audit_id, position, medication_id, resident_id,
         previous_count, current_count, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    )?;
    for (position, entry) in entries.iter().enumerate() {
        stmt.execute(params![
            audit_id,
            position as i64,
            entry.medication_id.to_string(),
            entry.resident_id.to_string(),
            entry.previous_count,
            entry.current_count,
            entry.notes,
        ])?;
    }

    Ok(audit_id)
}

pub fn get_audit_submission(
    conn: &Connection,
    id: i64,
) -> Result<Option<AuditSubmission>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {SUBMISSION_COLUMNS} FROM audit_submissions WHERE id = ?1"),
            params![id],
            submission_row_from_rusqlite,
        )
        .optional()?;

    match row {
        Some(row) => Ok(Some(submission_from_row(conn, row)?)),
        None => Ok(None),
    }
}

/// Move a submission out of `pending_review`.
///
/// Single conditional UPDATE: returns `false` when the row was not pending
/// (already decided, or unknown), in which case nothing was written.
pub fn mark_audit_decided(
    conn: &Connection,
    id: i64,
    outcome: &AuditStatus,
    reviewed_by: &Uuid,
    review_notes: Option<&str>,
    reviewed_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE audit_submissions
         SET status = ?1, reviewed_by = ?2, review_notes = ?3, reviewed_at = ?4
         WHERE id = ?5 AND status = 'pending_review'",
        params![
            outcome.as_str(),
            reviewed_by.to_string(),
            review_notes,
            format_datetime(reviewed_at),
            id,
        ],
    )?;
    Ok(updated == 1)
}

/// All submissions awaiting review, oldest first.
pub fn list_pending_audits(conn: &Connection) -> Result<Vec<AuditSubmission>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SUBMISSION_COLUMNS} FROM audit_submissions
         WHERE status = 'pending_review'
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt
        .query_map([], submission_row_from_rusqlite)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| submission_from_row(conn, row))
        .collect()
}

/// Decided submissions matching the structured part of `filter`, newest audit first.
pub fn list_decided_audits(
    conn: &Connection,
    filter: &AuditArchiveFilter,
) -> Result<Vec<AuditSubmission>, DatabaseError> {
    let mut sql = format!(
        "SELECT {SUBMISSION_COLUMNS} FROM audit_submissions WHERE status != 'pending_review'"
    );
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1;

    if let Some(from) = &filter.date_from {
        sql.push_str(&format!(" AND audit_date >= ?{param_idx}"));
        params_vec.push(Box::new(from.to_string()));
        param_idx += 1;
    }

    if let Some(to) = &filter.date_to {
        sql.push_str(&format!(" AND audit_date <= ?{param_idx}"));
        params_vec.push(Box::new(to.to_string()));
        param_idx += 1;
    }

    if let Some(shift) = &filter.shift {
        sql.push_str(&format!(" AND shift = ?{param_idx}"));
        params_vec.push(Box::new(shift.as_str()));
        param_idx += 1;
    }

    if let Some(status) = &filter.status {
        sql.push_str(&format!(" AND status = ?{param_idx}"));
        params_vec.push(Box::new(status.as_str()));
    }

    sql.push_str(" ORDER BY audit_date DESC, audit_time DESC, id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(param_refs.as_slice(), submission_row_from_rusqlite)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|row| submission_from_row(conn, row))
        .collect()
}

fn get_audit_entries(conn: &Connection, audit_id: i64) -> Result<Vec<AuditCountEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT medication_id, resident_id, previous_count, current_count, notes
         FROM audit_entries WHERE audit_id = ?1 ORDER BY position",
    )?;

    let rows = stmt.query_map(params![audit_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
            row.get::<_, i64>(3)?,
            row.get::<_, Option<String>>(4)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (medication_id, resident_id, previous_count, current_count, notes) = row?;
        entries.push(AuditCountEntry::new(
            parse_uuid(&medication_id)?,
            parse_uuid(&resident_id)?,
            previous_count,
            current_count,
            notes,
        ));
    }
    Ok(entries)
}

// Internal row type for AuditSubmission mapping
struct SubmissionRow {
    id: i64,
    audit_date: String,
    audit_time: String,
    shift: String,
    submitted_by: String,
    notes: Option<String>,
    status: String,
    reviewed_by: Option<String>,
    review_notes: Option<String>,
    reviewed_at: Option<String>,
    created_at: String,
}

fn submission_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<SubmissionRow, rusqlite::Error> {
    Ok(SubmissionRow {
        id: row.get(0)?,
        audit_date: row.get(1)?,
        audit_time: row.get(2)?,
        shift: row.get(3)?,
        submitted_by: row.get(4)?,
        notes: row.get(5)?,
        status: row.get(6)?,
        reviewed_by: row.get(7)?,
        review_notes: row.get(8)?,
        reviewed_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

fn submission_from_row(conn: &Connection, row: SubmissionRow) -> Result<AuditSubmission, DatabaseError> {
    Ok(AuditSubmission {
        id: row.id,
        audit_date: parse_date(&row.audit_date)?,
        audit_time: parse_time(&row.audit_time)?,
        shift: Shift::from_str(&row.shift)?,
        submitted_by: parse_uuid(&row.submitted_by)?,
        notes: row.notes,
        status: AuditStatus::from_str(&row.status)?,
        reviewed_by: row.reviewed_by.as_deref().map(parse_uuid).transpose()?,
        review_notes: row.review_notes,
        reviewed_at: row.reviewed_at.as_deref().map(parse_datetime).transpose()?,
        created_at: parse_datetime(&row.created_at)?,
        entries: get_audit_entries(conn, row.id)?,
    })
}
