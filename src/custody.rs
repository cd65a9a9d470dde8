//! Hash-linked custody history.
//!
//! Each committed count change appends one event whose hash covers the
//! previous event's hash, so any edit or deletion in the middle of a
//! medication's history is detectable.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::repository::format_datetime;
use crate::db::{self, DatabaseError};
use crate::error::CustodyError;
use crate::models::enums::CustodyCause;
use crate::models::CustodyRecord;

/// Link target of the first event in every medication's chain.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// SHA-256 over the pipe-joined event fields, lowercase hex.
pub fn custody_hash(
    prev_hash: &str,
    medication_id: &Uuid,
    cause: CustodyCause,
    cause_ref: &str,
    delta: i64,
    resulting_count: i64,
    recorded_at: &NaiveDateTime,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{prev_hash}|{medication_id}|{}|{cause_ref}|{delta}|{resulting_count}|{}",
            cause.as_str(),
            format_datetime(recorded_at),
        )
        .as_bytes(),
    );
    format!("{:x}", hasher.finalize())
}

fn record_hash(record: &CustodyRecord) -> String {
    custody_hash(
        &record.prev_hash,
        &record.medication_id,
        record.cause,
        &record.cause_ref,
        record.delta,
        record.resulting_count,
        &record.recorded_at,
    )
}

/// Append the next link for `medication_id`. Must run inside the transaction
/// that applied the count change.
pub fn append_custody_record(
    conn: &Connection,
    medication_id: &Uuid,
    cause: CustodyCause,
    cause_ref: &str,
    delta: i64,
    resulting_count: i64,
    recorded_at: NaiveDateTime,
) -> Result<CustodyRecord, DatabaseError> {
    let prev_hash =
        db::last_custody_hash(conn, medication_id)?.unwrap_or_else(|| GENESIS_HASH.to_string());

    let mut record = CustodyRecord {
        id: 0,
        medication_id: *medication_id,
        cause,
        cause_ref: cause_ref.to_string(),
        delta,
        resulting_count,
        recorded_at,
        prev_hash,
        hash: String::new(),
    };
    record.hash = record_hash(&record);
    record.id = db::insert_custody_record(conn, &record)?;
    Ok(record)
}

/// Outcome of re-walking a medication's custody chain.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustodyVerification {
    pub medication_id: Uuid,
    pub event_count: usize,
    pub live_count: i64,
    pub chain_total: i64,
    pub intact: bool,
    /// First event that fails linkage, hashing or running-sum checks.
    pub first_broken_event: Option<i64>,
    pub problem: Option<String>,
}

pub fn get_custody_history(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<Vec<CustodyRecord>, CustodyError> {
    if db::get_medication_count(conn, medication_id)?.is_none() {
        return Err(CustodyError::not_found("Medication", medication_id));
    }
    Ok(db::list_custody_records(conn, medication_id)?)
}

/// Recompute the chain and compare its total with the live count.
pub fn verify_custody_chain(
    conn: &Connection,
    medication_id: &Uuid,
) -> Result<CustodyVerification, CustodyError> {
    let live_count = db::get_medication_count(conn, medication_id)?
        .ok_or_else(|| CustodyError::not_found("Medication", medication_id))?;
    let records = db::list_custody_records(conn, medication_id)?;

    let mut verification = CustodyVerification {
        medication_id: *medication_id,
        event_count: records.len(),
        live_count,
        chain_total: 0,
        intact: true,
        first_broken_event: None,
        problem: None,
    };

    let mut expected_prev = GENESIS_HASH.to_string();
    let mut running = 0i64;
    for record in &records {
        running += record.delta;

        let problem = if record.prev_hash != expected_prev {
            Some("link does not match previous event")
        } else if record_hash(record) != record.hash {
            Some("hash does not match event contents")
        } else if record.resulting_count != running {
            Some("resulting count does not match running total")
        } else {
            None
        };

        if let Some(problem) = problem {
            if verification.intact {
                verification.intact = false;
                verification.first_broken_event = Some(record.id);
                verification.problem = Some(problem.to_string());
            }
        }
        expected_prev = record.hash.clone();
    }
    verification.chain_total = running;

    if verification.intact && running != live_count {
        verification.intact = false;
        verification.problem = Some(format!(
            "chain total {running} differs from live count {live_count}"
        ));
    }

    if !verification.intact {
        tracing::warn!(
            medication_id = %medication_id,
            first_broken_event = ?verification.first_broken_event,
            problem = ?verification.problem,
            "Custody chain verification failed"
        );
    }

    Ok(verification)
}
