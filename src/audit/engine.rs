//! Audit Engine: turns a shift's physical counts into a pending submission.
//!
//! Counting is not reconciling. Nothing here touches `current_count`; the
//! engine only checks that every baseline still matches the live store.

use std::collections::HashSet;

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db;
use crate::directory::{require_staff, StaffDirectory};
use crate::error::CustodyError;
use crate::inventory;
use crate::models::{AuditCountEntry, AuditSubmission, NewAuditSubmission};

pub fn submit_audit(
    conn: &Connection,
    staff: &dyn StaffDirectory,
    input: &NewAuditSubmission,
    at: NaiveDateTime,
) -> Result<AuditSubmission, CustodyError> {
    if input.entries.is_empty() {
        return Err(CustodyError::EmptyAudit);
    }
    require_staff(staff, &input.submitted_by)?;

    let mut seen = HashSet::with_capacity(input.entries.len());
    let mut entries = Vec::with_capacity(input.entries.len());

    for entry in &input.entries {
        if !seen.insert(entry.medication_id) {
            return Err(CustodyError::InvalidMedication {
                medication_id: entry.medication_id,
                reason: "counted more than once in the same audit".into(),
            });
        }
        if entry.current_count < 0 {
            return Err(CustodyError::Validation(format!(
                "counted value for medication {} must not be negative",
                entry.medication_id
            )));
        }

        let medication = inventory::require_medication(conn, &entry.medication_id)?;
        if !medication.is_active() {
            return Err(CustodyError::InvalidMedication {
                medication_id: medication.id,
                reason: format!("{} is discontinued", medication.name),
            });
        }
        if medication.resident_id != entry.resident_id {
            return Err(CustodyError::InvalidMedication {
                medication_id: medication.id,
                reason: format!("{} is not prescribed to this resident", medication.name),
            });
        }
        if medication.current_count != entry.previous_count {
            tracing::warn!(
                medication_id = %medication.id,
                submitted = entry.previous_count,
                live = medication.current_count,
                "Audit baseline is stale"
            );
            return Err(CustodyError::StaleCount {
                medication_id: medication.id,
                submitted: entry.previous_count,
                live: medication.current_count,
            });
        }

        entries.push(AuditCountEntry::new(
            entry.medication_id,
            entry.resident_id,
            entry.previous_count,
            entry.current_count,
            entry.notes.clone(),
        ));
    }

    let audit_id = db::insert_audit_submission(conn, input, &entries, &at)?;
    db::get_audit_submission(conn, audit_id)?
        .ok_or_else(|| CustodyError::not_found("Audit", audit_id))
}
