//! Approval Gate: the single transition out of `pending_review`.
//!
//! Runs inside one IMMEDIATE transaction with the locks of every audited
//! medication held. Any error drops the transaction, so either every entry's
//! delta commits together with the new status or nothing does.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db;
use crate::directory::{require_staff, ReviewPolicy, StaffDirectory};
use crate::error::CustodyError;
use crate::inventory;
use crate::models::enums::{CustodyCause, ReviewDecision};
use crate::models::{AuditSubmission, ReviewRequest};

pub fn decide(
    conn: &Connection,
    staff: &dyn StaffDirectory,
    policy: &dyn ReviewPolicy,
    request: &ReviewRequest,
    at: NaiveDateTime,
) -> Result<AuditSubmission, CustodyError> {
    let audit = db::get_audit_submission(conn, request.audit_id)?
        .ok_or_else(|| CustodyError::not_found("Audit", request.audit_id))?;

    // Terminal status wins over every caller check: a decided audit answers
    // AlreadyDecided to anyone.
    if audit.status.is_terminal() {
        return Err(CustodyError::AlreadyDecided {
            audit_id: audit.id,
            status: audit.status.as_str(),
        });
    }

    let reviewer = require_staff(staff, &request.reviewer_id)?;
    if !policy.can_review(&reviewer) {
        return Err(CustodyError::Forbidden {
            staff_id: reviewer.id,
            action: "review medication audits",
        });
    }
    if reviewer.id == audit.submitted_by {
        return Err(CustodyError::SelfReviewForbidden {
            staff_id: reviewer.id,
            audit_id: audit.id,
        });
    }

    if request.decision == ReviewDecision::Approve {
        reconcile(conn, &audit, at)?;
    }

    let outcome = request.decision.outcome();
    let transitioned = db::mark_audit_decided(
        conn,
        audit.id,
        &outcome,
        &reviewer.id,
        request.review_notes.as_deref(),
        &at,
    )?;
    if !transitioned {
        // Lost the check-and-set to another reviewer.
        let current = db::get_audit_submission(conn, audit.id)?
            .ok_or_else(|| CustodyError::not_found("Audit", audit.id))?;
        return Err(CustodyError::AlreadyDecided {
            audit_id: audit.id,
            status: current.status.as_str(),
        });
    }

    db::get_audit_submission(conn, audit.id)?
        .ok_or_else(|| CustodyError::not_found("Audit", audit.id))
}

/// Re-validate every baseline, then apply every variance.
fn reconcile(
    conn: &Connection,
    audit: &AuditSubmission,
    at: NaiveDateTime,
) -> Result<(), CustodyError> {
    for entry in &audit.entries {
        let medication = inventory::require_medication(conn, &entry.medication_id)?;
        if !medication.is_active() {
            return Err(CustodyError::InvalidMedication {
                medication_id: medication.id,
                reason: format!("{} was discontinued after the count", medication.name),
            });
        }
        if medication.current_count != entry.previous_count {
            tracing::warn!(
                audit_id = audit.id,
                medication_id = %medication.id,
                expected = entry.previous_count,
                live = medication.current_count,
                "Approval rejected: count drifted since submission"
            );
            return Err(CustodyError::ConcurrentModification {
                audit_id: audit.id,
                medication_id: medication.id,
                expected: entry.previous_count,
                live: medication.current_count,
            });
        }
    }

    let cause_ref = audit.id.to_string();
    for entry in audit.entries.iter().filter(|e| e.has_discrepancy()) {
        inventory::apply_delta(
            conn,
            &entry.medication_id,
            entry.variance,
            CustodyCause::Audit,
            &cause_ref,
            at,
        )?;
    }
    Ok(())
}
