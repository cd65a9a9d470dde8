//! Shift count audits: submission, review and the reviewer queue.

pub mod engine;
pub mod gate;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashSet;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db;
use crate::directory::ProgramDirectory;
use crate::error::CustodyError;
use crate::models::AuditSubmission;

pub use engine::submit_audit;
pub use gate::decide;

/// Which residents' audits a reviewer queue covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "program_id", rename_all = "snake_case")]
pub enum ProgramScope {
    All,
    Program(Uuid),
}

impl ProgramScope {
    pub fn from_program(program_id: Option<Uuid>) -> Self {
        program_id.map_or(Self::All, Self::Program)
    }
}

/// Submission plus the derived discrepancy summary.
#[derive(Debug, Clone, Serialize)]
pub struct AuditView {
    #[serde(flatten)]
    pub submission: AuditSubmission,
    pub has_discrepancies: bool,
    pub total_variance: i64,
}

impl From<AuditSubmission> for AuditView {
    fn from(submission: AuditSubmission) -> Self {
        Self {
            has_discrepancies: submission.has_discrepancies(),
            total_variance: submission.total_variance(),
            submission,
        }
    }
}

pub fn get_audit(conn: &Connection, audit_id: i64) -> Result<AuditView, CustodyError> {
    db::get_audit_submission(conn, audit_id)?
        .map(AuditView::from)
        .ok_or_else(|| CustodyError::not_found("Audit", audit_id))
}

/// Pending submissions, oldest first. A program scope keeps audits with at
/// least one entry for a resident assigned to that program.
pub fn list_pending_audits(
    conn: &Connection,
    programs: &dyn ProgramDirectory,
    scope: ProgramScope,
) -> Result<Vec<AuditView>, CustodyError> {
    let pending = db::list_pending_audits(conn)?;

    let audits = match scope {
        ProgramScope::All => pending,
        ProgramScope::Program(program_id) => {
            let residents: HashSet<Uuid> =
                programs.program_residents(&program_id)?.into_iter().collect();
            pending
                .into_iter()
                .filter(|a| a.entries.iter().any(|e| residents.contains(&e.resident_id)))
                .collect()
        }
    };

    Ok(audits.into_iter().map(AuditView::from).collect())
}
