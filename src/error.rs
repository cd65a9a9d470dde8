//! Domain error taxonomy shared by every ledger operation.
//!
//! Every variant is terminal and caller-visible: nothing here is retried
//! inside the service. `code()` is stable for clients, `user_message()`
//! is what the acting staff member should read.

use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum CustodyError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stale count for medication {medication_id}: submitted baseline {submitted}, live count {live}")]
    StaleCount {
        medication_id: Uuid,
        submitted: i64,
        live: i64,
    },

    #[error("Medication {medication_id} changed since audit {audit_id} was submitted: baseline {expected}, live count {live}")]
    ConcurrentModification {
        audit_id: i64,
        medication_id: Uuid,
        expected: i64,
        live: i64,
    },

    #[error("Staff {staff_id} is not permitted to {action}")]
    Forbidden { staff_id: Uuid, action: &'static str },

    #[error("Staff {staff_id} submitted audit {audit_id} and cannot review it")]
    SelfReviewForbidden { staff_id: Uuid, audit_id: i64 },

    #[error("Audit contains no count entries")]
    EmptyAudit,

    #[error("Invalid medication {medication_id}: {reason}")]
    InvalidMedication { medication_id: Uuid, reason: String },

    #[error("Alert {0} is already resolved")]
    AlreadyResolved(i64),

    #[error("Audit {audit_id} was already {status}")]
    AlreadyDecided { audit_id: i64, status: &'static str },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Internal lock error")]
    LockPoisoned,
}

impl From<rusqlite::Error> for CustodyError {
    fn from(err: rusqlite::Error) -> Self {
        CustodyError::Database(DatabaseError::Sqlite(err))
    }
}

impl CustodyError {
    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CustodyError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            CustodyError::NotFound { .. } => "NOT_FOUND",
            CustodyError::InvalidState(_) => "INVALID_STATE",
            CustodyError::StaleCount { .. } => "STALE_COUNT",
            CustodyError::ConcurrentModification { .. } => "CONCURRENT_MODIFICATION",
            CustodyError::Forbidden { .. } => "FORBIDDEN",
            CustodyError::SelfReviewForbidden { .. } => "SELF_REVIEW_FORBIDDEN",
            CustodyError::EmptyAudit => "EMPTY_AUDIT",
            CustodyError::InvalidMedication { .. } => "INVALID_MEDICATION",
            CustodyError::AlreadyResolved(_) => "ALREADY_RESOLVED",
            CustodyError::AlreadyDecided { .. } => "ALREADY_DECIDED",
            CustodyError::Validation(_) => "VALIDATION",
            CustodyError::Database(_) | CustodyError::LockPoisoned => "INTERNAL",
        }
    }

    /// Actionable message for the submitting or reviewing staff member.
    pub fn user_message(&self) -> String {
        match self {
            CustodyError::NotFound { entity, .. } => format!("{entity} could not be found."),
            CustodyError::InvalidState(reason) => {
                format!("This action is not allowed right now: {reason}.")
            }
            CustodyError::StaleCount { .. } => {
                "Counts have changed since you started this audit. Please recount.".into()
            }
            CustodyError::ConcurrentModification { .. } => {
                "Counts have changed since this audit was submitted. Ask the submitter to recount and resubmit.".into()
            }
            CustodyError::Forbidden { .. } => {
                "Only a nurse or administrator can review medication audits.".into()
            }
            CustodyError::SelfReviewForbidden { .. } => {
                "You cannot review an audit you submitted. Another reviewer must decide it.".into()
            }
            CustodyError::EmptyAudit => "Add at least one medication count before submitting.".into(),
            CustodyError::InvalidMedication { reason, .. } => {
                format!("One of the counted medications cannot be audited: {reason}.")
            }
            CustodyError::AlreadyResolved(_) => "This alert has already been resolved.".into(),
            CustodyError::AlreadyDecided { status, .. } => {
                format!("This audit was already {status}. Your decision was not recorded.")
            }
            CustodyError::Validation(reason) => format!("Please correct the input: {reason}."),
            CustodyError::Database(_) | CustodyError::LockPoisoned => {
                "Something went wrong. Nothing was changed; please try again.".into()
            }
        }
    }

    /// Optimistic-concurrency conflicts: the caller's baseline no longer holds.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            CustodyError::StaleCount { .. } | CustodyError::ConcurrentModification { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflicts_are_distinguishable() {
        let stale = CustodyError::StaleCount {
            medication_id: Uuid::nil(),
            submitted: 27,
            live: 25,
        };
        assert!(stale.is_conflict());
        assert_eq!(stale.code(), "STALE_COUNT");
        assert!(stale.user_message().contains("recount"));

        assert!(!CustodyError::EmptyAudit.is_conflict());
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = CustodyError::Database(DatabaseError::ConstraintViolation("secret".into()));
        assert_eq!(err.code(), "INTERNAL");
        assert!(!err.user_message().contains("secret"));
    }

    #[test]
    fn already_decided_reports_outcome() {
        let err = CustodyError::AlreadyDecided {
            audit_id: 3,
            status: "approved",
        };
        assert_eq!(err.to_string(), "Audit 3 was already approved");
        assert!(err.user_message().contains("not recorded"));
    }
}
