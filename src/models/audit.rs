use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AuditStatus, ReviewDecision, Shift};

/// One counted medication inside an audit batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditCountEntry {
    pub medication_id: Uuid,
    pub resident_id: Uuid,
    pub previous_count: i64,
    pub current_count: i64,
    pub notes: Option<String>,
    pub variance: i64,
}

impl AuditCountEntry {
    pub fn new(
        medication_id: Uuid,
        resident_id: Uuid,
        previous_count: i64,
        current_count: i64,
        notes: Option<String>,
    ) -> Self {
        Self {
            medication_id,
            resident_id,
            previous_count,
            current_count,
            notes,
            variance: current_count - previous_count,
        }
    }

    pub fn has_discrepancy(&self) -> bool {
        self.variance != 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSubmission {
    pub id: i64,
    pub audit_date: NaiveDate,
    pub audit_time: NaiveTime,
    pub shift: Shift,
    pub submitted_by: Uuid,
    pub notes: Option<String>,
    pub status: AuditStatus,
    pub reviewed_by: Option<Uuid>,
    pub review_notes: Option<String>,
    pub reviewed_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub entries: Vec<AuditCountEntry>,
}

impl AuditSubmission {
    pub fn has_discrepancies(&self) -> bool {
        self.entries.iter().any(AuditCountEntry::has_discrepancy)
    }

    pub fn total_variance(&self) -> i64 {
        self.entries.iter().map(|e| e.variance).sum()
    }

    pub fn medication_ids(&self) -> Vec<Uuid> {
        self.entries.iter().map(|e| e.medication_id).collect()
    }
}

/// Caller-supplied count for one medication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntryInput {
    pub medication_id: Uuid,
    pub resident_id: Uuid,
    /// Baseline the counter started from; must match the live count.
    pub previous_count: i64,
    pub current_count: i64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditSubmission {
    pub shift: Shift,
    pub audit_date: NaiveDate,
    pub audit_time: NaiveTime,
    pub submitted_by: Uuid,
    pub notes: Option<String>,
    pub entries: Vec<AuditEntryInput>,
}

/// A reviewer's decision on one pending submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub audit_id: i64,
    pub reviewer_id: Uuid,
    pub decision: ReviewDecision,
    pub review_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(prev: i64, cur: i64) -> AuditCountEntry {
        AuditCountEntry::new(Uuid::new_v4(), Uuid::new_v4(), prev, cur, None)
    }

    fn submission(entries: Vec<AuditCountEntry>) -> AuditSubmission {
        AuditSubmission {
            id: 1,
            audit_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            audit_time: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            shift: Shift::Morning,
            submitted_by: Uuid::new_v4(),
            notes: None,
            status: AuditStatus::PendingReview,
            reviewed_by: None,
            review_notes: None,
            reviewed_at: None,
            created_at: NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_hms_opt(7, 31, 0)
                .unwrap(),
            entries,
        }
    }

    #[test]
    fn variance_is_current_minus_previous() {
        assert_eq!(entry(29, 27).variance, -2);
        assert_eq!(entry(10, 12).variance, 2);
        assert_eq!(entry(5, 5).variance, 0);
    }

    #[test]
    fn discrepancies_are_any_nonzero_variance() {
        assert!(!submission(vec![entry(5, 5), entry(8, 8)]).has_discrepancies());
        assert!(submission(vec![entry(5, 5), entry(8, 7)]).has_discrepancies());
    }

    #[test]
    fn total_variance_sums_signed_entries() {
        let sub = submission(vec![entry(10, 8), entry(4, 5), entry(3, 3)]);
        assert_eq!(sub.total_variance(), -1);
        // Offsetting variances still count as discrepancies.
        let offset = submission(vec![entry(10, 9), entry(4, 5)]);
        assert_eq!(offset.total_variance(), 0);
        assert!(offset.has_discrepancies());
    }
}
