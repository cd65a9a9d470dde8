//! File-backed fixture for end-to-end and multi-threaded tests.

use std::sync::Arc;

use tempfile::TempDir;
use uuid::Uuid;

use crate::audit::AuditView;
use crate::core_state::CustodyState;
use crate::db::{now_timestamp, DEFAULT_BUSY_TIMEOUT};
use crate::error::CustodyError;
use crate::models::enums::{AdministrationAction, ReviewDecision, Shift, StaffRole};
use crate::models::*;
use crate::administration::RecordedAdministration;

pub(crate) struct Fixture {
    _dir: TempDir,
    pub state: Arc<CustodyState>,
    pub resident: Uuid,
    pub aide: Uuid,
    pub nurse: Uuid,
    pub admin: Uuid,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let state = CustodyState::open(dir.path().join("ledger.db"), DEFAULT_BUSY_TIMEOUT).unwrap();

        let resident = Uuid::new_v4();
        state
            .seed_resident(&Resident {
                id: resident,
                first_name: "Agnes".into(),
                last_name: "Holloway".into(),
            })
            .unwrap();

        let staff = |name: &str, role: StaffRole| {
            let id = Uuid::new_v4();
            state
                .seed_staff(&StaffMember {
                    id,
                    full_name: name.into(),
                    role,
                    job_title: None,
                })
                .unwrap();
            id
        };
        let aide = staff("Tom Reyes", StaffRole::Staff);
        let nurse = staff("June Abara", StaffRole::Nurse);
        let admin = staff("Omar Hale", StaffRole::Admin);

        Self {
            _dir: dir,
            state: Arc::new(state),
            resident,
            aide,
            nurse,
            admin,
        }
    }

    pub fn medication(&self, name: &str, count: i64) -> Uuid {
        self.state
            .register_medication(&NewMedication {
                resident_id: self.resident,
                name: name.into(),
                dosage: "5 mg".into(),
                frequency: "twice daily".into(),
                initial_count: count,
                prescribing_physician: Some("Dr. Chen".into()),
                special_instructions: None,
            })
            .unwrap()
            .id
    }

    pub fn administer(
        &self,
        medication_id: Uuid,
        action: AdministrationAction,
    ) -> Result<RecordedAdministration, CustodyError> {
        self.state.record_administration(&NewAdministration {
            medication_id,
            action,
            shift: Shift::Morning,
            staff_id: self.aide,
            notes: None,
            administered_at: now_timestamp(),
        })
    }

    /// Entries are `(medication, previous, counted)`.
    pub fn audit(
        &self,
        submitted_by: Uuid,
        entries: &[(Uuid, i64, i64)],
    ) -> Result<AuditView, CustodyError> {
        self.state.submit_audit(&NewAuditSubmission {
            shift: Shift::Evening,
            audit_date: now_timestamp().date(),
            audit_time: now_timestamp().time(),
            submitted_by,
            notes: None,
            entries: entries
                .iter()
                .map(|&(medication_id, previous_count, current_count)| AuditEntryInput {
                    medication_id,
                    resident_id: self.resident,
                    previous_count,
                    current_count,
                    notes: None,
                })
                .collect(),
        })
    }

    pub fn review(
        &self,
        audit_id: i64,
        reviewer_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<AuditView, CustodyError> {
        self.state.decide(&ReviewRequest {
            audit_id,
            reviewer_id,
            decision,
            review_notes: None,
        })
    }

    pub fn count(&self, medication_id: Uuid) -> i64 {
        self.state.get_current_count(&medication_id).unwrap()
    }
}
