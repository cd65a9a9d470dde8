use rusqlite::Connection;
use uuid::Uuid;

use crate::db::{self, now_timestamp, open_memory_database};
use crate::directory::{ClinicalReviewPolicy, MemoryDirectory};
use crate::error::CustodyError;
use crate::inventory;
use crate::models::enums::{ReviewDecision, Shift, StaffRole};
use crate::models::*;

/// In-memory ledger with one resident, a counter, a nurse and an admin.
pub(crate) struct AuditSetup {
    pub conn: Connection,
    pub dir: MemoryDirectory,
    pub resident: Uuid,
    pub counter: Uuid,
    pub nurse: Uuid,
    pub admin: Uuid,
    pub meds: Vec<Uuid>,
}

impl AuditSetup {
    pub fn new(counts: &[i64]) -> Self {
        let conn = open_memory_database().unwrap();
        let dir = MemoryDirectory::new();
        let resident = Uuid::new_v4();
        dir.add_resident(Resident {
            id: resident,
            first_name: "Mabel".into(),
            last_name: "Frost".into(),
        })
        .unwrap();

        let staff = |name: &str, role: StaffRole| {
            let id = Uuid::new_v4();
            dir.add_staff(StaffMember {
                id,
                full_name: name.into(),
                role,
                job_title: None,
            })
            .unwrap();
            id
        };
        let counter = staff("Cole Ward", StaffRole::Staff);
        let nurse = staff("Rena Soto", StaffRole::Nurse);
        let admin = staff("Ivan Lutz", StaffRole::Admin);

        let mut setup = Self {
            conn,
            dir,
            resident,
            counter,
            nurse,
            admin,
            meds: Vec::new(),
        };
        for (i, count) in counts.iter().enumerate() {
            let id = setup.register(resident, &format!("Med {i}"), *count);
            setup.meds.push(id);
        }
        setup
    }

    fn register(&self, resident_id: Uuid, name: &str, count: i64) -> Uuid {
        inventory::register_medication(
            &self.conn,
            &self.dir,
            &NewMedication {
                resident_id,
                name: name.into(),
                dosage: "1 tablet".into(),
                frequency: "twice daily".into(),
                initial_count: count,
                prescribing_physician: None,
                special_instructions: None,
            },
            now_timestamp(),
        )
        .unwrap()
        .id
    }

    /// Adds a second resident with one medication; returns its index in `meds`.
    pub fn add_resident_with_medication(&mut self, first: &str, last: &str, count: i64) -> usize {
        let id = Uuid::new_v4();
        self.dir
            .add_resident(Resident {
                id,
                first_name: first.into(),
                last_name: last.into(),
            })
            .unwrap();
        let med = self.register(id, &format!("{first}'s med"), count);
        self.meds.push(med);
        self.meds.len() - 1
    }

    pub fn count(&self, idx: usize) -> i64 {
        inventory::get_current_count(&self.conn, &self.meds[idx]).unwrap()
    }

    /// Entries are `(medication index, previous, counted)`.
    pub fn input(&self, submitted_by: Uuid, entries: &[(usize, i64, i64)]) -> NewAuditSubmission {
        NewAuditSubmission {
            shift: Shift::Morning,
            audit_date: now_timestamp().date(),
            audit_time: now_timestamp().time(),
            submitted_by,
            notes: None,
            entries: entries
                .iter()
                .map(|&(idx, previous_count, current_count)| {
                    let medication_id = self.meds[idx];
                    let resident_id = db::get_medication(&self.conn, &medication_id)
                        .unwrap()
                        .unwrap()
                        .resident_id;
                    AuditEntryInput {
                        medication_id,
                        resident_id,
                        previous_count,
                        current_count,
                        notes: None,
                    }
                })
                .collect(),
        }
    }

    pub fn submit(
        &self,
        submitted_by: Uuid,
        entries: &[(usize, i64, i64)],
    ) -> Result<AuditSubmission, CustodyError> {
        super::submit_audit(
            &self.conn,
            &self.dir,
            &self.input(submitted_by, entries),
            now_timestamp(),
        )
    }

    /// Decides inside a transaction that only commits on success.
    pub fn decide(
        &self,
        audit_id: i64,
        reviewer_id: Uuid,
        decision: ReviewDecision,
    ) -> Result<AuditSubmission, CustodyError> {
        let tx = self.conn.unchecked_transaction()?;
        let decided = super::decide(
            &tx,
            &self.dir,
            &ClinicalReviewPolicy,
            &ReviewRequest {
                audit_id,
                reviewer_id,
                decision,
                review_notes: Some("checked".into()),
            },
            now_timestamp(),
        )?;
        tx.commit()?;
        Ok(decided)
    }
}
