//! Administration Ledger: append-only dose events.

use rusqlite::Connection;
use serde::Serialize;

use crate::db;
use crate::directory::{require_staff, StaffDirectory};
use crate::error::CustodyError;
use crate::inventory;
use crate::models::enums::CustodyCause;
use crate::models::{AdministrationRecord, NewAdministration};

/// A committed administration and the count it left behind.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedAdministration {
    pub record: AdministrationRecord,
    pub new_count: i64,
}

/// Append one administration event.
///
/// ADMINISTERED removes one unit; REFUSED and HELD are recorded without a
/// count change. The count may go to zero or below: a shortfall is for the
/// next audit to surface, not for the ledger to refuse.
pub fn record_administration(
    conn: &Connection,
    staff: &dyn StaffDirectory,
    input: &NewAdministration,
) -> Result<RecordedAdministration, CustodyError> {
    require_staff(staff, &input.staff_id)?;

    let medication = inventory::require_medication(conn, &input.medication_id)?;
    if !medication.is_active() {
        return Err(CustodyError::InvalidState(format!(
            "medication {} is discontinued",
            medication.name
        )));
    }

    let id = db::insert_administration(conn, &medication.id, &medication.resident_id, input)?;

    let delta = input.action.count_delta();
    let new_count = if delta == 0 {
        medication.current_count
    } else {
        inventory::apply_delta(
            conn,
            &medication.id,
            delta,
            CustodyCause::Administration,
            &id.to_string(),
            input.administered_at,
        )?
    };

    let record = AdministrationRecord {
        id,
        medication_id: medication.id,
        resident_id: medication.resident_id,
        administered_at: input.administered_at,
        shift: input.shift,
        action: input.action,
        staff_id: input.staff_id,
        notes: input.notes.clone(),
    };
    Ok(RecordedAdministration { record, new_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::verify_custody_chain;
    use crate::db::repository::test_support::{seed_medication, seed_resident};
    use crate::db::{now_timestamp, open_memory_database};
    use crate::directory::MemoryDirectory;
    use crate::models::enums::{AdministrationAction, Shift, StaffRole};
    use crate::models::StaffMember;
    use uuid::Uuid;

    struct Setup {
        conn: Connection,
        dir: MemoryDirectory,
        staff_id: Uuid,
        med: Uuid,
    }

    fn setup(count: i64) -> Setup {
        let conn = open_memory_database().unwrap();
        let dir = MemoryDirectory::new();
        let staff_id = Uuid::new_v4();
        dir.add_staff(StaffMember {
            id: staff_id,
            full_name: "Priya Nair".into(),
            role: StaffRole::Staff,
            job_title: Some("Care aide".into()),
        })
        .unwrap();
        let resident = seed_resident(&conn, "Walter", "Grey");
        let med = seed_medication(&conn, resident, "Metformin", count);
        Setup { conn, dir, staff_id, med }
    }

    fn dose(s: &Setup, action: AdministrationAction) -> NewAdministration {
        NewAdministration {
            medication_id: s.med,
            action,
            shift: Shift::Morning,
            staff_id: s.staff_id,
            notes: None,
            administered_at: now_timestamp(),
        }
    }

    #[test]
    fn administered_decrements_by_one() {
        let s = setup(30);
        let out = record_administration(&s.conn, &s.dir, &dose(&s, AdministrationAction::Administered))
            .unwrap();
        assert_eq!(out.new_count, 29);
        assert_eq!(inventory::get_current_count(&s.conn, &s.med).unwrap(), 29);
        assert!(db::get_administration(&s.conn, out.record.id).unwrap().is_some());
    }

    #[test]
    fn refused_and_held_leave_count_unchanged() {
        let s = setup(10);
        for action in [AdministrationAction::Refused, AdministrationAction::Held] {
            let out = record_administration(&s.conn, &s.dir, &dose(&s, action)).unwrap();
            assert_eq!(out.new_count, 10);
            assert_eq!(out.record.action, action);
        }
        assert_eq!(inventory::get_current_count(&s.conn, &s.med).unwrap(), 10);
        // No count change means no custody event.
        assert!(db::list_custody_records(&s.conn, &s.med).unwrap().is_empty());
    }

    #[test]
    fn count_may_run_below_zero() {
        let s = setup(0);
        let out = record_administration(&s.conn, &s.dir, &dose(&s, AdministrationAction::Administered))
            .unwrap();
        assert_eq!(out.new_count, -1);
    }

    #[test]
    fn unknown_staff_or_medication_is_not_found() {
        let s = setup(5);
        let mut input = dose(&s, AdministrationAction::Administered);
        input.staff_id = Uuid::new_v4();
        assert!(matches!(
            record_administration(&s.conn, &s.dir, &input),
            Err(CustodyError::NotFound { entity: "Staff member", .. })
        ));

        let mut input = dose(&s, AdministrationAction::Administered);
        input.medication_id = Uuid::new_v4();
        assert!(matches!(
            record_administration(&s.conn, &s.dir, &input),
            Err(CustodyError::NotFound { entity: "Medication", .. })
        ));
    }

    #[test]
    fn discontinued_medication_rejects_every_action() {
        let s = setup(5);
        inventory::discontinue_medication(&s.conn, &s.med).unwrap();
        for action in [
            AdministrationAction::Administered,
            AdministrationAction::Refused,
            AdministrationAction::Held,
        ] {
            assert!(matches!(
                record_administration(&s.conn, &s.dir, &dose(&s, action)),
                Err(CustodyError::InvalidState(_))
            ));
        }
    }

    #[test]
    fn administration_custody_references_record() {
        let conn = open_memory_database().unwrap();
        let dir = MemoryDirectory::new();
        let resident = crate::models::Resident {
            id: Uuid::new_v4(),
            first_name: "Iris".into(),
            last_name: "Vega".into(),
        };
        dir.add_resident(resident.clone()).unwrap();
        let staff_id = Uuid::new_v4();
        dir.add_staff(StaffMember {
            id: staff_id,
            full_name: "Leo Park".into(),
            role: StaffRole::Nurse,
            job_title: None,
        })
        .unwrap();
        let med = inventory::register_medication(
            &conn,
            &dir,
            &crate::models::NewMedication {
                resident_id: resident.id,
                name: "Warfarin".into(),
                dosage: "5 mg".into(),
                frequency: "daily".into(),
                initial_count: 14,
                prescribing_physician: None,
                special_instructions: None,
            },
            now_timestamp(),
        )
        .unwrap();

        let out = record_administration(
            &conn,
            &dir,
            &NewAdministration {
                medication_id: med.id,
                action: AdministrationAction::Administered,
                shift: Shift::Evening,
                staff_id,
                notes: Some("with food".into()),
                administered_at: now_timestamp(),
            },
        )
        .unwrap();

        let history = db::list_custody_records(&conn, &med.id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].cause_ref, out.record.id.to_string());
        assert!(verify_custody_chain(&conn, &med.id).unwrap().intact);
    }
}
