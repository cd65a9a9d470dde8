//! MedicationRecord Store: running counts and their single write path.
//!
//! `apply_delta` is the only function that changes `current_count`, and it
//! always appends the matching custody event in the same transaction.
//! Callers hold the medication's entry in [`CountLocks`] for the duration
//! of that transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::NaiveDateTime;
use rusqlite::Connection;
use uuid::Uuid;

use crate::custody;
use crate::db;
use crate::directory::ResidentDirectory;
use crate::error::CustodyError;
use crate::models::enums::{CustodyCause, MedicationStatus};
use crate::models::{Medication, NewMedication};

// ═══════════════════════════════════════════════════════════
// Per-medication lock registry
// ═══════════════════════════════════════════════════════════

/// One mutex per medication id. Unrelated medications never contend.
#[derive(Debug, Default)]
pub struct CountLocks {
    registry: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl CountLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handles for `ids`, deduplicated and in ascending id order.
    fn handles(&self, ids: &[Uuid]) -> Result<Vec<Arc<Mutex<()>>>, CustodyError> {
        let mut sorted: Vec<Uuid> = ids.to_vec();
        sorted.sort();
        sorted.dedup();

        let mut registry = self.registry.lock().map_err(|_| CustodyError::LockPoisoned)?;
        Ok(sorted
            .into_iter()
            .map(|id| Arc::clone(registry.entry(id).or_default()))
            .collect())
    }

    /// Run `f` while holding the locks of every medication in `ids`.
    ///
    /// Locks are always taken in ascending id order, so two callers
    /// needing overlapping sets cannot deadlock.
    pub fn with_locked<T>(
        &self,
        ids: &[Uuid],
        f: impl FnOnce() -> Result<T, CustodyError>,
    ) -> Result<T, CustodyError> {
        let handles = self.handles(ids)?;
        let mut guards = Vec::with_capacity(handles.len());
        for handle in &handles {
            guards.push(handle.lock().map_err(|_| CustodyError::LockPoisoned)?);
        }
        let result = f();
        drop(guards);
        result
    }

    pub fn tracked(&self) -> usize {
        self.registry.lock().map(|r| r.len()).unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════
// Store operations
// ═══════════════════════════════════════════════════════════

pub fn require_medication(conn: &Connection, id: &Uuid) -> Result<Medication, CustodyError> {
    db::get_medication(conn, id)?.ok_or_else(|| CustodyError::not_found("Medication", id))
}

pub fn get_current_count(conn: &Connection, id: &Uuid) -> Result<i64, CustodyError> {
    db::get_medication_count(conn, id)?.ok_or_else(|| CustodyError::not_found("Medication", id))
}

/// Add `delta` to the running count and chain the custody event.
///
/// Discontinued medications only accept the `Reactivation` cause.
pub fn apply_delta(
    conn: &Connection,
    medication_id: &Uuid,
    delta: i64,
    cause: CustodyCause,
    cause_ref: &str,
    at: NaiveDateTime,
) -> Result<i64, CustodyError> {
    let medication = require_medication(conn, medication_id)?;
    if !medication.is_active() && cause != CustodyCause::Reactivation {
        return Err(CustodyError::InvalidState(format!(
            "medication {} is discontinued",
            medication.name
        )));
    }

    let new_count = db::update_medication_count(conn, medication_id, delta)?;
    custody::append_custody_record(conn, medication_id, cause, cause_ref, delta, new_count, at)?;

    tracing::debug!(
        medication_id = %medication_id,
        cause = %cause,
        cause_ref,
        delta,
        new_count,
        "Count updated"
    );
    Ok(new_count)
}

pub fn register_medication(
    conn: &Connection,
    residents: &dyn ResidentDirectory,
    input: &NewMedication,
    at: NaiveDateTime,
) -> Result<Medication, CustodyError> {
    if input.name.trim().is_empty() {
        return Err(CustodyError::Validation("medication name is required".into()));
    }
    if input.dosage.trim().is_empty() {
        return Err(CustodyError::Validation("dosage is required".into()));
    }
    if input.initial_count < 0 {
        return Err(CustodyError::Validation(format!(
            "initial count must not be negative (got {})",
            input.initial_count
        )));
    }
    if residents.get_resident(&input.resident_id)?.is_none() {
        return Err(CustodyError::not_found("Resident", input.resident_id));
    }

    let medication = Medication {
        id: Uuid::new_v4(),
        resident_id: input.resident_id,
        name: input.name.trim().to_string(),
        dosage: input.dosage.trim().to_string(),
        frequency: input.frequency.trim().to_string(),
        current_count: input.initial_count,
        status: MedicationStatus::Active,
        prescribing_physician: input.prescribing_physician.clone(),
        special_instructions: input.special_instructions.clone(),
        created_at: at,
    };
    db::insert_medication(conn, &medication)?;
    custody::append_custody_record(
        conn,
        &medication.id,
        CustodyCause::Registration,
        &medication.id.to_string(),
        medication.current_count,
        medication.current_count,
        at,
    )?;
    Ok(medication)
}

/// ACTIVE → DISCONTINUED. The count is kept for history.
pub fn discontinue_medication(conn: &Connection, id: &Uuid) -> Result<Medication, CustodyError> {
    let mut medication = require_medication(conn, id)?;
    if !medication.is_active() {
        return Err(CustodyError::InvalidState(format!(
            "medication {} is already discontinued",
            medication.name
        )));
    }
    db::update_medication_status(conn, id, &MedicationStatus::Discontinued)?;
    medication.status = MedicationStatus::Discontinued;
    Ok(medication)
}

/// DISCONTINUED → ACTIVE with a fresh physical count.
pub fn reactivate_medication(
    conn: &Connection,
    id: &Uuid,
    restocked_count: i64,
    cause_ref: &str,
    at: NaiveDateTime,
) -> Result<Medication, CustodyError> {
    if restocked_count < 0 {
        return Err(CustodyError::Validation(format!(
            "restocked count must not be negative (got {restocked_count})"
        )));
    }
    let mut medication = require_medication(conn, id)?;
    if medication.is_active() {
        return Err(CustodyError::InvalidState(format!(
            "medication {} is already active",
            medication.name
        )));
    }

    let delta = restocked_count - medication.current_count;
    medication.current_count =
        apply_delta(conn, id, delta, CustodyCause::Reactivation, cause_ref, at)?;
    db::update_medication_status(conn, id, &MedicationStatus::Active)?;
    medication.status = MedicationStatus::Active;
    Ok(medication)
}

pub fn list_medications(
    conn: &Connection,
    resident_id: Option<&Uuid>,
    include_discontinued: bool,
) -> Result<Vec<Medication>, CustodyError> {
    Ok(db::list_medications(conn, resident_id, include_discontinued)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::custody::verify_custody_chain;
    use crate::db::{now_timestamp, open_memory_database};
    use crate::directory::MemoryDirectory;
    use crate::models::Resident;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    fn setup() -> (Connection, MemoryDirectory, Uuid) {
        let conn = open_memory_database().unwrap();
        let dir = MemoryDirectory::new();
        let resident = Resident {
            id: Uuid::new_v4(),
            first_name: "Helen".into(),
            last_name: "Marsh".into(),
        };
        dir.add_resident(resident.clone()).unwrap();
        (conn, dir, resident.id)
    }

    fn new_med(resident_id: Uuid, count: i64) -> NewMedication {
        NewMedication {
            resident_id,
            name: "Sertraline".into(),
            dosage: "50 mg".into(),
            frequency: "once daily".into(),
            initial_count: count,
            prescribing_physician: Some("Dr. Iyer".into()),
            special_instructions: None,
        }
    }

    #[test]
    fn register_writes_genesis_event() {
        let (conn, dir, resident) = setup();
        let med = register_medication(&conn, &dir, &new_med(resident, 30), now_timestamp()).unwrap();
        assert_eq!(get_current_count(&conn, &med.id).unwrap(), 30);

        let v = verify_custody_chain(&conn, &med.id).unwrap();
        assert!(v.intact);
        assert_eq!(v.event_count, 1);
    }

    #[test]
    fn register_rejects_unknown_resident_and_bad_input() {
        let (conn, dir, resident) = setup();
        let err = register_medication(&conn, &dir, &new_med(Uuid::new_v4(), 30), now_timestamp())
            .unwrap_err();
        assert!(matches!(err, CustodyError::NotFound { entity: "Resident", .. }));

        let err = register_medication(&conn, &dir, &new_med(resident, -1), now_timestamp())
            .unwrap_err();
        assert!(matches!(err, CustodyError::Validation(_)));

        let mut blank = new_med(resident, 5);
        blank.name = "  ".into();
        assert!(matches!(
            register_medication(&conn, &dir, &blank, now_timestamp()),
            Err(CustodyError::Validation(_))
        ));
    }

    #[test]
    fn apply_delta_updates_count_and_allows_negative() {
        let (conn, dir, resident) = setup();
        let med = register_medication(&conn, &dir, &new_med(resident, 1), now_timestamp()).unwrap();
        let at = now_timestamp();
        assert_eq!(apply_delta(&conn, &med.id, -1, CustodyCause::Administration, "1", at).unwrap(), 0);
        assert_eq!(apply_delta(&conn, &med.id, -1, CustodyCause::Administration, "2", at).unwrap(), -1);
        assert!(verify_custody_chain(&conn, &med.id).unwrap().intact);
    }

    #[test]
    fn apply_delta_unknown_medication() {
        let (conn, _, _) = setup();
        let err = apply_delta(&conn, &Uuid::new_v4(), -1, CustodyCause::Audit, "1", now_timestamp())
            .unwrap_err();
        assert!(matches!(err, CustodyError::NotFound { entity: "Medication", .. }));
    }

    #[test]
    fn discontinued_accepts_only_reactivation() {
        let (conn, dir, resident) = setup();
        let med = register_medication(&conn, &dir, &new_med(resident, 12), now_timestamp()).unwrap();
        discontinue_medication(&conn, &med.id).unwrap();

        let err = apply_delta(&conn, &med.id, -1, CustodyCause::Administration, "1", now_timestamp())
            .unwrap_err();
        assert!(matches!(err, CustodyError::InvalidState(_)));
        assert!(matches!(
            discontinue_medication(&conn, &med.id),
            Err(CustodyError::InvalidState(_))
        ));

        let reactivated =
            reactivate_medication(&conn, &med.id, 28, "restock", now_timestamp()).unwrap();
        assert!(reactivated.is_active());
        assert_eq!(reactivated.current_count, 28);

        let history = custody::get_custody_history(&conn, &med.id).unwrap();
        assert_eq!(history.last().unwrap().cause, CustodyCause::Reactivation);
        assert_eq!(history.last().unwrap().delta, 16);
        assert!(verify_custody_chain(&conn, &med.id).unwrap().intact);
    }

    #[test]
    fn reactivate_active_is_invalid_state() {
        let (conn, dir, resident) = setup();
        let med = register_medication(&conn, &dir, &new_med(resident, 3), now_timestamp()).unwrap();
        assert!(matches!(
            reactivate_medication(&conn, &med.id, 10, "restock", now_timestamp()),
            Err(CustodyError::InvalidState(_))
        ));
    }

    #[test]
    fn list_hides_discontinued_by_default() {
        let (conn, dir, resident) = setup();
        let a = register_medication(&conn, &dir, &new_med(resident, 3), now_timestamp()).unwrap();
        let mut other = new_med(resident, 4);
        other.name = "Amlodipine".into();
        register_medication(&conn, &dir, &other, now_timestamp()).unwrap();
        discontinue_medication(&conn, &a.id).unwrap();

        assert_eq!(list_medications(&conn, Some(&resident), false).unwrap().len(), 1);
        assert_eq!(list_medications(&conn, Some(&resident), true).unwrap().len(), 2);
    }

    #[test]
    fn locks_serialize_same_medication() {
        let locks = Arc::new(CountLocks::new());
        let med = Uuid::new_v4();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                let max_seen = Arc::clone(&max_seen);
                thread::spawn(move || {
                    locks
                        .with_locked(&[med], || {
                            let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                            max_seen.fetch_max(now, Ordering::SeqCst);
                            thread::sleep(std::time::Duration::from_millis(2));
                            inside.fetch_sub(1, Ordering::SeqCst);
                            Ok(())
                        })
                        .unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
        assert_eq!(locks.tracked(), 1);
    }

    #[test]
    fn overlapping_lock_sets_do_not_deadlock() {
        let locks = Arc::new(CountLocks::new());
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let ids = if i % 2 == 0 { vec![a, b] } else { vec![b, a, b] };
                thread::spawn(move || {
                    for _ in 0..50 {
                        locks.with_locked(&ids, || Ok(())).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(locks.tracked(), 2);
    }
}
