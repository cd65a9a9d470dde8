//! Read-through collaborator directories.
//!
//! The ledger never owns resident, staff or program data; it looks them up
//! through these traits so a deployment can back them with whatever system
//! of record the facility already runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use rusqlite::Connection;
use uuid::Uuid;

use crate::db;
use crate::error::CustodyError;
use crate::models::enums::StaffRole;
use crate::models::{Resident, StaffMember};

pub trait ResidentDirectory: Send + Sync {
    fn get_resident(&self, id: &Uuid) -> Result<Option<Resident>, CustodyError>;
}

pub trait StaffDirectory: Send + Sync {
    fn get_staff(&self, id: &Uuid) -> Result<Option<StaffMember>, CustodyError>;
}

pub trait ProgramDirectory: Send + Sync {
    /// Residents currently assigned to the program. Unknown programs are empty.
    fn program_residents(&self, program_id: &Uuid) -> Result<Vec<Uuid>, CustodyError>;
}

/// Capability check for the Approval Gate.
pub trait ReviewPolicy: Send + Sync {
    fn can_review(&self, reviewer: &StaffMember) -> bool;
}

/// Nurses and administrators may decide audits.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClinicalReviewPolicy;

impl ReviewPolicy for ClinicalReviewPolicy {
    fn can_review(&self, reviewer: &StaffMember) -> bool {
        matches!(reviewer.role, StaffRole::Nurse | StaffRole::Admin)
    }
}

/// Staff lookup that fails with `NotFound` instead of returning `None`.
pub fn require_staff(
    staff: &dyn StaffDirectory,
    id: &Uuid,
) -> Result<StaffMember, CustodyError> {
    staff
        .get_staff(id)?
        .ok_or_else(|| CustodyError::not_found("Staff member", id))
}

// ═══════════════════════════════════════════════════════════
// SQLite-backed directories
// ═══════════════════════════════════════════════════════════

/// Directory tables living in the ledger database.
///
/// Opens a short-lived connection per lookup so it can be shared across
/// threads and read while a ledger write transaction is open (WAL).
#[derive(Debug, Clone)]
pub struct SqliteDirectory {
    db_path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteDirectory {
    pub fn new(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            db_path: db_path.into(),
            busy_timeout,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> Result<Connection, CustodyError> {
        Ok(db::open_database(&self.db_path, self.busy_timeout)?)
    }
}

impl ResidentDirectory for SqliteDirectory {
    fn get_resident(&self, id: &Uuid) -> Result<Option<Resident>, CustodyError> {
        let conn = self.open()?;
        Ok(db::get_resident(&conn, id)?)
    }
}

impl StaffDirectory for SqliteDirectory {
    fn get_staff(&self, id: &Uuid) -> Result<Option<StaffMember>, CustodyError> {
        let conn = self.open()?;
        Ok(db::get_staff(&conn, id)?)
    }
}

impl ProgramDirectory for SqliteDirectory {
    fn program_residents(&self, program_id: &Uuid) -> Result<Vec<Uuid>, CustodyError> {
        let conn = self.open()?;
        Ok(db::get_program_residents(&conn, program_id)?)
    }
}

// ═══════════════════════════════════════════════════════════
// In-memory directory
// ═══════════════════════════════════════════════════════════

/// Directory held entirely in memory, for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    residents: RwLock<HashMap<Uuid, Resident>>,
    staff: RwLock<HashMap<Uuid, StaffMember>>,
    programs: RwLock<HashMap<Uuid, Vec<Uuid>>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resident(&self, resident: Resident) -> Result<(), CustodyError> {
        let mut guard = self.residents.write().map_err(|_| CustodyError::LockPoisoned)?;
        guard.insert(resident.id, resident);
        Ok(())
    }

    pub fn add_staff(&self, member: StaffMember) -> Result<(), CustodyError> {
        let mut guard = self.staff.write().map_err(|_| CustodyError::LockPoisoned)?;
        guard.insert(member.id, member);
        Ok(())
    }

    pub fn assign(&self, program_id: Uuid, resident_id: Uuid) -> Result<(), CustodyError> {
        let mut guard = self.programs.write().map_err(|_| CustodyError::LockPoisoned)?;
        let members = guard.entry(program_id).or_default();
        if !members.contains(&resident_id) {
            members.push(resident_id);
        }
        Ok(())
    }
}

impl ResidentDirectory for MemoryDirectory {
    fn get_resident(&self, id: &Uuid) -> Result<Option<Resident>, CustodyError> {
        let guard = self.residents.read().map_err(|_| CustodyError::LockPoisoned)?;
        Ok(guard.get(id).cloned())
    }
}

impl StaffDirectory for MemoryDirectory {
    fn get_staff(&self, id: &Uuid) -> Result<Option<StaffMember>, CustodyError> {
        let guard = self.staff.read().map_err(|_| CustodyError::LockPoisoned)?;
        Ok(guard.get(id).cloned())
    }
}

impl ProgramDirectory for MemoryDirectory {
    fn program_residents(&self, program_id: &Uuid) -> Result<Vec<Uuid>, CustodyError> {
        let guard = self.programs.read().map_err(|_| CustodyError::LockPoisoned)?;
        Ok(guard.get(program_id).cloned().unwrap_or_default())
    }
}
