use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::{AdministrationAction, Shift};

/// Immutable dose-administration ledger entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdministrationRecord {
    pub id: i64,
    pub medication_id: Uuid,
    pub resident_id: Uuid,
    pub administered_at: NaiveDateTime,
    pub shift: Shift,
    pub action: AdministrationAction,
    pub staff_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAdministration {
    pub medication_id: Uuid,
    pub action: AdministrationAction,
    pub shift: Shift,
    pub staff_id: Uuid,
    pub notes: Option<String>,
    pub administered_at: NaiveDateTime,
}
