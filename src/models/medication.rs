use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::MedicationStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Medication {
    pub id: Uuid,
    pub resident_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub current_count: i64,
    pub status: MedicationStatus,
    pub prescribing_physician: Option<String>,
    pub special_instructions: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Medication {
    pub fn is_active(&self) -> bool {
        self.status == MedicationStatus::Active
    }
}

/// Input for registering a resident's prescription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMedication {
    pub resident_id: Uuid,
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub initial_count: i64,
    pub prescribing_physician: Option<String>,
    pub special_instructions: Option<String>,
}
