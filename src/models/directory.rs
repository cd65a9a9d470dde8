use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::StaffRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
}

impl Resident {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Uuid,
    pub full_name: String,
    pub role: StaffRole,
    pub job_title: Option<String>,
}
