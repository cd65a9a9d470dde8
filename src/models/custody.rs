use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::CustodyCause;

/// One committed count change in a medication's hash-linked history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustodyRecord {
    pub id: i64,
    pub medication_id: Uuid,
    pub cause: CustodyCause,
    pub cause_ref: String,
    pub delta: i64,
    pub resulting_count: i64,
    pub recorded_at: NaiveDateTime,
    pub prev_hash: String,
    pub hash: String,
}
