use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::enums::{AuditStatus, Shift};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AdministrationFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub shift: Option<Shift>,
    pub search: Option<String>,
    pub medication_id: Option<Uuid>,
    pub resident_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct AuditArchiveFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub shift: Option<Shift>,
    /// Decided status to keep; `PendingReview` matches nothing.
    pub status: Option<AuditStatus>,
    pub search: Option<String>,
}
