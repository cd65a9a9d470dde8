//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection` (or an open `Transaction`,
//! which derefs to one) so the service layer decides transaction scope.

mod administration;
mod alert;
mod audit_submission;
mod custody;
mod directory;
mod medication;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use super::DatabaseError;

pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M:%S";

// Re-export all public items from sub-modules
pub use administration::*;
pub use alert::*;
pub use audit_submission::*;
pub use custody::*;
pub use directory::*;
pub use medication::*;

pub(crate) fn parse_uuid(value: &str) -> Result<Uuid, DatabaseError> {
    Uuid::parse_str(value).map_err(|e| DatabaseError::ConstraintViolation(e.to_string()))
}

pub(crate) fn parse_datetime(value: &str) -> Result<NaiveDateTime, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DATETIME_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid timestamp {value}: {e}")))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid date {value}: {e}")))
}

pub(crate) fn parse_time(value: &str) -> Result<NaiveTime, DatabaseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("Invalid time {value}: {e}")))
}

pub(crate) fn format_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Current wall-clock time truncated to storage precision.
pub fn now_timestamp() -> NaiveDateTime {
    let now = chrono::Utc::now().naive_utc();
    parse_datetime(&format_datetime(&now)).unwrap_or(now)
}
