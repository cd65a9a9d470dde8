use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::enums::{AlertSourceKind, AlertType};

/// Ledger event an alert was raised from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertSource {
    pub kind: AlertSourceKind,
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub alert_type: AlertType,
    pub title: String,
    pub description: String,
    pub source: Option<AlertSource>,
    pub created_at: NaiveDateTime,
    pub resolved: bool,
    pub resolved_at: Option<NaiveDateTime>,
}
