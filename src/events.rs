//! Post-commit event bus and user-facing notifications.
//!
//! Events are published only after the writing transaction commits, so an
//! observer can never see a change that was later rolled back.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::enums::{
    AdministrationAction, AlertType, AuditStatus, MedicationStatus, NotifySeverity,
};

/// Broadcast buffer; slow observers past this lag drop the oldest events.
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustodyEvent {
    AdministrationRecorded {
        administration_id: i64,
        medication_id: Uuid,
        resident_id: Uuid,
        action: AdministrationAction,
        new_count: i64,
    },
    AuditSubmitted {
        audit_id: i64,
        submitted_by: Uuid,
        entry_count: usize,
        has_discrepancies: bool,
    },
    AuditDecided {
        audit_id: i64,
        status: AuditStatus,
        reviewed_by: Uuid,
        has_discrepancies: bool,
    },
    AlertRaised {
        alert_id: i64,
        alert_type: AlertType,
        title: String,
    },
    AlertResolved {
        alert_id: i64,
    },
    MedicationStatusChanged {
        medication_id: Uuid,
        status: MedicationStatus,
        current_count: i64,
    },
}

/// Fan-out channel for committed ledger events.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CustodyEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CustodyEvent> {
        self.sender.subscribe()
    }

    /// Publish to current subscribers. Having none is not an error.
    pub fn publish(&self, event: CustodyEvent) {
        if let Err(broadcast::error::SendError(event)) = self.sender.send(event) {
            tracing::trace!(?event, "No event subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

// ═══════════════════════════════════════════════════════════
// Notification sink
// ═══════════════════════════════════════════════════════════

#[derive(Debug, thiserror::Error)]
#[error("Notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// User-facing toast delivery. Failures never fail the workflow.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, message: &str, severity: NotifySeverity) -> Result<(), NotifyError>;
}

/// Default sink: writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn notify(&self, message: &str, severity: NotifySeverity) -> Result<(), NotifyError> {
        match severity {
            NotifySeverity::Error => tracing::error!(%severity, "{message}"),
            NotifySeverity::Warning => tracing::warn!(%severity, "{message}"),
            NotifySeverity::Success | NotifySeverity::Info => tracing::info!(%severity, "{message}"),
        }
        Ok(())
    }
}

/// Deliver a notification, logging instead of propagating failure.
pub fn notify_best_effort(sink: &dyn NotificationSink, message: &str, severity: NotifySeverity) {
    if let Err(e) = sink.notify(message, severity) {
        tracing::warn!(error = %e, "Notification dropped");
    }
}
