//! Alert Generator: advisory notifications derived from committed events.
//!
//! Alerts never feed back into ledger state; resolving one is a one-way
//! flag flip on the alert row only.

use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::Deserialize;

use crate::db;
use crate::directory::ResidentDirectory;
use crate::error::CustodyError;
use crate::events::CustodyEvent;
use crate::models::enums::{AdministrationAction, AlertSourceKind, AlertType, AuditStatus};
use crate::models::{Alert, AlertSource, AuditSubmission};

/// Alert content before it is persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AlertDraft {
    pub alert_type: AlertType,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub source: Option<AlertSource>,
}

pub fn generate(
    conn: &Connection,
    draft: &AlertDraft,
    at: NaiveDateTime,
) -> Result<Alert, CustodyError> {
    if draft.title.trim().is_empty() {
        return Err(CustodyError::Validation("alert title is required".into()));
    }
    let id = db::insert_alert(
        conn,
        &draft.alert_type,
        draft.title.trim(),
        &draft.description,
        draft.source.as_ref(),
        &at,
    )?;
    db::get_alert(conn, id)?.ok_or_else(|| CustodyError::not_found("Alert", id))
}

pub fn resolve(conn: &Connection, alert_id: i64, at: NaiveDateTime) -> Result<Alert, CustodyError> {
    let alert = db::get_alert(conn, alert_id)?
        .ok_or_else(|| CustodyError::not_found("Alert", alert_id))?;
    if alert.resolved || !db::mark_alert_resolved(conn, alert_id, &at)? {
        return Err(CustodyError::AlreadyResolved(alert_id));
    }
    db::get_alert(conn, alert_id)?.ok_or_else(|| CustodyError::not_found("Alert", alert_id))
}

pub fn list_alerts(conn: &Connection, unresolved_only: bool) -> Result<Vec<Alert>, CustodyError> {
    Ok(db::list_alerts(conn, unresolved_only)?)
}

/// The alert a committed event calls for, if any.
///
/// Refusals raise a warning. Approved audits with discrepancies raise a
/// critical alert when any count went down, otherwise a warning. Denied
/// audits with discrepancies raise an informational alert.
pub fn derive_alert(
    conn: &Connection,
    residents: &dyn ResidentDirectory,
    event: &CustodyEvent,
) -> Result<Option<AlertDraft>, CustodyError> {
    match event {
        CustodyEvent::AdministrationRecorded {
            administration_id,
            action: AdministrationAction::Refused,
            ..
        } => refusal_alert(conn, residents, *administration_id).map(Some),
        CustodyEvent::AuditDecided {
            audit_id,
            has_discrepancies: true,
            ..
        } => {
            let audit = db::get_audit_submission(conn, *audit_id)?
                .ok_or_else(|| CustodyError::not_found("Audit", audit_id))?;
            audit_alert(conn, &audit)
        }
        _ => Ok(None),
    }
}

fn refusal_alert(
    conn: &Connection,
    residents: &dyn ResidentDirectory,
    administration_id: i64,
) -> Result<AlertDraft, CustodyError> {
    let record = db::get_administration(conn, administration_id)?
        .ok_or_else(|| CustodyError::not_found("Administration", administration_id))?;
    let medication = db::get_medication(conn, &record.medication_id)?
        .ok_or_else(|| CustodyError::not_found("Medication", record.medication_id))?;
    let resident = residents
        .get_resident(&record.resident_id)?
        .map(|r| r.full_name())
        .unwrap_or_else(|| format!("Resident {}", record.resident_id));

    let mut description = format!(
        "{resident} refused {} {} during the {} shift.",
        medication.name, medication.dosage, record.shift
    );
    if let Some(notes) = record.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        description.push_str(&format!(" Notes: {notes}"));
    }

    Ok(AlertDraft {
        alert_type: AlertType::Warning,
        title: format!("Medication refused: {}", medication.name),
        description,
        source: Some(AlertSource {
            kind: AlertSourceKind::Administration,
            id: record.id,
        }),
    })
}

fn audit_alert(conn: &Connection, audit: &AuditSubmission) -> Result<Option<AlertDraft>, CustodyError> {
    if !audit.has_discrepancies() {
        return Ok(None);
    }
    let shortfall = audit.entries.iter().any(|e| e.variance < 0);

    let (alert_type, title) = match audit.status {
        AuditStatus::Approved if shortfall => (
            AlertType::Critical,
            format!("Count shortfall reconciled in audit #{}", audit.id),
        ),
        AuditStatus::Approved => (
            AlertType::Warning,
            format!("Count discrepancy reconciled in audit #{}", audit.id),
        ),
        AuditStatus::Denied => (
            AlertType::Info,
            format!("Audit #{} with discrepancies was denied", audit.id),
        ),
        AuditStatus::PendingReview => return Ok(None),
    };

    let mut lines = Vec::new();
    for entry in audit.entries.iter().filter(|e| e.has_discrepancy()) {
        let name = db::get_medication(conn, &entry.medication_id)?
            .map(|m| m.name)
            .unwrap_or_else(|| entry.medication_id.to_string());
        lines.push(format!(
            "{name}: expected {}, counted {} ({:+})",
            entry.previous_count, entry.current_count, entry.variance
        ));
    }

    Ok(Some(AlertDraft {
        alert_type,
        title,
        description: format!(
            "{} shift audit on {}, total variance {:+}. {}",
            audit.shift,
            audit.audit_date,
            audit.total_variance(),
            lines.join("; ")
        ),
        source: Some(AlertSource {
            kind: AlertSourceKind::Audit,
            id: audit.id,
        }),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::AuditSetup;
    use crate::models::enums::{ReviewDecision, Shift};
    use crate::models::NewAdministration;

    fn draft(title: &str) -> AlertDraft {
        AlertDraft {
            alert_type: AlertType::Warning,
            title: title.into(),
            description: "Fridge temperature log missing".into(),
            source: None,
        }
    }

    fn decided_event(audit: &AuditSubmission) -> CustodyEvent {
        CustodyEvent::AuditDecided {
            audit_id: audit.id,
            status: audit.status,
            reviewed_by: audit.reviewed_by.unwrap_or_default(),
            has_discrepancies: audit.has_discrepancies(),
        }
    }

    #[test]
    fn generate_and_resolve_once() {
        let s = AuditSetup::new(&[]);
        let alert = generate(&s.conn, &draft("Manual check"), db::now_timestamp()).unwrap();
        assert!(!alert.resolved);
        assert!(alert.source.is_none());

        let resolved = resolve(&s.conn, alert.id, db::now_timestamp()).unwrap();
        assert!(resolved.resolved);
        assert!(resolved.resolved_at.is_some());

        assert!(matches!(
            resolve(&s.conn, alert.id, db::now_timestamp()),
            Err(CustodyError::AlreadyResolved(id)) if id == alert.id
        ));
        assert!(matches!(
            resolve(&s.conn, 777, db::now_timestamp()),
            Err(CustodyError::NotFound { .. })
        ));
    }

    #[test]
    fn blank_title_rejected() {
        let s = AuditSetup::new(&[]);
        assert!(matches!(
            generate(&s.conn, &draft("   "), db::now_timestamp()),
            Err(CustodyError::Validation(_))
        ));
    }

    #[test]
    fn unresolved_filter() {
        let s = AuditSetup::new(&[]);
        let a = generate(&s.conn, &draft("One"), db::now_timestamp()).unwrap();
        generate(&s.conn, &draft("Two"), db::now_timestamp()).unwrap();
        resolve(&s.conn, a.id, db::now_timestamp()).unwrap();

        assert_eq!(list_alerts(&s.conn, false).unwrap().len(), 2);
        let open = list_alerts(&s.conn, true).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Two");
    }

    #[test]
    fn refusal_derives_warning_with_source() {
        let s = AuditSetup::new(&[10]);
        let out = crate::administration::record_administration(
            &s.conn,
            &s.dir,
            &NewAdministration {
                medication_id: s.meds[0],
                action: AdministrationAction::Refused,
                shift: Shift::Night,
                staff_id: s.counter,
                notes: Some("spat out tablet".into()),
                administered_at: db::now_timestamp(),
            },
        )
        .unwrap();

        let event = CustodyEvent::AdministrationRecorded {
            administration_id: out.record.id,
            medication_id: s.meds[0],
            resident_id: s.resident,
            action: AdministrationAction::Refused,
            new_count: out.new_count,
        };
        let draft = derive_alert(&s.conn, &s.dir, &event).unwrap().unwrap();
        assert_eq!(draft.alert_type, AlertType::Warning);
        assert!(draft.description.starts_with("Mabel Frost refused Med 0"));
        assert!(draft.description.contains("spat out tablet"));
        assert_eq!(
            draft.source,
            Some(AlertSource {
                kind: AlertSourceKind::Administration,
                id: out.record.id
            })
        );
    }

    #[test]
    fn administered_and_held_derive_nothing() {
        let s = AuditSetup::new(&[10]);
        for action in [AdministrationAction::Administered, AdministrationAction::Held] {
            let event = CustodyEvent::AdministrationRecorded {
                administration_id: 1,
                medication_id: s.meds[0],
                resident_id: s.resident,
                action,
                new_count: 9,
            };
            assert!(derive_alert(&s.conn, &s.dir, &event).unwrap().is_none());
        }
    }

    #[test]
    fn approved_shortfall_is_critical() {
        let s = AuditSetup::new(&[29, 10]);
        let audit = s.submit(s.counter, &[(0, 29, 27), (1, 10, 11)]).unwrap();
        let decided = s.decide(audit.id, s.nurse, ReviewDecision::Approve).unwrap();

        let draft = derive_alert(&s.conn, &s.dir, &decided_event(&decided)).unwrap().unwrap();
        assert_eq!(draft.alert_type, AlertType::Critical);
        assert!(draft.description.contains("Med 0: expected 29, counted 27 (-2)"));
        assert!(draft.description.contains("total variance -1"));
        assert_eq!(draft.source.unwrap().kind, AlertSourceKind::Audit);
    }

    #[test]
    fn approved_surplus_is_warning() {
        let s = AuditSetup::new(&[10]);
        let audit = s.submit(s.counter, &[(0, 10, 12)]).unwrap();
        let decided = s.decide(audit.id, s.nurse, ReviewDecision::Approve).unwrap();
        let draft = derive_alert(&s.conn, &s.dir, &decided_event(&decided)).unwrap().unwrap();
        assert_eq!(draft.alert_type, AlertType::Warning);
    }

    #[test]
    fn denied_discrepancy_is_info_and_clean_audit_is_silent() {
        let s = AuditSetup::new(&[10, 5]);
        let audit = s.submit(s.counter, &[(0, 10, 7)]).unwrap();
        let denied = s.decide(audit.id, s.admin, ReviewDecision::Deny).unwrap();
        let draft = derive_alert(&s.conn, &s.dir, &decided_event(&denied)).unwrap().unwrap();
        assert_eq!(draft.alert_type, AlertType::Info);

        let clean = s.submit(s.counter, &[(1, 5, 5)]).unwrap();
        let approved = s.decide(clean.id, s.nurse, ReviewDecision::Approve).unwrap();
        assert!(derive_alert(&s.conn, &s.dir, &decided_event(&approved)).unwrap().is_none());
    }
}
