//! Shared service state behind every transport.
//!
//! `CustodyState` owns the per-medication lock registry, the event bus and
//! the injected collaborators. Every mutation follows the same shape:
//! take the medication locks, run one IMMEDIATE transaction, commit, then
//! derive alerts, publish events and notify. Nothing observable happens
//! before the commit.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::administration::{self, RecordedAdministration};
use crate::alerts::{self, AlertDraft};
use crate::archive::{self, AdministrationArchiveEntry, AuditArchiveEntry};
use crate::audit::{self, AuditView, ProgramScope};
use crate::config::ServerConfig;
use crate::custody::{self, CustodyVerification};
use crate::db::{self, now_timestamp};
use crate::directory::{
    require_staff, ClinicalReviewPolicy, ProgramDirectory, ResidentDirectory, ReviewPolicy,
    SqliteDirectory, StaffDirectory,
};
use crate::error::CustodyError;
use crate::events::{notify_best_effort, CustodyEvent, EventBus, NotificationSink, TracingNotifier};
use crate::inventory::{self, CountLocks};
use crate::models::enums::{AdministrationAction, AlertType, NotifySeverity, ReviewDecision};
use crate::models::*;

// ═══════════════════════════════════════════════════════════
// CustodyState
// ═══════════════════════════════════════════════════════════

pub struct CustodyState {
    db_path: PathBuf,
    busy_timeout: Duration,
    locks: CountLocks,
    bus: EventBus,
    residents: Arc<dyn ResidentDirectory>,
    staff: Arc<dyn StaffDirectory>,
    programs: Arc<dyn ProgramDirectory>,
    policy: Arc<dyn ReviewPolicy>,
    notifier: Arc<dyn NotificationSink>,
}

impl CustodyState {
    /// Open (creating and migrating if needed) the ledger at `db_path`.
    ///
    /// Directories default to the tables in the same database, review
    /// capability to nurses and admins, notifications to the log.
    pub fn open(db_path: impl Into<PathBuf>, busy_timeout: Duration) -> Result<Self, CustodyError> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                CustodyError::InvalidState(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        db::open_database(&db_path, busy_timeout)?;
        tracing::info!(path = %db_path.display(), "Ledger database ready");

        let directory = Arc::new(SqliteDirectory::new(&db_path, busy_timeout));
        Ok(Self {
            db_path,
            busy_timeout,
            locks: CountLocks::new(),
            bus: EventBus::new(),
            residents: directory.clone(),
            staff: directory.clone(),
            programs: directory,
            policy: Arc::new(ClinicalReviewPolicy),
            notifier: Arc::new(TracingNotifier),
        })
    }

    pub fn from_config(config: &ServerConfig) -> Result<Self, CustodyError> {
        Self::open(&config.db_path, config.busy_timeout)
    }

    pub fn with_directories(
        mut self,
        residents: Arc<dyn ResidentDirectory>,
        staff: Arc<dyn StaffDirectory>,
        programs: Arc<dyn ProgramDirectory>,
    ) -> Self {
        self.residents = residents;
        self.staff = staff;
        self.programs = programs;
        self
    }

    pub fn with_policy(mut self, policy: Arc<dyn ReviewPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationSink>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a fresh connection to the ledger.
    pub fn open_db(&self) -> Result<Connection, CustodyError> {
        Ok(db::open_database(&self.db_path, self.busy_timeout)?)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CustodyEvent> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    // ── Write path ──────────────────────────────────────────

    /// Run `f` in one IMMEDIATE transaction while holding the locks of
    /// `medication_ids`. The transaction commits only if `f` succeeds.
    ///
    /// `BEGIN IMMEDIATE` takes SQLite's database-wide write lock, so SQLite
    /// is what guarantees a single writer; the per-medication locks keep
    /// writers to one medication queued in-process, and `busy_timeout`
    /// bounds how long any writer waits on another medication's commit.
    fn write<T>(
        &self,
        medication_ids: &[Uuid],
        f: impl FnOnce(&Transaction<'_>) -> Result<T, CustodyError>,
    ) -> Result<T, CustodyError> {
        self.locks.with_locked(medication_ids, || {
            let mut conn = self.open_db()?;
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let out = f(&tx)?;
            tx.commit()?;
            Ok(out)
        })
    }

    /// Derive and persist the alert an event calls for, then publish both.
    ///
    /// Runs after the event's transaction committed; failures are logged
    /// and never undo the committed change.
    fn after_commit(&self, event: CustodyEvent) {
        let raised = self.raise_derived_alert(&event);
        self.bus.publish(event);
        match raised {
            Ok(Some(alert)) => {
                notify_best_effort(
                    self.notifier.as_ref(),
                    &alert.title,
                    notify_severity(alert.alert_type),
                );
                self.bus.publish(CustodyEvent::AlertRaised {
                    alert_id: alert.id,
                    alert_type: alert.alert_type,
                    title: alert.title,
                });
            }
            Ok(None) => {}
            Err(e) => tracing::error!(error = %e, "Alert generation failed"),
        }
    }

    fn raise_derived_alert(&self, event: &CustodyEvent) -> Result<Option<Alert>, CustodyError> {
        let draft = {
            let conn = self.open_db()?;
            alerts::derive_alert(&conn, self.residents.as_ref(), event)?
        };
        match draft {
            Some(draft) => {
                let alert = self.write(&[], |tx| alerts::generate(tx, &draft, now_timestamp()))?;
                tracing::info!(alert_id = alert.id, alert_type = %alert.alert_type, "Alert raised");
                Ok(Some(alert))
            }
            None => Ok(None),
        }
    }

    fn report_failure(&self, err: &CustodyError) {
        if err.is_conflict() {
            notify_best_effort(self.notifier.as_ref(), &err.user_message(), NotifySeverity::Warning);
        } else if matches!(err, CustodyError::Database(_) | CustodyError::LockPoisoned) {
            tracing::error!(error = %err, "Ledger operation failed");
        }
    }

    // ── MedicationRecord Store ──────────────────────────────

    pub fn register_medication(&self, input: &NewMedication) -> Result<Medication, CustodyError> {
        let medication = self.write(&[], |tx| {
            inventory::register_medication(tx, self.residents.as_ref(), input, now_timestamp())
        })?;
        tracing::info!(
            medication_id = %medication.id,
            resident_id = %medication.resident_id,
            initial_count = medication.current_count,
            "Medication registered"
        );
        self.bus.publish(CustodyEvent::MedicationStatusChanged {
            medication_id: medication.id,
            status: medication.status,
            current_count: medication.current_count,
        });
        Ok(medication)
    }

    pub fn discontinue_medication(
        &self,
        medication_id: &Uuid,
        staff_id: &Uuid,
    ) -> Result<Medication, CustodyError> {
        require_staff(self.staff.as_ref(), staff_id)?;
        let medication = self.write(&[*medication_id], |tx| {
            inventory::discontinue_medication(tx, medication_id)
        })?;
        tracing::info!(medication_id = %medication_id, staff_id = %staff_id, "Medication discontinued");
        self.publish_status(&medication);
        Ok(medication)
    }

    pub fn reactivate_medication(
        &self,
        medication_id: &Uuid,
        staff_id: &Uuid,
        restocked_count: i64,
    ) -> Result<Medication, CustodyError> {
        require_staff(self.staff.as_ref(), staff_id)?;
        let medication = self.write(&[*medication_id], |tx| {
            inventory::reactivate_medication(
                tx,
                medication_id,
                restocked_count,
                &staff_id.to_string(),
                now_timestamp(),
            )
        })?;
        tracing::info!(
            medication_id = %medication_id,
            staff_id = %staff_id,
            new_count = medication.current_count,
            "Medication reactivated"
        );
        self.publish_status(&medication);
        Ok(medication)
    }

    fn publish_status(&self, medication: &Medication) {
        self.bus.publish(CustodyEvent::MedicationStatusChanged {
            medication_id: medication.id,
            status: medication.status,
            current_count: medication.current_count,
        });
    }

    pub fn get_medication(&self, medication_id: &Uuid) -> Result<Medication, CustodyError> {
        inventory::require_medication(&self.open_db()?, medication_id)
    }

    pub fn get_current_count(&self, medication_id: &Uuid) -> Result<i64, CustodyError> {
        inventory::get_current_count(&self.open_db()?, medication_id)
    }

    pub fn list_medications(
        &self,
        resident_id: Option<&Uuid>,
        include_discontinued: bool,
    ) -> Result<Vec<Medication>, CustodyError> {
        inventory::list_medications(&self.open_db()?, resident_id, include_discontinued)
    }

    pub fn custody_history(&self, medication_id: &Uuid) -> Result<Vec<CustodyRecord>, CustodyError> {
        custody::get_custody_history(&self.open_db()?, medication_id)
    }

    pub fn verify_custody_chain(
        &self,
        medication_id: &Uuid,
    ) -> Result<CustodyVerification, CustodyError> {
        custody::verify_custody_chain(&self.open_db()?, medication_id)
    }

    // ── Administration Ledger ───────────────────────────────

    pub fn record_administration(
        &self,
        input: &NewAdministration,
    ) -> Result<RecordedAdministration, CustodyError> {
        let recorded = self
            .write(&[input.medication_id], |tx| {
                administration::record_administration(tx, self.staff.as_ref(), input)
            })
            .inspect_err(|e| self.report_failure(e))?;

        tracing::info!(
            administration_id = recorded.record.id,
            medication_id = %recorded.record.medication_id,
            action = %recorded.record.action,
            new_count = recorded.new_count,
            "Administration recorded"
        );
        self.after_commit(CustodyEvent::AdministrationRecorded {
            administration_id: recorded.record.id,
            medication_id: recorded.record.medication_id,
            resident_id: recorded.record.resident_id,
            action: recorded.record.action,
            new_count: recorded.new_count,
        });
        if recorded.record.action == AdministrationAction::Administered && recorded.new_count <= 0 {
            notify_best_effort(
                self.notifier.as_ref(),
                &format!(
                    "Count for medication {} is at {}",
                    recorded.record.medication_id, recorded.new_count
                ),
                NotifySeverity::Warning,
            );
        }
        Ok(recorded)
    }

    pub fn list_administrations(
        &self,
        filter: &AdministrationFilter,
    ) -> Result<Vec<AdministrationArchiveEntry>, CustodyError> {
        archive::list_administrations(
            &self.open_db()?,
            self.residents.as_ref(),
            self.staff.as_ref(),
            filter,
        )
    }

    // ── Audit Engine ────────────────────────────────────────

    pub fn submit_audit(&self, input: &NewAuditSubmission) -> Result<AuditView, CustodyError> {
        let medication_ids: Vec<Uuid> = input.entries.iter().map(|e| e.medication_id).collect();
        let audit = self
            .write(&medication_ids, |tx| {
                audit::submit_audit(tx, self.staff.as_ref(), input, now_timestamp())
            })
            .inspect_err(|e| self.report_failure(e))?;

        let view = AuditView::from(audit);
        tracing::info!(
            audit_id = view.submission.id,
            entries = view.submission.entries.len(),
            total_variance = view.total_variance,
            "Audit submitted"
        );
        self.after_commit(CustodyEvent::AuditSubmitted {
            audit_id: view.submission.id,
            submitted_by: view.submission.submitted_by,
            entry_count: view.submission.entries.len(),
            has_discrepancies: view.has_discrepancies,
        });
        notify_best_effort(
            self.notifier.as_ref(),
            &format!("Audit #{} submitted for review", view.submission.id),
            NotifySeverity::Info,
        );
        Ok(view)
    }

    pub fn get_audit(&self, audit_id: i64) -> Result<AuditView, CustodyError> {
        audit::get_audit(&self.open_db()?, audit_id)
    }

    pub fn list_pending_audits(&self, scope: ProgramScope) -> Result<Vec<AuditView>, CustodyError> {
        audit::list_pending_audits(&self.open_db()?, self.programs.as_ref(), scope)
    }

    pub fn list_decided_audits(
        &self,
        filter: &AuditArchiveFilter,
    ) -> Result<Vec<AuditArchiveEntry>, CustodyError> {
        archive::list_decided_audits(&self.open_db()?, self.staff.as_ref(), filter)
    }

    // ── Approval Gate ───────────────────────────────────────

    pub fn decide(&self, request: &ReviewRequest) -> Result<AuditView, CustodyError> {
        // Entries are immutable, so the lock set can be read before the transaction.
        let medication_ids = audit::get_audit(&self.open_db()?, request.audit_id)?
            .submission
            .medication_ids();

        let decided = self
            .write(&medication_ids, |tx| {
                audit::decide(
                    tx,
                    self.staff.as_ref(),
                    self.policy.as_ref(),
                    request,
                    now_timestamp(),
                )
            })
            .inspect_err(|e| {
                tracing::warn!(audit_id = request.audit_id, error = %e, "Audit decision rejected");
                self.report_failure(e);
            })?;

        let view = AuditView::from(decided);
        tracing::info!(
            audit_id = view.submission.id,
            status = %view.submission.status,
            reviewer = %request.reviewer_id,
            total_variance = view.total_variance,
            "Audit decided"
        );
        self.after_commit(CustodyEvent::AuditDecided {
            audit_id: view.submission.id,
            status: view.submission.status,
            reviewed_by: request.reviewer_id,
            has_discrepancies: view.has_discrepancies,
        });
        let verb = match request.decision {
            ReviewDecision::Approve => "approved",
            ReviewDecision::Deny => "denied",
        };
        notify_best_effort(
            self.notifier.as_ref(),
            &format!("Audit #{} {verb}", view.submission.id),
            NotifySeverity::Success,
        );
        Ok(view)
    }

    // ── Alert Generator ─────────────────────────────────────

    pub fn generate_alert(&self, draft: &AlertDraft) -> Result<Alert, CustodyError> {
        let alert = self.write(&[], |tx| alerts::generate(tx, draft, now_timestamp()))?;
        tracing::info!(alert_id = alert.id, alert_type = %alert.alert_type, "Alert raised");
        self.bus.publish(CustodyEvent::AlertRaised {
            alert_id: alert.id,
            alert_type: alert.alert_type,
            title: alert.title.clone(),
        });
        Ok(alert)
    }

    pub fn resolve_alert(&self, alert_id: i64) -> Result<Alert, CustodyError> {
        let alert = self.write(&[], |tx| alerts::resolve(tx, alert_id, now_timestamp()))?;
        tracing::info!(alert_id, "Alert resolved");
        self.bus.publish(CustodyEvent::AlertResolved { alert_id });
        Ok(alert)
    }

    pub fn list_alerts(&self, unresolved_only: bool) -> Result<Vec<Alert>, CustodyError> {
        alerts::list_alerts(&self.open_db()?, unresolved_only)
    }

    // ── Directory seeding ───────────────────────────────────

    /// Insert a resident into the built-in directory tables.
    pub fn seed_resident(&self, resident: &Resident) -> Result<(), CustodyError> {
        Ok(db::insert_resident(&self.open_db()?, resident)?)
    }

    /// Insert a staff member into the built-in directory tables.
    pub fn seed_staff(&self, member: &StaffMember) -> Result<(), CustodyError> {
        Ok(db::insert_staff(&self.open_db()?, member)?)
    }

    pub fn assign_resident_to_program(
        &self,
        program_id: &Uuid,
        resident_id: &Uuid,
    ) -> Result<(), CustodyError> {
        Ok(db::assign_resident_to_program(&self.open_db()?, program_id, resident_id)?)
    }
}

fn notify_severity(alert_type: AlertType) -> NotifySeverity {
    match alert_type {
        AlertType::Critical => NotifySeverity::Error,
        AlertType::Warning => NotifySeverity::Warning,
        AlertType::Info => NotifySeverity::Info,
    }
}

impl std::fmt::Debug for CustodyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustodyState")
            .field("db_path", &self.db_path)
            .field("busy_timeout", &self.busy_timeout)
            .field("tracked_medications", &self.locks.tracked())
            .finish_non_exhaustive()
    }
}
