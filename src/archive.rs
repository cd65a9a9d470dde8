//! Archive Index: read-only projection over committed history.
//!
//! Pending audits never appear here. Administration rows are enriched with
//! display names, which is also what free-text search matches against.

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::Connection;
use serde::Serialize;
use uuid::Uuid;

use crate::audit::AuditView;
use crate::db;
use crate::directory::{ResidentDirectory, StaffDirectory};
use crate::error::CustodyError;
use crate::models::{AdministrationFilter, AdministrationRecord, AuditArchiveFilter};

#[derive(Debug, Clone, Serialize)]
pub struct AdministrationArchiveEntry {
    #[serde(flatten)]
    pub record: AdministrationRecord,
    pub medication_name: String,
    pub dosage: String,
    pub resident_name: Option<String>,
    pub staff_name: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditArchiveEntry {
    #[serde(flatten)]
    pub audit: AuditView,
    pub submitted_by_name: Option<String>,
    pub reviewed_by_name: Option<String>,
}

/// Memoised directory lookups for one archive query.
struct NameCache<'a> {
    residents: Option<&'a dyn ResidentDirectory>,
    staff: &'a dyn StaffDirectory,
    resident_names: HashMap<Uuid, Option<String>>,
    staff_names: HashMap<Uuid, Option<String>>,
}

impl<'a> NameCache<'a> {
    fn new(residents: Option<&'a dyn ResidentDirectory>, staff: &'a dyn StaffDirectory) -> Self {
        Self {
            residents,
            staff,
            resident_names: HashMap::new(),
            staff_names: HashMap::new(),
        }
    }

    fn resident(&mut self, id: &Uuid) -> Result<Option<String>, CustodyError> {
        if let Some(name) = self.resident_names.get(id) {
            return Ok(name.clone());
        }
        let name = match self.residents {
            Some(dir) => dir.get_resident(id)?.map(|r| r.full_name()),
            None => None,
        };
        self.resident_names.insert(*id, name.clone());
        Ok(name)
    }

    fn staff(&mut self, id: &Uuid) -> Result<Option<String>, CustodyError> {
        if let Some(name) = self.staff_names.get(id) {
            return Ok(name.clone());
        }
        let name = self.staff.get_staff(id)?.map(|s| s.full_name);
        self.staff_names.insert(*id, name.clone());
        Ok(name)
    }
}

fn check_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), CustodyError> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => Err(CustodyError::Validation(format!(
            "date range starts ({from}) after it ends ({to})"
        ))),
        _ => Ok(()),
    }
}

fn normalized_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

fn matches(needle: &str, haystack: &[Option<&str>]) -> bool {
    haystack
        .iter()
        .flatten()
        .any(|field| field.to_lowercase().contains(needle))
}

/// Recorded administrations, newest first. Date bounds are inclusive.
pub fn list_administrations(
    conn: &Connection,
    residents: &dyn ResidentDirectory,
    staff: &dyn StaffDirectory,
    filter: &AdministrationFilter,
) -> Result<Vec<AdministrationArchiveEntry>, CustodyError> {
    check_range(filter.date_from, filter.date_to)?;
    let needle = normalized_search(filter.search.as_deref());
    let mut names = NameCache::new(Some(residents), staff);

    let mut out = Vec::new();
    for row in db::list_administrations(conn, filter)? {
        let resident_name = names.resident(&row.record.resident_id)?;
        let staff_name = names.staff(&row.record.staff_id)?;

        if let Some(needle) = &needle {
            let fields = [
                Some(row.medication_name.as_str()),
                row.record.notes.as_deref(),
                resident_name.as_deref(),
                staff_name.as_deref(),
            ];
            if !matches(needle, &fields) {
                continue;
            }
        }

        out.push(AdministrationArchiveEntry {
            record: row.record,
            medication_name: row.medication_name,
            dosage: row.dosage,
            resident_name,
            staff_name,
        });
    }
    Ok(out)
}

/// Approved and denied audits, newest first.
pub fn list_decided_audits(
    conn: &Connection,
    staff: &dyn StaffDirectory,
    filter: &AuditArchiveFilter,
) -> Result<Vec<AuditArchiveEntry>, CustodyError> {
    check_range(filter.date_from, filter.date_to)?;
    let needle = normalized_search(filter.search.as_deref());
    let mut names = NameCache::new(None, staff);

    let mut out = Vec::new();
    for audit in db::list_decided_audits(conn, filter)? {
        let submitted_by_name = names.staff(&audit.submitted_by)?;
        let reviewed_by_name = match &audit.reviewed_by {
            Some(id) => names.staff(id)?,
            None => None,
        };

        if let Some(needle) = &needle {
            let fields = [
                audit.notes.as_deref(),
                audit.review_notes.as_deref(),
                submitted_by_name.as_deref(),
            ];
            if !matches(needle, &fields) {
                continue;
            }
        }

        out.push(AuditArchiveEntry {
            audit: AuditView::from(audit),
            submitted_by_name,
            reviewed_by_name,
        });
    }
    Ok(out)
}
