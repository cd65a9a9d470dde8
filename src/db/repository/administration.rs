use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{format_datetime, parse_datetime, parse_uuid};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

/// Joined administration row for the archive (medication name resolved).
#[derive(Debug, Clone)]
pub struct AdministrationArchiveRow {
    pub record: AdministrationRecord,
    pub medication_name: String,
    pub dosage: String,
}

pub fn insert_administration(
    conn: &Connection,
    medication_id: &Uuid,
    resident_id: &Uuid,
    input: &NewAdministration,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO administrations (medication_id, resident_id, administered_at, shift, action,
         staff_id, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            medication_id.to_string(),
            resident_id.to_string(),
            format_datetime(&input.administered_at),
            input.shift.as_str(),
            input.action.as_str(),
            input.staff_id.to_string(),
            input.notes,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_administration(
    conn: &Connection,
    id: i64,
) -> Result<Option<AdministrationRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, medication_id, resident_id, administered_at, shift, action, staff_id, notes
             FROM administrations WHERE id = ?1",
            params![id],
            administration_tuple,
        )
        .optional()?;

    row.map(administration_from_tuple).transpose()
}

/// Administrations matching the structured part of `filter`, newest first.
///
/// `search` is not applied here: it also matches resident and staff names,
/// which only the directories can resolve.
pub fn list_administrations(
    conn: &Connection,
    filter: &AdministrationFilter,
) -> Result<Vec<AdministrationArchiveRow>, DatabaseError> {
    let mut sql = String::from(
        "SELECT a.id, a.medication_id, a.resident_id, a.administered_at, a.shift, a.action,
                a.staff_id, a.notes, m.name, m.dosage
         FROM administrations a
         JOIN medications m ON m.id = a.medication_id
         WHERE 1=1",
    );

    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut param_idx = 1;

    if let Some(from) = &filter.date_from {
        sql.push_str(&format!(" AND date(a.administered_at) >= ?{param_idx}"));
        params_vec.push(Box::new(from.to_string()));
        param_idx += 1;
    }

    if let Some(to) = &filter.date_to {
        sql.push_str(&format!(" AND date(a.administered_at) <= ?{param_idx}"));
        params_vec.push(Box::new(to.to_string()));
        param_idx += 1;
    }

    if let Some(shift) = &filter.shift {
        sql.push_str(&format!(" AND a.shift = ?{param_idx}"));
        params_vec.push(Box::new(shift.as_str()));
        param_idx += 1;
    }

    if let Some(medication_id) = &filter.medication_id {
        sql.push_str(&format!(" AND a.medication_id = ?{param_idx}"));
        params_vec.push(Box::new(medication_id.to_string()));
        param_idx += 1;
    }

    if let Some(resident_id) = &filter.resident_id {
        sql.push_str(&format!(" AND a.resident_id = ?{param_idx}"));
        params_vec.push(Box::new(resident_id.to_string()));
    }

    sql.push_str(" ORDER BY a.administered_at DESC, a.id DESC");

    let mut stmt = conn.prepare(&sql)?;
    let param_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();

    let rows = stmt.query_map(param_refs.as_slice(), |row| {
        Ok((
            administration_tuple(row)?,
            row.get::<_, String>(8)?,
            row.get::<_, String>(9)?,
        ))
    })?;

    let mut out = Vec::new();
    for row in rows {
        let (tuple, medication_name, dosage) = row?;
        out.push(AdministrationArchiveRow {
            record: administration_from_tuple(tuple)?,
            medication_name,
            dosage,
        });
    }
    Ok(out)
}

type AdministrationTuple = (
    i64,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
);

fn administration_tuple(row: &rusqlite::Row<'_>) -> Result<AdministrationTuple, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn administration_from_tuple(
    tuple: AdministrationTuple,
) -> Result<AdministrationRecord, DatabaseError> {
    let (id, medication_id, resident_id, administered_at, shift, action, staff_id, notes) = tuple;
    Ok(AdministrationRecord {
        id,
        medication_id: parse_uuid(&medication_id)?,
        resident_id: parse_uuid(&resident_id)?,
        administered_at: parse_datetime(&administered_at)?,
        shift: Shift::from_str(&shift)?,
        action: AdministrationAction::from_str(&action)?,
        staff_id: parse_uuid(&staff_id)?,
        notes,
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::repository::test_support::*;
    use crate::db::sqlite::open_memory_database;

    fn input(med: Uuid, action: AdministrationAction, shift: Shift, day: u32) -> NewAdministration {
        NewAdministration {
            medication_id: med,
            action,
            shift,
            staff_id: Uuid::new_v4(),
            notes: None,
            administered_at: NaiveDate::from_ymd_opt(2026, 3, day)
                .unwrap()
                .and_hms_opt(8, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn insert_assigns_increasing_ids() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada", "Lovelace");
        let med = seed_medication(&conn, resident, "Sertraline", 30);

        let first = insert_administration(
            &conn,
            &med,
            &resident,
            &input(med, AdministrationAction::Administered, Shift::Morning, 1),
        )
        .unwrap();
        let second = insert_administration(
            &conn,
            &med,
            &resident,
            &input(med, AdministrationAction::Refused, Shift::Evening, 1),
        )
        .unwrap();
        assert!(second > first);

        let stored = get_administration(&conn, second).unwrap().unwrap();
        assert_eq!(stored.action, AdministrationAction::Refused);
        assert_eq!(stored.resident_id, resident);
    }

    #[test]
    fn list_filters_by_inclusive_date_range_and_shift() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada", "Lovelace");
        let med = seed_medication(&conn, resident, "Sertraline", 30);
        for (day, shift) in [(1, Shift::Morning), (2, Shift::Night), (3, Shift::Morning), (5, Shift::Morning)] {
            insert_administration(
                &conn,
                &med,
                &resident,
                &input(med, AdministrationAction::Administered, shift, day),
            )
            .unwrap();
        }

        let filter = AdministrationFilter {
            date_from: NaiveDate::from_ymd_opt(2026, 3, 1),
            date_to: NaiveDate::from_ymd_opt(2026, 3, 3),
            shift: Some(Shift::Morning),
            ..Default::default()
        };
        let rows = list_administrations(&conn, &filter).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].record.administered_at > rows[1].record.administered_at);
        assert_eq!(rows[0].medication_name, "Sertraline");
    }
}
