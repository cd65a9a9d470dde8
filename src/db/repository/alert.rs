use std::str::FromStr;

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

const ALERT_COLUMNS: &str =
    "id, alert_type, title, description, source_kind, source_id, created_at, resolved, resolved_at";

pub fn insert_alert(
    conn: &Connection,
    alert_type: &AlertType,
    title: &str,
    description: &str,
    source: Option<&AlertSource>,
    created_at: &NaiveDateTime,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO alerts (alert_type, title, description, source_kind, source_id, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            alert_type.as_str(),
            title,
            description,
            source.map(|s| s.kind.as_str()),
            source.map(|s| s.id),
            format_datetime(created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_alert(conn: &Connection, id: i64) -> Result<Option<Alert>, DatabaseError> {
    let row = conn
        .query_row(
            &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
            params![id],
            alert_tuple,
        )
        .optional()?;

    row.map(alert_from_tuple).transpose()
}

/// Alerts newest first, optionally only the unresolved ones.
pub fn list_alerts(conn: &Connection, unresolved_only: bool) -> Result<Vec<Alert>, DatabaseError> {
    let sql = if unresolved_only {
        format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE resolved = 0 ORDER BY id DESC")
    } else {
        format!("SELECT {ALERT_COLUMNS} FROM alerts ORDER BY id DESC")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], alert_tuple)?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter().map(alert_from_tuple).collect()
}

/// Flag an alert resolved. Returns `false` when it was already resolved or unknown.
pub fn mark_alert_resolved(
    conn: &Connection,
    id: i64,
    resolved_at: &NaiveDateTime,
) -> Result<bool, DatabaseError> {
    let updated = conn.execute(
        "UPDATE alerts SET resolved = 1, resolved_at = ?1 WHERE id = ?2 AND resolved = 0",
        params![format_datetime(resolved_at), id],
    )?;
    Ok(updated == 1)
}

type AlertTuple = (
    i64,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    String,
    i32,
    Option<String>,
);

fn alert_tuple(row: &rusqlite::Row<'_>) -> Result<AlertTuple, rusqlite::Error> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
    ))
}

fn alert_from_tuple(tuple: AlertTuple) -> Result<Alert, DatabaseError> {
    let (id, alert_type, title, description, source_kind, source_id, created_at, resolved, resolved_at) =
        tuple;

    let source = match (source_kind, source_id) {
        (Some(kind), Some(id)) => Some(AlertSource {
            kind: AlertSourceKind::from_str(&kind)?,
            id,
        }),
        _ => None,
    };

    Ok(Alert {
        id,
        alert_type: AlertType::from_str(&alert_type)?,
        title,
        description,
        source,
        created_at: parse_datetime(&created_at)?,
        resolved: resolved != 0,
        resolved_at: resolved_at.as_deref().map(parse_datetime).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::now_timestamp;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn insert_and_resolve_once() {
        let conn = open_memory_database().unwrap();
        let source = AlertSource {
            kind: AlertSourceKind::Administration,
            id: 7,
        };
        let id = insert_alert(
            &conn,
            &AlertType::Warning,
            "Dose refused",
            "Resident refused evening dose",
            Some(&source),
            &now_timestamp(),
        )
        .unwrap();

        let alert = get_alert(&conn, id).unwrap().unwrap();
        assert_eq!(alert.source, Some(source));
        assert!(!alert.resolved);

        assert!(mark_alert_resolved(&conn, id, &now_timestamp()).unwrap());
        assert!(!mark_alert_resolved(&conn, id, &now_timestamp()).unwrap());
        let alert = get_alert(&conn, id).unwrap().unwrap();
        assert!(alert.resolved);
        assert!(alert.resolved_at.is_some());
    }

    #[test]
    fn unresolved_filter() {
        let conn = open_memory_database().unwrap();
        let a = insert_alert(&conn, &AlertType::Info, "a", "a", None, &now_timestamp()).unwrap();
        let b = insert_alert(&conn, &AlertType::Critical, "b", "b", None, &now_timestamp()).unwrap();
        mark_alert_resolved(&conn, a, &now_timestamp()).unwrap();

        let open = list_alerts(&conn, true).unwrap();
        assert_eq!(open.iter().map(|x| x.id).collect::<Vec<_>>(), vec![b]);
        assert_eq!(list_alerts(&conn, false).unwrap().len(), 2);
    }
}
