use std::str::FromStr;

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::parse_uuid;
use crate::db::DatabaseError;
use crate::models::enums::*;
use crate::models::*;

pub fn insert_resident(conn: &Connection, resident: &Resident) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO residents (id, first_name, last_name) VALUES (?1, ?2, ?3)",
        params![resident.id.to_string(), resident.first_name, resident.last_name],
    )?;
    Ok(())
}

pub fn get_resident(conn: &Connection, id: &Uuid) -> Result<Option<Resident>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, first_name, last_name FROM residents WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, first_name, last_name)| {
        Ok(Resident {
            id: parse_uuid(&id)?,
            first_name,
            last_name,
        })
    })
    .transpose()
}

pub fn insert_staff(conn: &Connection, staff: &StaffMember) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO staff (id, full_name, role, job_title) VALUES (?1, ?2, ?3, ?4)",
        params![
            staff.id.to_string(),
            staff.full_name,
            staff.role.as_str(),
            staff.job_title,
        ],
    )?;
    Ok(())
}

pub fn get_staff(conn: &Connection, id: &Uuid) -> Result<Option<StaffMember>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, full_name, role, job_title FROM staff WHERE id = ?1",
            params![id.to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            },
        )
        .optional()?;

    row.map(|(id, full_name, role, job_title)| {
        Ok(StaffMember {
            id: parse_uuid(&id)?,
            full_name,
            role: StaffRole::from_str(&role)?,
            job_title,
        })
    })
    .transpose()
}

pub fn assign_resident_to_program(
    conn: &Connection,
    program_id: &Uuid,
    resident_id: &Uuid,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO program_assignments (program_id, resident_id) VALUES (?1, ?2)",
        params![program_id.to_string(), resident_id.to_string()],
    )?;
    Ok(())
}

pub fn get_program_residents(conn: &Connection, program_id: &Uuid) -> Result<Vec<Uuid>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT resident_id FROM program_assignments WHERE program_id = ?1",
    )?;
    let ids = stmt
        .query_map(params![program_id.to_string()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    ids.iter().map(|id| parse_uuid(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::test_support::*;
    use crate::db::sqlite::open_memory_database;

    #[test]
    fn staff_round_trip_keeps_role() {
        let conn = open_memory_database().unwrap();
        let id = seed_staff(&conn, "Grace Hopper", StaffRole::Nurse);
        let staff = get_staff(&conn, &id).unwrap().unwrap();
        assert_eq!(staff.role, StaffRole::Nurse);
        assert_eq!(staff.full_name, "Grace Hopper");
        assert!(get_staff(&conn, &Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn program_membership_is_idempotent() {
        let conn = open_memory_database().unwrap();
        let resident = seed_resident(&conn, "Ada", "Lovelace");
        let program = Uuid::new_v4();
        assign_resident_to_program(&conn, &program, &resident).unwrap();
        assign_resident_to_program(&conn, &program, &resident).unwrap();

        assert_eq!(get_program_residents(&conn, &program).unwrap(), vec![resident]);
        assert!(get_program_residents(&conn, &Uuid::new_v4()).unwrap().is_empty());
        assert_eq!(
            get_resident(&conn, &resident).unwrap().unwrap().full_name(),
            "Ada Lovelace"
        );
    }
}
