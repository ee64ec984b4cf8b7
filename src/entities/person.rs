// Person entity - staff members who may hold equipment.
//
// Identity resolution during import prefers the national id and falls back
// to the employee number; both are unique when present, and neither is ever
// overwritten once populated.

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_iso;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: i64,
    pub national_id: Option<String>,
    pub name: String,
    pub role: Option<String>,
    pub site: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub employee_number: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a person, either directly or from an import row.
#[derive(Debug, Clone, Default)]
pub struct NewPerson {
    pub national_id: Option<String>,
    pub name: String,
    pub role: Option<String>,
    pub site: Option<String>,
    pub department: Option<String>,
    pub email: Option<String>,
    pub employee_number: Option<String>,
}

/// Filters for listing persons. All conditions are ANDed; `q` searches
/// name, national id and employee number.
#[derive(Debug, Clone, Default)]
pub struct PersonFilter {
    pub role: Option<String>,
    pub site: Option<String>,
    pub department: Option<String>,
    pub q: Option<String>,
}

const COLUMNS: &str = "id, national_id, name, role, site, department, email, \
                       employee_number, created_at, updated_at";

fn from_row(row: &Row) -> rusqlite::Result<Person> {
    Ok(Person {
        id: row.get(0)?,
        national_id: row.get(1)?,
        name: row.get(2)?,
        role: row.get(3)?,
        site: row.get(4)?,
        department: row.get(5)?,
        email: row.get(6)?,
        employee_number: row.get(7)?,
        created_at: super::required_ts(row.get(8)?)?,
        updated_at: super::required_ts(row.get(9)?)?,
    })
}

pub fn insert(conn: &Connection, new: &NewPerson) -> Result<Person> {
    let name = new.name.trim();
    if name.is_empty() {
        return Err(Error::validation("name", "name must not be blank"));
    }

    let now = now_iso();
    conn.execute(
        "INSERT INTO persons (national_id, name, role, site, department, email,
                              employee_number, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
        params![
            new.national_id,
            name,
            new.role,
            new.site,
            new.department,
            new.email,
            new.employee_number,
            now,
        ],
    )?;

    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Person> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM persons WHERE id = ?1"),
        params![id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("person", id),
        other => other.into(),
    })
}

pub fn find_by_national_id(conn: &Connection, national_id: &str) -> Result<Option<Person>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM persons WHERE national_id = ?1"
    ))?;
    let mut rows = stmt.query_map(params![national_id], from_row)?;
    Ok(rows.next().transpose()?)
}

pub fn find_by_employee_number(conn: &Connection, employee_number: &str) -> Result<Option<Person>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM persons WHERE employee_number = ?1"
    ))?;
    let mut rows = stmt.query_map(params![employee_number], from_row)?;
    Ok(rows.next().transpose()?)
}

/// Merge an import row into an existing record. The descriptive fields
/// (name, role, site, department, email) take the incoming values
/// unconditionally; the identifying fields are only filled when currently
/// blank, never replaced.
pub fn apply_import_update(conn: &Connection, current: &Person, incoming: &NewPerson) -> Result<Person> {
    let national_id = match &current.national_id {
        Some(existing) => Some(existing.clone()),
        None => incoming.national_id.clone(),
    };
    let employee_number = match &current.employee_number {
        Some(existing) => Some(existing.clone()),
        None => incoming.employee_number.clone(),
    };

    conn.execute(
        "UPDATE persons
         SET name = ?1, role = ?2, site = ?3, department = ?4, email = ?5,
             national_id = ?6, employee_number = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            incoming.name.trim(),
            incoming.role,
            incoming.site,
            incoming.department,
            incoming.email,
            national_id,
            employee_number,
            now_iso(),
            current.id,
        ],
    )?;

    get(conn, current.id)
}

pub fn list(conn: &Connection, filter: &PersonFilter) -> Result<Vec<Person>> {
    let mut sql = format!("SELECT {COLUMNS} FROM persons WHERE 1=1");
    let mut args: Vec<String> = Vec::new();

    if let Some(role) = &filter.role {
        sql.push_str(" AND role LIKE '%' || ? || '%'");
        args.push(role.clone());
    }
    if let Some(site) = &filter.site {
        sql.push_str(" AND site LIKE '%' || ? || '%'");
        args.push(site.clone());
    }
    if let Some(department) = &filter.department {
        sql.push_str(" AND department LIKE '%' || ? || '%'");
        args.push(department.clone());
    }
    if let Some(q) = &filter.q {
        sql.push_str(
            " AND (name LIKE '%' || ? || '%'
               OR national_id LIKE '%' || ? || '%'
               OR employee_number LIKE '%' || ? || '%')",
        );
        args.extend([q.clone(), q.clone(), q.clone()]);
    }
    sql.push_str(" ORDER BY name, id");

    let mut stmt = conn.prepare(&sql)?;
    let persons = stmt
        .query_map(params_from_iter(args), from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(persons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    fn new_person(name: &str) -> NewPerson {
        NewPerson {
            name: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_insert_and_get() {
        let conn = test_connection();

        let person = insert(
            &conn,
            &NewPerson {
                national_id: Some("123.456.789-01".to_string()),
                name: "Maria Souza".to_string(),
                role: Some("Analyst".to_string()),
                site: Some("Recife".to_string()),
                department: Some("IT".to_string()),
                email: Some("maria@example.org".to_string()),
                employee_number: Some("E-100".to_string()),
            },
        )
        .unwrap();

        let loaded = get(&conn, person.id).unwrap();
        assert_eq!(loaded.name, "Maria Souza");
        assert_eq!(loaded.national_id.as_deref(), Some("123.456.789-01"));
        assert_eq!(loaded.employee_number.as_deref(), Some("E-100"));
    }

    #[test]
    fn test_insert_blank_name_rejected() {
        let conn = test_connection();
        let result = insert(&conn, &new_person("   "));
        assert!(matches!(result, Err(Error::Validation { field: "name", .. })));
    }

    #[test]
    fn test_get_missing_is_not_found() {
        let conn = test_connection();
        let result = get(&conn, 42);
        assert!(matches!(result, Err(Error::NotFound { entity: "person", id: 42 })));
    }

    #[test]
    fn test_national_id_unique() {
        let conn = test_connection();

        let mut first = new_person("A");
        first.national_id = Some("111.111.111-11".to_string());
        insert(&conn, &first).unwrap();

        let mut second = new_person("B");
        second.national_id = Some("111.111.111-11".to_string());
        assert!(insert(&conn, &second).is_err());
    }

    #[test]
    fn test_find_by_identifiers() {
        let conn = test_connection();

        let mut new = new_person("Ana Lima");
        new.national_id = Some("222.222.222-22".to_string());
        new.employee_number = Some("E-7".to_string());
        let person = insert(&conn, &new).unwrap();

        assert_eq!(
            find_by_national_id(&conn, "222.222.222-22").unwrap().unwrap().id,
            person.id
        );
        assert_eq!(
            find_by_employee_number(&conn, "E-7").unwrap().unwrap().id,
            person.id
        );
        assert!(find_by_national_id(&conn, "999.999.999-99").unwrap().is_none());
    }

    #[test]
    fn test_apply_import_update_rules() {
        let conn = test_connection();

        let mut original = new_person("Joao");
        original.national_id = Some("333.333.333-33".to_string());
        original.role = Some("Technician".to_string());
        let person = insert(&conn, &original).unwrap();

        // Incoming row has a different national id and a new name/role.
        let incoming = NewPerson {
            national_id: Some("444.444.444-44".to_string()),
            name: "Joao Pereira".to_string(),
            role: Some("Supervisor".to_string()),
            employee_number: Some("E-55".to_string()),
            ..Default::default()
        };
        let updated = apply_import_update(&conn, &person, &incoming).unwrap();

        // Descriptive fields overwritten, identifier kept, blank identifier filled.
        assert_eq!(updated.name, "Joao Pereira");
        assert_eq!(updated.role.as_deref(), Some("Supervisor"));
        assert_eq!(updated.national_id.as_deref(), Some("333.333.333-33"));
        assert_eq!(updated.employee_number.as_deref(), Some("E-55"));
        assert!(updated.updated_at >= person.updated_at);
    }

    #[test]
    fn test_list_filters() {
        let conn = test_connection();

        let mut a = new_person("Carla Dias");
        a.site = Some("Olinda".to_string());
        a.role = Some("Analyst".to_string());
        insert(&conn, &a).unwrap();

        let mut b = new_person("Bruno Reis");
        b.site = Some("Recife".to_string());
        b.employee_number = Some("E-31".to_string());
        insert(&conn, &b).unwrap();

        let by_site = list(
            &conn,
            &PersonFilter {
                site: Some("Recife".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_site.len(), 1);
        assert_eq!(by_site[0].name, "Bruno Reis");

        let by_q = list(
            &conn,
            &PersonFilter {
                q: Some("E-31".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(by_q.len(), 1);

        let all = list(&conn, &PersonFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Bruno Reis"); // ordered by name
    }
}
