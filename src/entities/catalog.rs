// Equipment catalog - make/model definitions shared by batches and units.
// The (name, manufacturer, model) triple is the de-duplication key during
// import; entries are created on first observation and never updated
// automatically.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_iso;
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: i64,
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub spec: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCatalogEntry {
    pub name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub spec: Option<String>,
}

const COLUMNS: &str = "id, name, manufacturer, model, spec, created_at";

fn from_row(row: &Row) -> rusqlite::Result<CatalogEntry> {
    Ok(CatalogEntry {
        id: row.get(0)?,
        name: row.get(1)?,
        manufacturer: row.get(2)?,
        model: row.get(3)?,
        spec: row.get(4)?,
        created_at: super::required_ts(row.get(5)?)?,
    })
}

pub fn insert(conn: &Connection, new: &NewCatalogEntry) -> Result<CatalogEntry> {
    conn.execute(
        "INSERT INTO catalog_entries (name, manufacturer, model, spec, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![new.name, new.manufacturer, new.model, new.spec, now_iso()],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<CatalogEntry> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM catalog_entries WHERE id = ?1"),
        params![id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => crate::error::Error::not_found("catalog entry", id),
        other => other.into(),
    })
}

/// Exact business-key lookup. `IS` instead of `=` so absent manufacturer or
/// model matches NULL columns.
pub fn find_by_key(
    conn: &Connection,
    name: &str,
    manufacturer: Option<&str>,
    model: Option<&str>,
) -> Result<Option<CatalogEntry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM catalog_entries
         WHERE name = ?1 AND manufacturer IS ?2 AND model IS ?3"
    ))?;
    let mut rows = stmt.query_map(params![name, manufacturer, model], from_row)?;
    Ok(rows.next().transpose()?)
}

pub fn list(conn: &Connection, q: Option<&str>) -> Result<Vec<CatalogEntry>> {
    let mut stmt;
    let entries = match q {
        Some(q) => {
            stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM catalog_entries
                 WHERE name LIKE '%' || ?1 || '%'
                    OR manufacturer LIKE '%' || ?1 || '%'
                    OR model LIKE '%' || ?1 || '%'
                 ORDER BY name, id"
            ))?;
            stmt.query_map(params![q], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM catalog_entries ORDER BY name, id"
            ))?;
            stmt.query_map([], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(entries)
}
