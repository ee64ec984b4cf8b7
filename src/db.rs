// SQLite schema and connection setup.
//
// Five tables mirror the domain: persons, catalog_entries, stock_batches,
// equipment_units, movements. Foreign keys enforce the
// catalog -> batch -> unit hierarchy and the person references; unit status
// is denormalized onto equipment_units, the movements table is the audit
// trail.

use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;

/// Open (or create) the database file with the pragmas the rest of the
/// crate relies on: WAL for crash recovery, foreign keys enforced.
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    // A writer that loses the race waits for the lock instead of erroring,
    // then sees the winner's committed state and fails its own guard.
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            national_id TEXT UNIQUE,
            name TEXT NOT NULL,
            role TEXT,
            site TEXT,
            department TEXT,
            email TEXT,
            employee_number TEXT UNIQUE,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS catalog_entries (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            manufacturer TEXT,
            model TEXT,
            spec TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS stock_batches (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            catalog_entry_id INTEGER NOT NULL REFERENCES catalog_entries(id),
            invoice_number TEXT,
            invoice_date TEXT,
            quantity INTEGER NOT NULL DEFAULT 1,
            unit_cost REAL NOT NULL DEFAULT 0.0,
            total_cost REAL NOT NULL DEFAULT 0.0,
            source TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS equipment_units (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            batch_id INTEGER NOT NULL REFERENCES stock_batches(id),
            asset_tag TEXT UNIQUE,
            serial TEXT,
            status TEXT NOT NULL DEFAULT 'available',
            holder_id INTEGER REFERENCES persons(id),
            assigned_at TEXT,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS movements (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            unit_id INTEGER NOT NULL REFERENCES equipment_units(id),
            from_person_id INTEGER REFERENCES persons(id),
            to_person_id INTEGER REFERENCES persons(id),
            kind TEXT NOT NULL,
            moved_at TEXT NOT NULL,
            note TEXT
        )",
        [],
    )?;

    // Business-key and hot-path indexes
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_persons_national_id ON persons(national_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_persons_employee_number ON persons(employee_number)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_catalog_key
         ON catalog_entries(name, manufacturer, model)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_units_status ON equipment_units(status)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_units_holder ON equipment_units(holder_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_movements_unit ON movements(unit_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_movements_moved_at ON movements(moved_at)",
        [],
    )?;

    Ok(())
}

/// Current time as the ISO-8601 string stored in TEXT columns.
pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

/// Parse a stored timestamp back. Stored values are always RFC 3339, so a
/// failure here means the column was edited outside the application.
pub fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
pub(crate) fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    setup_database(&conn).unwrap();
    conn
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        setup_database(&conn).unwrap();

        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN
                 ('persons', 'catalog_entries', 'stock_batches', 'equipment_units', 'movements')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }

    #[test]
    fn test_foreign_keys_enforced() {
        let conn = test_connection();

        // A batch pointing at a missing catalog entry must be rejected.
        let result = conn.execute(
            "INSERT INTO stock_batches (catalog_entry_id, created_at) VALUES (999, ?1)",
            [now_iso()],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_iso_round_trip() {
        let now = now_iso();
        let parsed = parse_iso(&now).unwrap();
        assert_eq!(parsed.to_rfc3339(), now);
        assert!(parse_iso("not a timestamp").is_none());
    }
}
