// Movement Ledger - append-only log of unit transitions.
//
// The ledger is the audit trail; current status lives denormalized on the
// unit and is never derived from here in the hot path. `replayed_status`
// exists as a consistency check, not as a query path.

use rusqlite::{params, Connection};

use crate::db::now_iso;
use crate::entities::movement::{self, Movement, NewMovement};
use crate::entities::{MovementKind, UnitStatus};
use crate::error::Result;

const COLUMNS: &str = "id, unit_id, from_person_id, to_person_id, kind, moved_at, note";

/// Append one movement and return it with its assigned id. No update or
/// delete counterpart exists.
pub fn append(conn: &Connection, new: &NewMovement) -> Result<Movement> {
    conn.execute(
        "INSERT INTO movements (unit_id, from_person_id, to_person_id, kind, moved_at, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.unit_id,
            new.from_person_id,
            new.to_person_id,
            new.kind.as_str(),
            now_iso(),
            new.note,
        ],
    )?;

    let id = conn.last_insert_rowid();
    let record = conn.query_row(
        &format!("SELECT {COLUMNS} FROM movements WHERE id = ?1"),
        params![id],
        movement::from_row,
    )?;
    Ok(record)
}

/// Most recent movements first.
pub fn recent(conn: &Connection, limit: u32) -> Result<Vec<Movement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM movements ORDER BY moved_at DESC, id DESC LIMIT ?1"
    ))?;
    let movements = stmt
        .query_map(params![limit], movement::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(movements)
}

/// Full history of one unit, oldest first.
pub fn by_unit(conn: &Connection, unit_id: i64) -> Result<Vec<Movement>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM movements WHERE unit_id = ?1 ORDER BY moved_at, id"
    ))?;
    let movements = stmt
        .query_map(params![unit_id], movement::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(movements)
}

/// Derive the status a unit's history implies. `None` when the unit has no
/// movements (its creation status still stands). Used by consistency
/// checks and tests against the denormalized column.
pub fn replayed_status(conn: &Connection, unit_id: i64) -> Result<Option<UnitStatus>> {
    let history = by_unit(conn, unit_id)?;
    Ok(history.last().map(|m| match m.kind {
        MovementKind::Assignment | MovementKind::Transfer => UnitStatus::Assigned,
        MovementKind::Return => UnitStatus::Available,
        MovementKind::Retirement => UnitStatus::Retired,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::entities::{batch, catalog, unit, NewCatalogEntry, NewStockBatch, NewUnit};

    fn seed_unit(conn: &Connection) -> i64 {
        let entry = catalog::insert(
            conn,
            &NewCatalogEntry {
                name: "Radio".to_string(),
                ..Default::default()
            },
        )
        .unwrap();
        let batch = batch::insert(
            conn,
            &NewStockBatch {
                catalog_entry_id: entry.id,
                ..Default::default()
            },
        )
        .unwrap();
        unit::insert(
            conn,
            &NewUnit {
                batch_id: batch.id,
                asset_tag: None,
                serial: None,
                status: unit::UnitStatus::Available,
            },
        )
        .unwrap()
        .id
    }

    fn record(unit_id: i64, kind: MovementKind) -> NewMovement {
        NewMovement {
            unit_id,
            from_person_id: None,
            to_person_id: None,
            kind,
            note: None,
        }
    }

    #[test]
    fn test_append_assigns_ids_in_order() {
        let conn = test_connection();
        let unit_id = seed_unit(&conn);

        let first = append(&conn, &record(unit_id, MovementKind::Assignment)).unwrap();
        let second = append(&conn, &record(unit_id, MovementKind::Return)).unwrap();
        assert!(second.id > first.id);

        let history = by_unit(&conn, unit_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Assignment);
        assert_eq!(history[1].kind, MovementKind::Return);
    }

    #[test]
    fn test_recent_is_newest_first_and_limited() {
        let conn = test_connection();
        let unit_id = seed_unit(&conn);

        for _ in 0..3 {
            append(&conn, &record(unit_id, MovementKind::Assignment)).unwrap();
            append(&conn, &record(unit_id, MovementKind::Return)).unwrap();
        }

        let recent_two = recent(&conn, 2).unwrap();
        assert_eq!(recent_two.len(), 2);
        assert!(recent_two[0].id > recent_two[1].id);
        assert_eq!(recent_two[0].kind, MovementKind::Return);
    }

    #[test]
    fn test_replayed_status() {
        let conn = test_connection();
        let unit_id = seed_unit(&conn);

        assert_eq!(replayed_status(&conn, unit_id).unwrap(), None);

        append(&conn, &record(unit_id, MovementKind::Assignment)).unwrap();
        assert_eq!(
            replayed_status(&conn, unit_id).unwrap(),
            Some(UnitStatus::Assigned)
        );

        append(&conn, &record(unit_id, MovementKind::Return)).unwrap();
        assert_eq!(
            replayed_status(&conn, unit_id).unwrap(),
            Some(UnitStatus::Available)
        );

        append(&conn, &record(unit_id, MovementKind::Retirement)).unwrap();
        assert_eq!(
            replayed_status(&conn, unit_id).unwrap(),
            Some(UnitStatus::Retired)
        );
    }
}
