// Asset Lifecycle State Machine.
//
// Two transitions exist: assign (available -> assigned) and return
// (assigned -> available). Each runs as one IMMEDIATE transaction covering
// the guarded unit update and the ledger append, so a failure of either
// rolls back both. Maintenance and retirement are data values only; adding
// their transitions must follow the same pattern (precondition on current
// status, atomic status + ledger update).

use rusqlite::{params, Connection, TransactionBehavior};
use tracing::info;

use crate::db::now_iso;
use crate::entities::movement::NewMovement;
use crate::entities::{person, unit, EquipmentUnit, MovementKind, UnitStatus};
use crate::error::{Error, Result};
use crate::ledger;

/// Assign an available unit to a person.
///
/// The IMMEDIATE transaction takes the write lock up front, so the status
/// read and the guarded update cannot interleave with another writer: of
/// two concurrent assigns, exactly one commits and the other reports
/// `InvalidTransition` with the status it observed.
pub fn assign_unit(
    conn: &mut Connection,
    unit_id: i64,
    person_id: i64,
    note: Option<&str>,
) -> Result<EquipmentUnit> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = unit::get(&tx, unit_id)?;
    person::get(&tx, person_id)?;

    let changed = tx.execute(
        "UPDATE equipment_units
         SET status = 'assigned', holder_id = ?1, assigned_at = ?2
         WHERE id = ?3 AND status = 'available'",
        params![person_id, now_iso(), unit_id],
    )?;
    if changed == 0 {
        // Guard failed: the unit is not available. Dropping the
        // transaction rolls everything back.
        return Err(Error::InvalidTransition {
            unit_id,
            current: current.status,
        });
    }

    ledger::append(
        &tx,
        &NewMovement {
            unit_id,
            from_person_id: None,
            to_person_id: Some(person_id),
            kind: MovementKind::Assignment,
            note: note.map(str::to_string),
        },
    )?;

    let updated = unit::get(&tx, unit_id)?;
    tx.commit()?;

    info!(unit_id, person_id, "unit assigned");
    Ok(updated)
}

/// Return an assigned unit to stock. Captures the previous holder for the
/// ledger before clearing it.
pub fn return_unit(conn: &mut Connection, unit_id: i64, note: Option<&str>) -> Result<EquipmentUnit> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let current = unit::get(&tx, unit_id)?;
    let previous_holder = current.holder_id;

    let changed = tx.execute(
        "UPDATE equipment_units
         SET status = 'available', holder_id = NULL, assigned_at = NULL
         WHERE id = ?1 AND status = 'assigned'",
        params![unit_id],
    )?;
    if changed == 0 {
        return Err(Error::InvalidTransition {
            unit_id,
            current: current.status,
        });
    }

    ledger::append(
        &tx,
        &NewMovement {
            unit_id,
            from_person_id: previous_holder,
            to_person_id: None,
            kind: MovementKind::Return,
            note: note.map(str::to_string),
        },
    )?;

    let updated = unit::get(&tx, unit_id)?;
    tx.commit()?;

    info!(unit_id, previous_holder, "unit returned");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::setup_database;
    use crate::entities::{batch, catalog, NewCatalogEntry, NewPerson, NewStockBatch, NewUnit};
    use crate::ledger::replayed_status;

    fn test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        setup_database(&conn).unwrap();
        conn
    }

    fn seed_unit(conn: &Connection) -> i64 {
        let entry = catalog::insert(
            conn,
            &NewCatalogEntry {
                name: "Notebook".to_string(),
                manufacturer: Some("Dell".to_string()),
                model: Some("Latitude".to_string()),
                spec: None,
            },
        )
        .unwrap();
        let batch = batch::insert(
            conn,
            &NewStockBatch {
                catalog_entry_id: entry.id,
                quantity: 1,
                unit_cost: 3500.0,
                total_cost: 3500.0,
                ..Default::default()
            },
        )
        .unwrap();
        unit::insert(
            conn,
            &NewUnit {
                batch_id: batch.id,
                asset_tag: Some("PAT-100".to_string()),
                serial: Some("SN-100".to_string()),
                status: UnitStatus::Available,
            },
        )
        .unwrap()
        .id
    }

    fn seed_person(conn: &Connection, name: &str) -> i64 {
        person::insert(
            conn,
            &NewPerson {
                name: name.to_string(),
                ..Default::default()
            },
        )
        .unwrap()
        .id
    }

    #[test]
    fn test_assign_sets_all_three_fields_together() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);
        let person_id = seed_person(&conn, "Maria");

        let assigned = assign_unit(&mut conn, unit_id, person_id, Some("onboarding kit")).unwrap();

        assert_eq!(assigned.status, UnitStatus::Assigned);
        assert_eq!(assigned.holder_id, Some(person_id));
        assert!(assigned.assigned_at.is_some());
        assert!(assigned.holder_state_consistent());

        let history = ledger::by_unit(&conn, unit_id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].kind, MovementKind::Assignment);
        assert_eq!(history[0].to_person_id, Some(person_id));
        assert_eq!(history[0].from_person_id, None);
        assert_eq!(history[0].note.as_deref(), Some("onboarding kit"));
    }

    #[test]
    fn test_assign_then_return_restores_unit() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);
        let person_id = seed_person(&conn, "Maria");

        assign_unit(&mut conn, unit_id, person_id, None).unwrap();
        let returned = return_unit(&mut conn, unit_id, Some("left the team")).unwrap();

        assert_eq!(returned.status, UnitStatus::Available);
        assert_eq!(returned.holder_id, None);
        assert_eq!(returned.assigned_at, None);
        assert!(returned.holder_state_consistent());

        // Exactly two records, assignment then return, same unit.
        let history = ledger::by_unit(&conn, unit_id).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Assignment);
        assert_eq!(history[1].kind, MovementKind::Return);
        assert_eq!(history[1].from_person_id, Some(person_id));
        assert!(history.iter().all(|m| m.unit_id == unit_id));
    }

    #[test]
    fn test_assign_assigned_unit_is_invalid_and_writes_nothing() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);
        let first = seed_person(&conn, "Maria");
        let second = seed_person(&conn, "Bruno");

        assign_unit(&mut conn, unit_id, first, None).unwrap();
        let result = assign_unit(&mut conn, unit_id, second, None);

        match result {
            Err(Error::InvalidTransition { current, .. }) => {
                assert_eq!(current, UnitStatus::Assigned)
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }

        // State and ledger untouched by the failed call.
        let unit = unit::get(&conn, unit_id).unwrap();
        assert_eq!(unit.holder_id, Some(first));
        assert_eq!(ledger::by_unit(&conn, unit_id).unwrap().len(), 1);
    }

    #[test]
    fn test_return_available_unit_is_invalid_and_writes_nothing() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);

        let result = return_unit(&mut conn, unit_id, None);
        match result {
            Err(Error::InvalidTransition { current, .. }) => {
                assert_eq!(current, UnitStatus::Available)
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert!(ledger::by_unit(&conn, unit_id).unwrap().is_empty());
    }

    #[test]
    fn test_missing_unit_and_person_are_not_found() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);
        let person_id = seed_person(&conn, "Maria");

        assert!(matches!(
            assign_unit(&mut conn, 999, person_id, None),
            Err(Error::NotFound { entity: "equipment unit", .. })
        ));
        assert!(matches!(
            assign_unit(&mut conn, unit_id, 999, None),
            Err(Error::NotFound { entity: "person", .. })
        ));
        assert!(matches!(
            return_unit(&mut conn, 999, None),
            Err(Error::NotFound { entity: "equipment unit", .. })
        ));

        // Failed preconditions leave no ledger entries behind.
        assert!(ledger::by_unit(&conn, unit_id).unwrap().is_empty());
    }

    #[test]
    fn test_denormalized_status_matches_replay() {
        let mut conn = test_db();
        let unit_id = seed_unit(&conn);
        let person_id = seed_person(&conn, "Maria");

        assert_eq!(replayed_status(&conn, unit_id).unwrap(), None);

        assign_unit(&mut conn, unit_id, person_id, None).unwrap();
        assert_eq!(
            replayed_status(&conn, unit_id).unwrap(),
            Some(unit::get(&conn, unit_id).unwrap().status)
        );

        return_unit(&mut conn, unit_id, None).unwrap();
        assert_eq!(
            replayed_status(&conn, unit_id).unwrap(),
            Some(unit::get(&conn, unit_id).unwrap().status)
        );
    }

    #[test]
    fn test_assign_is_not_allowed_from_maintenance_or_retired() {
        let mut conn = test_db();
        let person_id = seed_person(&conn, "Maria");

        for status in [UnitStatus::InMaintenance, UnitStatus::Retired] {
            let unit_id = {
                let entry = catalog::insert(
                    &conn,
                    &NewCatalogEntry {
                        name: format!("Scanner {status}"),
                        ..Default::default()
                    },
                )
                .unwrap();
                let batch = batch::insert(
                    &conn,
                    &NewStockBatch {
                        catalog_entry_id: entry.id,
                        ..Default::default()
                    },
                )
                .unwrap();
                unit::insert(
                    &conn,
                    &NewUnit {
                        batch_id: batch.id,
                        asset_tag: None,
                        serial: None,
                        status,
                    },
                )
                .unwrap()
                .id
            };

            match assign_unit(&mut conn, unit_id, person_id, None) {
                Err(Error::InvalidTransition { current, .. }) => assert_eq!(current, status),
                other => panic!("expected InvalidTransition, got {other:?}"),
            }
        }
    }
}
