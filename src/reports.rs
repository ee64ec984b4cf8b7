// Reporting Aggregator - read-only projections over the store and the
// ledger. No writes, no new invariants.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::entities::{person, unit, EquipmentUnit, Person, UnitStatus};
use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockSummary {
    pub total: i64,
    /// Counts for every status, zero included, keyed by the canonical
    /// status string.
    pub by_status: BTreeMap<String, i64>,
    pub total_value_invested: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueSummaryEntry {
    pub catalog_name: String,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub total_value: f64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonReport {
    pub person: Person,
    pub held_units: Vec<EquipmentUnit>,
}

pub fn stock_summary(conn: &Connection) -> Result<StockSummary> {
    let mut by_status: BTreeMap<String, i64> = UnitStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();

    let mut stmt =
        conn.prepare("SELECT status, COUNT(*) FROM equipment_units GROUP BY status")?;
    let counts = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    for (status, count) in counts {
        by_status.insert(status, count);
    }

    let total = by_status.values().sum();
    let total_value_invested: f64 = conn.query_row(
        "SELECT COALESCE(SUM(total_cost), 0.0) FROM stock_batches",
        [],
        |row| row.get(0),
    )?;

    Ok(StockSummary {
        total,
        by_status,
        total_value_invested,
    })
}

/// Invested value and batch count grouped by catalog entry.
pub fn value_summary(conn: &Connection) -> Result<Vec<ValueSummaryEntry>> {
    let mut stmt = conn.prepare(
        "SELECT c.name, c.manufacturer, c.model,
                COALESCE(SUM(b.total_cost), 0.0) AS total_value,
                COUNT(b.id) AS batch_count
         FROM catalog_entries c
         JOIN stock_batches b ON b.catalog_entry_id = c.id
         GROUP BY c.id
         ORDER BY total_value DESC, c.name",
    )?;
    let entries = stmt
        .query_map([], |row| {
            Ok(ValueSummaryEntry {
                catalog_name: row.get(0)?,
                manufacturer: row.get(1)?,
                model: row.get(2)?,
                total_value: row.get(3)?,
                count: row.get(4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

/// A person plus everything they currently hold.
pub fn person_report(conn: &Connection, person_id: i64) -> Result<PersonReport> {
    let person = person::get(conn, person_id)?;
    let held_units = unit::held_by(conn, person_id)?;
    Ok(PersonReport { person, held_units })
}

/// Convenience passthrough so report consumers have one module to call.
pub fn recent_movements(
    conn: &Connection,
    limit: u32,
) -> Result<Vec<crate::entities::Movement>> {
    crate::ledger::recent(conn, limit)
}
