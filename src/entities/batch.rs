// Stock batch - one receiving event (typically one invoice line) for one
// catalog entry. Immutable after creation; many batches may point at the
// same catalog entry.

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

use crate::db::now_iso;
use crate::error::{Error, Result};
use crate::entities::unit::{self, EquipmentUnit, NewUnit, UnitStatus};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockBatch {
    pub id: i64,
    pub catalog_entry_id: i64,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub quantity: i64,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub source: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewStockBatch {
    pub catalog_entry_id: i64,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub quantity: i64,
    pub unit_cost: f64,
    pub total_cost: f64,
    pub source: Option<String>,
}

/// One serialized item received with a batch.
#[derive(Debug, Clone, Default)]
pub struct BatchUnitSpec {
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
}

const COLUMNS: &str = "id, catalog_entry_id, invoice_number, invoice_date, quantity, \
                       unit_cost, total_cost, source, created_at";

fn from_row(row: &Row) -> rusqlite::Result<StockBatch> {
    let invoice_date: Option<String> = row.get(3)?;
    Ok(StockBatch {
        id: row.get(0)?,
        catalog_entry_id: row.get(1)?,
        invoice_number: row.get(2)?,
        invoice_date: invoice_date.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()),
        quantity: row.get(4)?,
        unit_cost: row.get(5)?,
        total_cost: row.get(6)?,
        source: row.get(7)?,
        created_at: super::required_ts(row.get(8)?)?,
    })
}

pub fn insert(conn: &Connection, new: &NewStockBatch) -> Result<StockBatch> {
    conn.execute(
        "INSERT INTO stock_batches (catalog_entry_id, invoice_number, invoice_date,
                                    quantity, unit_cost, total_cost, source, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            new.catalog_entry_id,
            new.invoice_number,
            new.invoice_date.map(|d| d.format("%Y-%m-%d").to_string()),
            new.quantity.max(1),
            new.unit_cost,
            new.total_cost,
            new.source,
            now_iso(),
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<StockBatch> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM stock_batches WHERE id = ?1"),
        params![id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("stock batch", id),
        other => other.into(),
    })
}

pub fn list(conn: &Connection, catalog_entry_id: Option<i64>) -> Result<Vec<StockBatch>> {
    let mut stmt;
    let batches = match catalog_entry_id {
        Some(entry_id) => {
            stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM stock_batches WHERE catalog_entry_id = ?1 ORDER BY id"
            ))?;
            stmt.query_map(params![entry_id], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
        None => {
            stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM stock_batches ORDER BY id"))?;
            stmt.query_map([], from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?
        }
    };
    Ok(batches)
}

/// Register a receiving event: the batch row plus one available unit per
/// serialized item, as a single transaction.
pub fn receive_batch(
    conn: &mut Connection,
    new: &NewStockBatch,
    units: &[BatchUnitSpec],
) -> Result<(StockBatch, Vec<EquipmentUnit>)> {
    let tx = conn.transaction()?;

    let batch = insert(&tx, new)?;
    let mut created = Vec::with_capacity(units.len());
    for spec in units {
        created.push(unit::insert(
            &tx,
            &NewUnit {
                batch_id: batch.id,
                asset_tag: spec.asset_tag.clone(),
                serial: spec.serial.clone(),
                status: UnitStatus::Available,
            },
        )?);
    }

    tx.commit()?;
    Ok((batch, created))
}
