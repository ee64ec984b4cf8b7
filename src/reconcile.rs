// Import Reconciliation Engine.
//
// Converts untrusted tabular rows into idempotent entity upserts. Matching
// is by business key only: persons by national id then employee number,
// catalog entries by the (name, manufacturer, model) triple. Each row runs
// inside its own savepoint so a malformed row rolls back alone and the
// batch keeps going; the whole batch commits once at the end.

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::warn;

use crate::entities::{batch, catalog, person, unit};
use crate::entities::{NewCatalogEntry, NewPerson, NewStockBatch, NewUnit, UnitStatus};
use crate::error::{Error, Result};
use crate::ingest::{self, SheetRow};

// Column aliases: English name first, then the header used by the legacy
// spreadsheets.
const COL_NAME: &[&str] = &["name", "nome"];
const COL_NATIONAL_ID: &[&str] = &["national_id", "cpf"];
const COL_ROLE: &[&str] = &["role", "cargo"];
const COL_SITE: &[&str] = &["site", "city", "cidade"];
const COL_DEPARTMENT: &[&str] = &["department", "setor"];
const COL_EMAIL: &[&str] = &["email"];
const COL_EMPLOYEE_NUMBER: &[&str] = &["employee_number", "matricula"];
const COL_MANUFACTURER: &[&str] = &["manufacturer", "marca"];
const COL_MODEL: &[&str] = &["model", "modelo"];
const COL_ASSET_TAG: &[&str] = &["asset_tag", "patrimonial"];
const COL_SERIAL: &[&str] = &["serial", "serial_number"];
const COL_ACQUISITION_DATE: &[&str] = &["acquisition_date", "data_aquisicao"];
const COL_STATUS: &[&str] = &["status"];
const COL_VALUE: &[&str] = &["value", "unit_value", "valor"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonImportStats {
    pub created: u32,
    pub updated: u32,
    pub errors: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentImportStats {
    pub catalog_entries_created: u32,
    pub units_created: u32,
    pub errors: u32,
}

/// Which tabular source an equipment batch came from. The delimited path
/// follows the same matching/creation rules but carries no acquisition
/// date and no spec marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportSource {
    Spreadsheet,
    Delimited,
}

impl ImportSource {
    fn tag(self) -> &'static str {
        match self {
            ImportSource::Spreadsheet => "import_spreadsheet",
            ImportSource::Delimited => "import_delimited",
        }
    }
}

/// Normalize a national id: strip everything but digits, then re-group
/// exactly eleven digits as ddd.ddd.ddd-dd. Other digit counts are kept
/// bare; no digits at all means absent.
pub fn normalize_national_id(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 11 {
        Some(format!(
            "{}.{}.{}-{}",
            &digits[..3],
            &digits[3..6],
            &digits[6..9],
            &digits[9..]
        ))
    } else if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Parse a monetary value as exported by the field spreadsheets: optional
/// currency prefix, thousands separators, decimal comma or point.
pub fn parse_money(raw: &str) -> Option<f64> {
    let mut s = raw.trim().to_lowercase();
    if let Some(stripped) = s.strip_prefix("r$") {
        s = stripped.to_string();
    } else if let Some(stripped) = s.strip_prefix('$') {
        s = stripped.to_string();
    }
    let mut s = s.replace(' ', "");
    if s.contains(',') {
        // Decimal-comma input; a point before the comma is a thousands
        // separator ("1.234,56").
        s = s.replace('.', "").replace(',', ".");
    }
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok()
}

/// Acquisition dates show up in ISO and in day-first local formats.
fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }
    None
}

enum PersonOutcome {
    Created,
    Updated,
}

/// Upsert a batch of person rows. Rows without a name are skipped without
/// counting as errors; rows that fail to persist are counted and skipped.
pub fn import_persons(conn: &mut Connection, rows: &[SheetRow]) -> Result<PersonImportStats> {
    let mut stats = PersonImportStats::default();
    let mut tx = conn.transaction()?;

    for (index, row) in rows.iter().enumerate() {
        let Some(name) = row.get_owned(COL_NAME) else {
            continue;
        };

        let savepoint = tx.savepoint()?;
        match upsert_person_row(&savepoint, row, name) {
            Ok(outcome) => {
                savepoint.commit()?;
                match outcome {
                    PersonOutcome::Created => stats.created += 1,
                    PersonOutcome::Updated => stats.updated += 1,
                }
            }
            Err(err) => {
                // Savepoint drop rolls this row back; the batch continues.
                warn!(row = index + 1, error = %err, "person row rejected");
                stats.errors += 1;
            }
        }
    }

    tx.commit()?;
    Ok(stats)
}

fn upsert_person_row(
    conn: &Connection,
    row: &SheetRow,
    name: String,
) -> Result<PersonOutcome> {
    let incoming = NewPerson {
        national_id: row.get(COL_NATIONAL_ID).and_then(normalize_national_id),
        name,
        role: row.get_owned(COL_ROLE),
        site: row.get_owned(COL_SITE),
        department: row.get_owned(COL_DEPARTMENT),
        email: row.get_owned(COL_EMAIL),
        employee_number: row.get_owned(COL_EMPLOYEE_NUMBER),
    };

    let mut existing = None;
    if let Some(national_id) = &incoming.national_id {
        existing = person::find_by_national_id(conn, national_id)?;
    }
    if existing.is_none() {
        if let Some(employee_number) = &incoming.employee_number {
            existing = person::find_by_employee_number(conn, employee_number)?;
        }
    }

    match existing {
        Some(current) => {
            person::apply_import_update(conn, &current, &incoming)?;
            Ok(PersonOutcome::Updated)
        }
        None => {
            person::insert(conn, &incoming)?;
            Ok(PersonOutcome::Created)
        }
    }
}

/// Upsert a batch of equipment rows: lookup-or-create the catalog entry,
/// then exactly one stock batch (quantity 1) and one unit per valid row.
pub fn import_equipment(
    conn: &mut Connection,
    rows: &[SheetRow],
    source: ImportSource,
) -> Result<EquipmentImportStats> {
    let mut stats = EquipmentImportStats::default();
    let mut tx = conn.transaction()?;

    for (index, row) in rows.iter().enumerate() {
        let Some(name) = row.get_owned(COL_NAME) else {
            continue;
        };

        let savepoint = tx.savepoint()?;
        match upsert_equipment_row(&savepoint, row, name, source) {
            Ok(catalog_created) => {
                savepoint.commit()?;
                if catalog_created {
                    stats.catalog_entries_created += 1;
                }
                stats.units_created += 1;
            }
            Err(err) => {
                warn!(row = index + 1, error = %err, "equipment row rejected");
                stats.errors += 1;
            }
        }
    }

    tx.commit()?;
    Ok(stats)
}

/// Returns whether a new catalog entry had to be created for this row.
fn upsert_equipment_row(
    conn: &Connection,
    row: &SheetRow,
    name: String,
    source: ImportSource,
) -> Result<bool> {
    let manufacturer = row.get_owned(COL_MANUFACTURER);
    let model = row.get_owned(COL_MODEL);

    let value = match row.get(COL_VALUE) {
        Some(raw) => parse_money(raw)
            .ok_or_else(|| Error::validation("value", format!("not a number: {raw:?}")))?,
        None => 0.0,
    };

    let status = row
        .get(COL_STATUS)
        .and_then(UnitStatus::from_import_text)
        .unwrap_or(UnitStatus::Available);

    let (entry, catalog_created) =
        match catalog::find_by_key(conn, &name, manufacturer.as_deref(), model.as_deref())? {
            Some(entry) => (entry, false),
            None => {
                let spec = match source {
                    ImportSource::Spreadsheet => {
                        Some(serde_json::json!({ "imported": true }).to_string())
                    }
                    ImportSource::Delimited => None,
                };
                let entry = catalog::insert(
                    conn,
                    &NewCatalogEntry {
                        name,
                        manufacturer,
                        model,
                        spec,
                    },
                )?;
                (entry, true)
            }
        };

    let invoice_date = match source {
        ImportSource::Spreadsheet => row.get(COL_ACQUISITION_DATE).and_then(parse_date_text),
        ImportSource::Delimited => None,
    };

    let stock = batch::insert(
        conn,
        &NewStockBatch {
            catalog_entry_id: entry.id,
            invoice_number: None,
            invoice_date,
            quantity: 1,
            unit_cost: value,
            total_cost: value,
            source: Some(source.tag().to_string()),
        },
    )?;

    unit::insert(
        conn,
        &NewUnit {
            batch_id: stock.id,
            asset_tag: row.get_owned(COL_ASSET_TAG),
            serial: row.get_owned(COL_SERIAL),
            status,
        },
    )?;

    Ok(catalog_created)
}

/// Read a delimited file and run the person upsert over it.
pub fn import_persons_file(conn: &mut Connection, path: &Path) -> Result<PersonImportStats> {
    let rows = ingest::read_delimited_rows(path)?;
    import_persons(conn, &rows)
}

/// Read an equipment file and run the upsert over it. Spreadsheet sources
/// fall back to delimited parsing before failing fatally.
pub fn import_equipment_file(
    conn: &mut Connection,
    path: &Path,
    source: ImportSource,
) -> Result<EquipmentImportStats> {
    let rows = match source {
        ImportSource::Spreadsheet => ingest::read_spreadsheet_rows(path)?,
        ImportSource::Delimited => ingest::read_delimited_rows(path)?,
    };
    import_equipment(conn, &rows, source)
}
