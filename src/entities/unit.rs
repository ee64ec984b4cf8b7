// Equipment unit - one serialized/tagged physical item.
//
// Status is denormalized here for fast queries; the movements table holds
// the audit trail. Only `lifecycle` mutates status/holder/assigned_at, and
// the three fields always change together.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::db::now_iso;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Available,
    Assigned,
    InMaintenance,
    Retired,
}

impl UnitStatus {
    pub const ALL: [UnitStatus; 4] = [
        UnitStatus::Available,
        UnitStatus::Assigned,
        UnitStatus::InMaintenance,
        UnitStatus::Retired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Available => "available",
            UnitStatus::Assigned => "assigned",
            UnitStatus::InMaintenance => "in_maintenance",
            UnitStatus::Retired => "retired",
        }
    }

    /// Parse the canonical database representation.
    pub fn from_db(s: &str) -> Option<UnitStatus> {
        UnitStatus::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Map free status text from an import row. Case-insensitive,
    /// accent-insensitive, tolerant of space/hyphen/underscore variation,
    /// and aware of the Portuguese vocabulary used by the legacy
    /// spreadsheets. Anything unrecognized is treated as available.
    pub fn from_import_text(raw: &str) -> Option<UnitStatus> {
        let folded = fold_status_text(raw);
        match folded.as_str() {
            "available" | "disponivel" => Some(UnitStatus::Available),
            "assigned" | "alocado" => Some(UnitStatus::Assigned),
            "in maintenance" | "em manutencao" | "maintenance" => Some(UnitStatus::InMaintenance),
            "retired" | "baixado" => Some(UnitStatus::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, strip accents seen in the source vocabulary, and collapse
/// hyphen/underscore/whitespace runs to single spaces.
fn fold_status_text(raw: &str) -> String {
    let lowered: String = raw
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' => 'a',
            'é' | 'ê' => 'e',
            'í' => 'i',
            'ó' | 'ô' | 'õ' => 'o',
            'ú' => 'u',
            'ç' => 'c',
            '-' | '_' => ' ',
            other => other,
        })
        .collect();
    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentUnit {
    pub id: i64,
    pub batch_id: i64,
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
    pub status: UnitStatus,
    pub holder_id: Option<i64>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl EquipmentUnit {
    /// The three assignment fields must agree: a unit is assigned iff it
    /// has a holder iff it has an assignment timestamp.
    pub fn holder_state_consistent(&self) -> bool {
        let assigned = self.status == UnitStatus::Assigned;
        assigned == self.holder_id.is_some() && assigned == self.assigned_at.is_some()
    }
}

/// Input for creating a unit. Units always start life without a holder;
/// a non-available initial status only enters through import rows.
#[derive(Debug, Clone)]
pub struct NewUnit {
    pub batch_id: i64,
    pub asset_tag: Option<String>,
    pub serial: Option<String>,
    pub status: UnitStatus,
}

#[derive(Debug, Clone, Default)]
pub struct UnitFilter {
    pub status: Option<UnitStatus>,
    pub holder_id: Option<i64>,
}

const COLUMNS: &str = "id, batch_id, asset_tag, serial, status, holder_id, assigned_at, created_at";

pub(crate) fn from_row(row: &Row) -> rusqlite::Result<EquipmentUnit> {
    let status: String = row.get(4)?;
    Ok(EquipmentUnit {
        id: row.get(0)?,
        batch_id: row.get(1)?,
        asset_tag: row.get(2)?,
        serial: row.get(3)?,
        status: UnitStatus::from_db(&status).ok_or(rusqlite::Error::InvalidQuery)?,
        holder_id: row.get(5)?,
        assigned_at: super::optional_ts(row.get(6)?),
        created_at: super::required_ts(row.get(7)?)?,
    })
}

pub fn insert(conn: &Connection, new: &NewUnit) -> Result<EquipmentUnit> {
    conn.execute(
        "INSERT INTO equipment_units (batch_id, asset_tag, serial, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            new.batch_id,
            new.asset_tag,
            new.serial,
            new.status.as_str(),
            now_iso(),
        ],
    )?;
    get(conn, conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<EquipmentUnit> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM equipment_units WHERE id = ?1"),
        params![id],
        from_row,
    )
    .map_err(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Error::not_found("equipment unit", id),
        other => other.into(),
    })
}

pub fn list(conn: &Connection, filter: &UnitFilter) -> Result<Vec<EquipmentUnit>> {
    let mut sql = format!("SELECT {COLUMNS} FROM equipment_units WHERE 1=1");
    let mut args: Vec<rusqlite::types::Value> = Vec::new();

    if let Some(status) = filter.status {
        sql.push_str(" AND status = ?");
        args.push(status.as_str().to_string().into());
    }
    if let Some(holder_id) = filter.holder_id {
        sql.push_str(" AND holder_id = ?");
        args.push(holder_id.into());
    }
    sql.push_str(" ORDER BY id");

    let mut stmt = conn.prepare(&sql)?;
    let units = stmt
        .query_map(rusqlite::params_from_iter(args), from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(units)
}

/// Units currently held by one person.
pub fn held_by(conn: &Connection, person_id: i64) -> Result<Vec<EquipmentUnit>> {
    list(
        conn,
        &UnitFilter {
            holder_id: Some(person_id),
            ..Default::default()
        },
    )
}
