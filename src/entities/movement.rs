// Movement record - one custody/status transition of a unit.
// Append-only by convention: the core never updates or deletes rows.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Assignment,
    Return,
    // Transfer and retirement exist in the data vocabulary (imports and
    // history may carry them) but no lifecycle operation produces them yet.
    // TODO: direct holder-to-holder transfer is still done as return+assign
    // by operators; fold it into a single transfer operation once the
    // workflow is settled.
    Transfer,
    Retirement,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Assignment => "assignment",
            MovementKind::Return => "return",
            MovementKind::Transfer => "transfer",
            MovementKind::Retirement => "retirement",
        }
    }

    pub fn from_db(s: &str) -> Option<MovementKind> {
        [
            MovementKind::Assignment,
            MovementKind::Return,
            MovementKind::Transfer,
            MovementKind::Retirement,
        ]
        .into_iter()
        .find(|kind| kind.as_str() == s)
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Movement {
    pub id: i64,
    pub unit_id: i64,
    pub from_person_id: Option<i64>,
    pub to_person_id: Option<i64>,
    pub kind: MovementKind,
    pub moved_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMovement {
    pub unit_id: i64,
    pub from_person_id: Option<i64>,
    pub to_person_id: Option<i64>,
    pub kind: MovementKind,
    pub note: Option<String>,
}

pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Movement> {
    let kind: String = row.get(4)?;
    Ok(Movement {
        id: row.get(0)?,
        unit_id: row.get(1)?,
        from_person_id: row.get(2)?,
        to_person_id: row.get(3)?,
        kind: MovementKind::from_db(&kind).ok_or(rusqlite::Error::InvalidQuery)?,
        moved_at: super::required_ts(row.get(5)?)?,
        note: row.get(6)?,
    })
}
