// Entity store: the persisted data model plus per-entity queries.
// Pure data and validation; state transitions live in `lifecycle`,
// bulk ingestion in `reconcile`.

pub mod batch;
pub mod catalog;
pub mod movement;
pub mod person;
pub mod unit;

pub use batch::{BatchUnitSpec, NewStockBatch, StockBatch};
pub use catalog::{CatalogEntry, NewCatalogEntry};
pub use movement::{Movement, MovementKind, NewMovement};
pub use person::{NewPerson, Person, PersonFilter};
pub use unit::{EquipmentUnit, NewUnit, UnitFilter, UnitStatus};

use chrono::{DateTime, Utc};

/// Timestamps are written by this crate as RFC 3339; anything else in a
/// NOT NULL column means the row was edited outside the application.
pub(crate) fn required_ts(s: String) -> rusqlite::Result<DateTime<Utc>> {
    crate::db::parse_iso(&s).ok_or(rusqlite::Error::InvalidQuery)
}

pub(crate) fn optional_ts(s: Option<String>) -> Option<DateTime<Utc>> {
    s.as_deref().and_then(crate::db::parse_iso)
}
