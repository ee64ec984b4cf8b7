// Equipment Ledger - Core Library
// Tracks serialized equipment units, their custody, and the movement
// history, and reconciles bulk spreadsheet/CSV imports against the store.

pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod ingest;
pub mod ledger;
pub mod lifecycle;
pub mod reconcile;
pub mod reports;

// Re-export commonly used types
pub use config::Config;
pub use db::{open_database, setup_database};
pub use entities::{
    BatchUnitSpec, CatalogEntry, EquipmentUnit, Movement, MovementKind, NewCatalogEntry,
    NewPerson, NewStockBatch, NewUnit, Person, PersonFilter, StockBatch, UnitFilter, UnitStatus,
};
pub use error::{Error, Result};
pub use ingest::SheetRow;
pub use lifecycle::{assign_unit, return_unit};
pub use reconcile::{
    import_equipment, import_equipment_file, import_persons, import_persons_file,
    EquipmentImportStats, ImportSource, PersonImportStats,
};
pub use reports::{
    person_report, recent_movements, stock_summary, value_summary, PersonReport, StockSummary,
    ValueSummaryEntry,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
