// Error taxonomy shared by the store, the state machine and the importers.

use crate::entities::UnitStatus;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A referenced entity does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    /// The requested transition violates the unit lifecycle. Carries the
    /// current status so callers can explain the conflict.
    #[error("unit {unit_id} is {current}, transition not allowed")]
    InvalidTransition { unit_id: i64, current: UnitStatus },

    /// Malformed direct-create input.
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The whole input could not be parsed in any supported format.
    /// Aborts an import with zero partial statistics.
    #[error("unreadable input: {0}")]
    FatalIngestion(String),

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

impl Error {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Error::NotFound { entity, id }
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }
}
