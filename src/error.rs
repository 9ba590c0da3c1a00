// ⚠️ Error taxonomy
// StoreError is what the persistence layer reports; DomainError is what the
// core components return to the boundary layer.

use rusqlite::ffi;

/// Failures reported by a [`crate::store::Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    /// The entry set of a sheet would sum past the range of f64
    #[error("Total weight of sheet {0} is out of range")]
    TotalOutOfRange(i64),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        let duplicate = match &err {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation
                    && (code.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || code.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                Some(
                    message
                        .clone()
                        .unwrap_or_else(|| "unique constraint".to_string()),
                )
            }
            _ => None,
        };

        match duplicate {
            Some(constraint) => StoreError::DuplicateKey(constraint),
            None => StoreError::Sqlite(err),
        }
    }
}

impl StoreError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, StoreError::DuplicateKey(_))
    }
}

/// Errors returned by the core operations.
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
