use m2db_store::StoreError;
use m2db_types::TypeError;
use thiserror::Error;

/// Errors from time-series operations.
#[derive(Debug, Error)]
pub enum SeriesError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A stored row holds a time value that is not a time-ordered id.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// A row is missing a column every event row carries.
    #[error("event row is missing column {0}")]
    MissingColumn(&'static str),

    /// The payload is not a JSON object and cannot be edited field by field.
    #[error("payload is not a JSON object: {0}")]
    Payload(String),
}

/// Result alias for time-series operations.
pub type SeriesResult<T> = Result<T, SeriesError>;
