use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid time id: {0}")]
    InvalidTimeId(String),

    #[error("time id is not time-ordered (version {0})")]
    NotTimeOrdered(usize),

    #[error("timestamp out of range: {0} ms")]
    TimestampOutOfRange(i64),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),
}
