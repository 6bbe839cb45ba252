use crate::prepared::StatementId;
use crate::value::ColumnType;

/// Errors from the backing store and the session in front of it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The statement references a table that does not exist.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The statement references a column the table does not define.
    #[error("unknown column {column} in table {table}")]
    UnknownColumn { table: String, column: String },

    /// The statement is well-formed but not an access pattern the store serves.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Wrong number of bound values.
    #[error("expected {expected} bound values, got {actual}")]
    BindCount { expected: usize, actual: usize },

    /// A bound or stored value does not match the column type.
    #[error("type mismatch for {column}: expected {expected}, got {actual}")]
    TypeMismatch {
        column: String,
        expected: ColumnType,
        actual: String,
    },

    /// Execution of a statement id the backend never prepared.
    #[error("unknown prepared statement {0}")]
    UnknownStatement(StatementId),

    /// DDL for a table or index that already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The backend could not serve the request (timeout, node down).
    #[error("store unavailable for {0}")]
    Unavailable(String),

    /// The session's detached executor has shut down.
    #[error("detached executor is closed")]
    ExecutorClosed,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
