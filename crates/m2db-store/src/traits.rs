use crate::error::StoreResult;
use crate::prepared::{BoundStatement, PreparedStatement};
use crate::row::Rows;
use crate::statement::Statement;

/// Partitioned wide-column backend.
///
/// All implementations must satisfy these invariants:
/// - Rows are grouped by partition key; within a partition they are sorted
///   by the clustering key in the table's declared clustering order.
/// - Reads are only served as a single-partition lookup or range, or as an
///   equality lookup on a secondarily indexed column.
/// - A missing row is an empty result, never an error.
/// - Every write is independently complete; there are no multi-statement
///   transactions.
/// - Backend failures are returned, never silently dropped.
pub trait DataStore: Send + Sync {
    /// Validate a DML statement against the current schema and assign it an id.
    fn prepare(&self, statement: &Statement) -> StoreResult<PreparedStatement>;

    /// Execute a bound statement at the consistency it carries.
    fn execute(&self, statement: &BoundStatement) -> StoreResult<Rows>;

    /// Execute a schema change (`CREATE TABLE`, `CREATE INDEX`, `DROP TABLE`).
    fn execute_unprepared(&self, statement: &Statement) -> StoreResult<()>;

    /// Schema metadata: whether `table` exists.
    fn table_exists(&self, table: &str) -> StoreResult<bool>;
}
