//! Partitioned wide-column store seam for m2db.
//!
//! Every higher layer talks to storage exclusively through prepared,
//! parameterized [`Statement`]s executed by a [`Session`]. The session is
//! an explicit, injected client: it owns a bounded prepared-statement cache,
//! a default [`Consistency`], and a detached executor for fire-and-forget
//! writes.
//!
//! # Sections
//!
//! - [`value`]: column types and bound values
//! - [`statement`]: statement AST rendered as CQL
//! - [`row`]: result rows with typed accessors
//! - [`traits`]: the [`DataStore`] backend trait
//! - [`memory`]: [`MemoryStore`], the in-memory partitioned backend
//! - [`cache`]: LRU cache of prepared statements keyed by CQL text
//! - [`session`]: [`Session`], the client passed to every component
//! - [`schema`]: versioned table provisioning and general settings

pub mod cache;
pub mod consistency;
pub mod error;
pub mod memory;
pub mod prepared;
pub mod row;
pub mod schema;
pub mod session;
pub mod statement;
pub mod traits;
pub mod value;

pub use cache::{CacheStats, StatementCache};
pub use consistency::Consistency;
pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use prepared::{BoundStatement, PreparedStatement, StatementId};
pub use row::{Row, Rows};
pub use schema::{provision_all, GeneralSettings, TableChange, TableDefinition, GENERAL_SETTINGS_TABLE};
pub use session::{Session, SessionConfig};
pub use statement::{
    Assignment, CmpOp, Delete, DeleteTarget, Filter, Insert, Order, Select, Statement,
    TableSchema, Update,
};
pub use traits::DataStore;
pub use value::{ColumnType, Value};
