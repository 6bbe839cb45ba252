//! High-level SDK for m2db.
//!
//! [`Database`] owns one [`Session`] and hands out the three storage
//! layers built on it: the path-addressed registry, blob files stored
//! under registry nodes, and the monthly-partitioned time series.

pub mod config;
pub mod database;
pub mod error;
pub mod telemetry;

pub use config::{DatabaseConfig, LoggingConfig};
pub use database::Database;
pub use error::{SdkError, SdkResult};
pub use telemetry::init_tracing;

// Re-export the types most callers touch
pub use m2db_blob::{BlobConfig, BlobFile, BlobReader, BlobWriter, WriteMode};
pub use m2db_registry::{NodePath, NodeStatus, Registry, RegistryNode, Tree, TreeValue};
pub use m2db_store::{Consistency, DataStore, MemoryStore, Order, Session, SessionConfig};
pub use m2db_timeseries::{Event, EventCursor, EventEditor, SeriesConfig, TimeRange, TimeSeries};
pub use m2db_types::{Period, TimeId, TimeIdGenerator};
