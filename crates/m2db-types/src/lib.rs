//! Foundation types for m2db.
//!
//! Every other m2db crate depends on `m2db-types` for the identifiers that
//! give time-series data its ordering and partitioning.
//!
//! # Key Types
//!
//! - [`TimeId`]: time-ordered unique identifier (UUID v7 layout)
//! - [`TimeIdGenerator`]: monotonic source of [`TimeId`] values
//! - [`Period`]: calendar-month partition index (`year * 12 + month`)

pub mod error;
pub mod period;
pub mod time_id;

pub use error::TypeError;
pub use period::Period;
pub use time_id::{TimeId, TimeIdGenerator};
