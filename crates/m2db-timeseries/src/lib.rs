//! Time-series storage for m2db.
//!
//! Events are appended under a series key and partitioned by calendar
//! month, so every read is a bounded range scan inside one partition.
//! [`EventCursor`] strings those scans together into one continuous,
//! lazily paged sequence in either direction.
//!
//! An event saved with a type is written twice: under the bare series id
//! and under `id!type`. A small period index records which months hold
//! data for each key; it is maintained best-effort and only consulted by
//! [`TimeSeries::query_indexed`].
//!
//! # Sections
//!
//! - [`event`]: [`Event`], series keys, [`TimeRange`]
//! - [`series`]: [`TimeSeries`]: save, lookup, queries, deletes
//! - [`cursor`]: [`EventCursor`]: the period-by-period scan
//! - [`editor`]: [`EventEditor`]: in-place JSON payload edits
//! - [`schema`]: table layouts

pub mod cursor;
pub mod editor;
pub mod error;
pub mod event;
pub mod schema;
pub mod series;

pub use cursor::EventCursor;
pub use editor::EventEditor;
pub use error::{SeriesError, SeriesResult};
pub use event::{series_key, Event, TimeRange, TYPE_SEPARATOR};
pub use series::{SeriesConfig, TimeSeries};
