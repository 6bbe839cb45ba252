//! Chunked binary objects for m2db.
//!
//! A [`BlobFile`] is owned by exactly one registry node: the node's
//! properties hold the metadata (name, mime type, size, block size and the
//! `ok` integrity flag) and the bytes live in fixed-size block rows keyed
//! by `(path, block)`.
//!
//! # Sections
//!
//! - [`file`]: [`BlobFile`]: metadata, raw block access, truncate
//! - [`writer`]: [`BlobWriter`]: buffered, seekable `io::Write`
//! - [`reader`]: [`BlobReader`]: sequential `io::Read` with skip/reset

pub mod error;
pub mod file;
pub mod reader;
pub mod writer;

pub use error::{BlobError, BlobResult};
pub use file::{BlobConfig, BlobFile, DEFAULT_BLOCK_SIZE};
pub use reader::BlobReader;
pub use writer::{BlobWriter, WriteMode};
