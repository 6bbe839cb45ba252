use std::fmt;

use bytes::Bytes;
use m2db_registry::schema::DATA_TABLE;
use m2db_registry::RegistryNode;
use m2db_store::{Delete, Insert, Select, Value};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::reader::BlobReader;
use crate::writer::{BlobWriter, WriteMode};

/// Block size used when an object has none recorded yet.
pub const DEFAULT_BLOCK_SIZE: usize = 512 * 1024;

const PROP_NAME: &str = "fname";
const PROP_TYPE: &str = "ftype";
const PROP_SIZE: &str = "fsize";
const PROP_BLOCK_SIZE: &str = "blsize";
const PROP_OK: &str = "ok";
const PROP_IS_FILE: &str = ".is_file";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlobConfig {
    /// Block size given to objects on first use.
    pub default_block_size: usize,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            default_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

/// Binary object stored under a registry node.
#[derive(Clone)]
pub struct BlobFile {
    node: RegistryNode,
    config: BlobConfig,
}

impl BlobFile {
    pub fn new(node: RegistryNode) -> Self {
        Self::with_config(node, BlobConfig::default())
    }

    pub fn with_config(node: RegistryNode, config: BlobConfig) -> Self {
        Self { node, config }
    }

    pub fn node(&self) -> &RegistryNode {
        &self.node
    }

    fn path_value(&self) -> Value {
        self.node.path().as_str().into()
    }

    // ---------------------------------------------------------------------
    // Metadata
    // ---------------------------------------------------------------------

    /// Create the owning node and mark it as a file.
    pub fn create(&self) -> BlobResult<()> {
        self.node.ensure_exists()?;
        self.node.set_bool(PROP_IS_FILE, true)?;
        Ok(())
    }

    /// The node exists and carries the file marker.
    pub fn exists(&self) -> BlobResult<bool> {
        Ok(self.node.exists()? && self.node.get_bool(PROP_IS_FILE, false)?)
    }

    pub fn name(&self) -> BlobResult<Option<String>> {
        Ok(self.node.property(PROP_NAME)?)
    }

    pub fn set_name(&self, name: &str) -> BlobResult<()> {
        Ok(self.node.set_property(PROP_NAME, name)?)
    }

    pub fn mime_type(&self) -> BlobResult<Option<String>> {
        Ok(self.node.property(PROP_TYPE)?)
    }

    pub fn set_mime_type(&self, mime: &str) -> BlobResult<()> {
        Ok(self.node.set_property(PROP_TYPE, mime)?)
    }

    /// Recorded size in bytes; 0 when never written. Always read from the
    /// store so handles observe writers opened elsewhere.
    pub fn size(&self) -> BlobResult<u64> {
        self.node.invalidate();
        let size = self.node.get_i64(PROP_SIZE, 0)?;
        Ok(u64::try_from(size).unwrap_or(0))
    }

    pub(crate) fn set_size(&self, size: u64) -> BlobResult<()> {
        let size = i64::try_from(size).map_err(|_| BlobError::OffsetOutOfRange(size))?;
        Ok(self.node.set_i64(PROP_SIZE, size)?)
    }

    /// False while a writer is open or after a writer was abandoned.
    /// Read from the store, not the handle's cache.
    pub fn is_ok(&self) -> BlobResult<bool> {
        self.node.invalidate();
        Ok(self.node.get_bool(PROP_OK, false)?)
    }

    pub(crate) fn set_ok(&self, ok: bool) -> BlobResult<()> {
        Ok(self.node.set_bool(PROP_OK, ok)?)
    }

    /// The object's block size, recording the configured default on first use.
    pub fn block_size(&self) -> BlobResult<usize> {
        let recorded = self.node.get_i64(PROP_BLOCK_SIZE, 0)?;
        if recorded > 0 {
            return usize::try_from(recorded).map_err(|_| BlobError::InvalidBlockSize(0));
        }
        let size = self.config.default_block_size;
        self.record_block_size(size)?;
        Ok(size)
    }

    /// Choose the block size before first use. Fails once one is recorded.
    pub fn set_block_size(&self, size: usize) -> BlobResult<()> {
        let recorded = self.node.get_i64(PROP_BLOCK_SIZE, 0)?;
        if recorded > 0 {
            return Err(BlobError::BlockSizeFixed {
                path: self.node.path().to_string(),
                current: recorded as usize,
            });
        }
        self.record_block_size(size)
    }

    fn record_block_size(&self, size: usize) -> BlobResult<()> {
        if size == 0 || i32::try_from(size).is_err() {
            return Err(BlobError::InvalidBlockSize(size));
        }
        Ok(self.node.set_i64(PROP_BLOCK_SIZE, size as i64)?)
    }

    // ---------------------------------------------------------------------
    // Blocks
    // ---------------------------------------------------------------------

    /// Raw block contents; `None` for a block that was never written.
    pub fn block(&self, index: i32) -> BlobResult<Option<Bytes>> {
        let select = Select::new(DATA_TABLE)
            .columns(["data"])
            .where_eq("path")
            .where_eq("block");
        let rows = self
            .node
            .session()
            .run(&select.into(), vec![self.path_value(), index.into()])?;
        match rows.first() {
            Some(row) => Ok(row.blob("data")?),
            None => Ok(None),
        }
    }

    pub fn set_block(&self, index: i32, data: Bytes) -> BlobResult<()> {
        let block_size = self.block_size()?;
        if data.len() > block_size {
            return Err(BlobError::BlockTooLarge {
                index,
                len: data.len(),
                block_size,
            });
        }
        let insert = Insert::new(DATA_TABLE).columns(["path", "block", "data"]);
        self.node
            .session()
            .run(&insert.into(), vec![self.path_value(), index.into(), data.into()])?;
        Ok(())
    }

    pub fn delete_block(&self, index: i32) -> BlobResult<()> {
        let delete = Delete::new(DATA_TABLE).where_eq("path").where_eq("block");
        self.node
            .session()
            .run(&delete.into(), vec![self.path_value(), index.into()])?;
        Ok(())
    }

    /// Shrink to `size` bytes: blocks wholly past it are deleted and the
    /// boundary block is shortened. Never grows the object.
    pub fn truncate(&self, size: u64) -> BlobResult<()> {
        let current = self.size()?;
        if size >= current {
            return Ok(());
        }
        let block_size = self.block_size()? as u64;
        let last = block_index(current - 1, block_size)?;
        for index in block_index(size, block_size)?..=last {
            let start = index as u64 * block_size;
            if start >= size {
                self.delete_block(index)?;
            } else if let Some(data) = self.block(index)? {
                let keep = (size - start) as usize;
                if data.len() > keep {
                    self.set_block(index, data.slice(..keep))?;
                }
            }
        }
        self.set_size(size)?;
        debug!(path = %self.node.path(), from = current, to = size, "blob truncated");
        Ok(())
    }

    /// Delete the owning node; a hard delete also erases every block row.
    pub fn delete(&self, hard: bool) -> BlobResult<()> {
        Ok(self.node.delete(hard)?)
    }

    // ---------------------------------------------------------------------
    // Streams
    // ---------------------------------------------------------------------

    pub fn writer(&self, mode: WriteMode) -> BlobResult<BlobWriter> {
        BlobWriter::open(self.clone(), mode)
    }

    pub fn reader(&self) -> BlobResult<BlobReader> {
        BlobReader::open(self.clone())
    }

    /// Replace the whole content.
    pub fn write_all(&self, data: &[u8]) -> BlobResult<()> {
        let mut writer = self.writer(WriteMode::Truncate)?;
        writer.write_bytes(data)?;
        writer.close()
    }

    pub fn read_all(&self) -> BlobResult<Vec<u8>> {
        self.reader()?.read_to_vec()
    }
}

/// Block holding byte `offset`.
pub(crate) fn block_index(offset: u64, block_size: u64) -> BlobResult<i32> {
    i32::try_from(offset / block_size).map_err(|_| BlobError::OffsetOutOfRange(offset))
}

impl fmt::Debug for BlobFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobFile")
            .field("path", self.node.path())
            .finish()
    }
}
