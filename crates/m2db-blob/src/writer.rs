use std::io::{self, Seek, SeekFrom, Write};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::BlobResult;
use crate::file::{block_index, BlobFile};

/// How a writer treats existing content.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteMode {
    /// Discard existing content and start empty.
    Truncate,
    /// Keep existing content and start at its end.
    Append,
    /// Keep existing content and start at offset 0; untouched bytes survive.
    Edit,
}

/// Buffered, seekable writer over one blob.
///
/// One block is held in memory at a time and written back when it fills,
/// on seek to another block, on `flush` and on `close`. The object's size
/// and `ok` flag are only updated by [`BlobWriter::close`]; a writer that is
/// dropped unclosed leaves `ok` false.
pub struct BlobWriter {
    file: BlobFile,
    block_size: u64,
    baseline: u64,
    high_water: u64,
    pos: u64,
    block: i32,
    buf: Vec<u8>,
    loaded: bool,
    dirty: bool,
    closed: bool,
}

impl BlobWriter {
    pub(crate) fn open(file: BlobFile, mode: WriteMode) -> BlobResult<Self> {
        if !file.exists()? {
            file.create()?;
        }
        let block_size = file.block_size()? as u64;
        file.set_ok(false)?;
        let baseline = match mode {
            WriteMode::Truncate => {
                file.truncate(0)?;
                0
            }
            WriteMode::Append | WriteMode::Edit => file.size()?,
        };
        let pos = if mode == WriteMode::Append { baseline } else { 0 };
        debug!(path = %file.node().path(), ?mode, baseline, "blob writer opened");
        Ok(Self {
            file,
            block_size,
            baseline,
            high_water: 0,
            pos,
            block: 0,
            buf: Vec::new(),
            loaded: false,
            dirty: false,
            closed: false,
        })
    }

    /// Current write offset.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Length the object will have once closed.
    pub fn len(&self) -> u64 {
        self.extent()
    }

    pub fn is_empty(&self) -> bool {
        self.extent() == 0
    }

    fn extent(&self) -> u64 {
        self.baseline.max(self.high_water)
    }

    /// Pull the block under `pos` into the buffer, limited to bytes that
    /// belong to the object so stale tails never resurface.
    fn load(&mut self) -> BlobResult<()> {
        if self.loaded {
            return Ok(());
        }
        self.block = block_index(self.pos, self.block_size)?;
        let start = self.block as u64 * self.block_size;
        self.buf.clear();
        let extent = self.extent();
        if start < extent {
            if let Some(data) = self.file.block(self.block)? {
                let keep = data.len().min((extent - start) as usize);
                self.buf.extend_from_slice(&data[..keep]);
            }
        }
        self.loaded = true;
        Ok(())
    }

    fn flush_block(&mut self) -> BlobResult<()> {
        if self.dirty {
            self.file
                .set_block(self.block, Bytes::copy_from_slice(&self.buf))?;
            self.dirty = false;
        }
        Ok(())
    }

    /// Write all of `data` at the current offset.
    pub fn write_bytes(&mut self, mut data: &[u8]) -> BlobResult<()> {
        while !data.is_empty() {
            self.load()?;
            let start = self.block as u64 * self.block_size;
            let offset = (self.pos - start) as usize;
            let n = data.len().min(self.block_size as usize - offset);
            if self.buf.len() < offset + n {
                self.buf.resize(offset + n, 0);
            }
            self.buf[offset..offset + n].copy_from_slice(&data[..n]);
            self.dirty = true;
            self.pos += n as u64;
            self.high_water = self.high_water.max(self.pos);
            data = &data[n..];

            if offset + n == self.block_size as usize {
                self.flush_block()?;
                self.loaded = false;
            }
        }
        Ok(())
    }

    /// Move the write offset. Offsets past the end are allowed; the gap
    /// reads back as zeros.
    pub fn seek_to(&mut self, offset: u64) -> BlobResult<()> {
        let target = block_index(offset, self.block_size)?;
        if self.loaded && target != self.block {
            self.flush_block()?;
            self.loaded = false;
        }
        self.pos = offset;
        Ok(())
    }

    /// Flush the buffered block, record the new size and mark the object
    /// consistent.
    pub fn close(mut self) -> BlobResult<()> {
        self.flush_block()?;
        if self.high_water > self.baseline {
            self.file.set_size(self.high_water)?;
        }
        self.file.set_ok(true)?;
        self.closed = true;
        debug!(path = %self.file.node().path(), size = self.extent(), "blob writer closed");
        Ok(())
    }
}

impl Write for BlobWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_bytes(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.flush_block()?)
    }
}

impl Seek for BlobWriter {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.pos, self.extent())?;
        self.seek_to(target)?;
        Ok(target)
    }
}

pub(crate) fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(n) => Some(n),
        SeekFrom::End(d) => len.checked_add_signed(d),
        SeekFrom::Current(d) => current.checked_add_signed(d),
    };
    target.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "seek before start of blob")
    })
}

impl Drop for BlobWriter {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                path = %self.file.node().path(),
                "blob writer dropped without close; object left marked not ok"
            );
        }
    }
}

impl std::fmt::Debug for BlobWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobWriter")
            .field("path", self.file.node().path())
            .field("pos", &self.pos)
            .field("len", &self.extent())
            .finish()
    }
}
