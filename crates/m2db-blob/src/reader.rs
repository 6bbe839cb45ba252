use std::io::{self, Read, Seek, SeekFrom};

use bytes::Bytes;

use crate::error::BlobResult;
use crate::file::{block_index, BlobFile};
use crate::writer::resolve_seek;

/// Sequential reader over one blob.
///
/// The size is captured when the reader opens and reads never go past it.
/// Blocks are fetched lazily, one at a time; a block that was never
/// written reads as zeros.
pub struct BlobReader {
    file: BlobFile,
    block_size: u64,
    size: u64,
    pos: u64,
    current: Option<(i32, Bytes)>,
}

impl BlobReader {
    pub(crate) fn open(file: BlobFile) -> BlobResult<Self> {
        let block_size = file.block_size()? as u64;
        let size = file.size()?;
        Ok(Self {
            file,
            block_size,
            size,
            pos: 0,
            current: None,
        })
    }

    pub fn len(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    pub fn remaining(&self) -> u64 {
        self.size.saturating_sub(self.pos)
    }

    /// Advance by up to `n` bytes without reading them. Returns how far the
    /// position actually moved.
    pub fn skip(&mut self, n: u64) -> u64 {
        let step = n.min(self.remaining());
        self.pos += step;
        step
    }

    /// Rewind to the start.
    pub fn reset(&mut self) {
        self.pos = 0;
    }

    /// Read into `buf`, stopping at the end of the current block. Returns 0
    /// at end of object.
    pub fn read_into(&mut self, buf: &mut [u8]) -> BlobResult<usize> {
        if buf.is_empty() || self.pos >= self.size {
            return Ok(0);
        }
        let index = block_index(self.pos, self.block_size)?;
        let data = match &self.current {
            Some((loaded, data)) if *loaded == index => data.clone(),
            _ => {
                let data = self.file.block(index)?.unwrap_or_default();
                self.current = Some((index, data.clone()));
                data
            }
        };
        let start = index as u64 * self.block_size;
        let offset = (self.pos - start) as usize;
        let block_end = (start + self.block_size).min(self.size);
        let n = buf.len().min((block_end - self.pos) as usize);

        let stored = data.len().saturating_sub(offset).min(n);
        if stored > 0 {
            buf[..stored].copy_from_slice(&data[offset..offset + stored]);
        }
        buf[stored..n].fill(0);
        self.pos += n as u64;
        Ok(n)
    }

    /// Read everything from the current position to the end.
    pub fn read_to_vec(&mut self) -> BlobResult<Vec<u8>> {
        let mut out = vec![0u8; self.remaining() as usize];
        let mut filled = 0;
        while filled < out.len() {
            let n = self.read_into(&mut out[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(out)
    }
}

impl Read for BlobReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_into(buf)?)
    }
}

impl Seek for BlobReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = resolve_seek(pos, self.pos, self.size)?;
        Ok(self.pos)
    }
}

impl std::fmt::Debug for BlobReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlobReader")
            .field("path", self.file.node().path())
            .field("pos", &self.pos)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::tests::{file, setup};

    #[test]
    fn reads_stop_at_block_boundaries() {
        let (_, reg) = setup();
        let f = file(&reg, "/r", 4);
        f.write_all(b"abcdefghij").unwrap();
        let mut r = f.reader().unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(r.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"abcd");
        assert_eq!(r.read(&mut buf).unwrap(), 4);
        assert_eq!(r.read(&mut buf).unwrap(), 2);
        assert_eq!(&buf[..2], b"ij");
        assert_eq!(r.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn skip_is_clamped_and_reset_rewinds() {
        let (_, reg) = setup();
        let f = file(&reg, "/skip", 4);
        f.write_all(b"0123456789").unwrap();
        let mut r = f.reader().unwrap();
        assert_eq!(r.skip(6), 6);
        let mut rest = Vec::new();
        r.read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"6789");
        assert_eq!(r.skip(5), 0);

        r.reset();
        assert_eq!(r.remaining(), 10);
        assert_eq!(r.skip(100), 10);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn seek_then_read() {
        let (_, reg) = setup();
        let f = file(&reg, "/seek", 3);
        f.write_all(b"abcdefgh").unwrap();
        let mut r = f.reader().unwrap();
        r.seek(SeekFrom::End(-3)).unwrap();
        assert_eq!(r.read_to_vec().unwrap(), b"fgh");
        r.seek(SeekFrom::Start(100)).unwrap();
        assert_eq!(r.read_to_vec().unwrap(), b"");
    }

    #[test]
    fn missing_blocks_read_as_zeros() {
        let (_, reg) = setup();
        let f = file(&reg, "/holes", 4);
        f.write_all(b"abcdefghijkl").unwrap();
        f.delete_block(1).unwrap();
        assert_eq!(f.read_all().unwrap(), b"abcd\0\0\0\0ijkl");
    }

    #[test]
    fn size_is_fixed_at_open() {
        let (_, reg) = setup();
        let f = file(&reg, "/snap", 4);
        f.write_all(b"abc").unwrap();
        let mut r = f.reader().unwrap();
        let mut w = f.writer(crate::WriteMode::Append).unwrap();
        w.write_bytes(b"def").unwrap();
        w.close().unwrap();
        assert_eq!(r.read_to_vec().unwrap(), b"abc");
    }

    #[test]
    fn empty_object_reads_nothing() {
        let (_, reg) = setup();
        let f = file(&reg, "/empty", 4);
        f.write_all(b"").unwrap();
        let r = f.reader().unwrap();
        assert!(r.is_empty());
        assert!(f.read_all().unwrap().is_empty());
    }
}
