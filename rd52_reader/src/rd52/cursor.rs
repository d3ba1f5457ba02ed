// Byte cursor over an RD52 capture.
//
// Every read is length-checked against the bytes left in the source before
// anything is consumed, so a short file surfaces as `Truncated` and never as a
// partially filled header.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use memmap2::Mmap;

use super::error::{DecodeError, Result};

/// Anything the cursor can pull bytes from.
pub trait ByteSource: Read + Seek + Send {}

impl<T: Read + Seek + Send> ByteSource for T {}

/// Sequential reader with exact-size reads and explicit end-of-stream.
pub struct ByteCursor {
    source: Box<dyn ByteSource>,
    base: u64,
    offset: u64,
    len: u64,
}

impl ByteCursor {
    /// Open a file through a buffered reader.
    pub fn open(path: &Path) -> Result<Self> {
        let file = open_file(path)?;
        let len = file
            .metadata()
            .map_err(|source| open_failed(path, source))?
            .len();
        Ok(Self {
            source: Box::new(BufReader::new(file)),
            base: 0,
            offset: 0,
            len,
        })
    }

    /// Open and memory-map a file.
    pub fn open_mapped(path: &Path) -> Result<Self> {
        let file = open_file(path)?;
        // SAFETY: the mapping is read-only and the capture is not expected to be
        // truncated by another process while it is decoded.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|source| open_failed(path, source))?;
        let len = mmap.len() as u64;
        Ok(Self {
            source: Box::new(io::Cursor::new(mmap)),
            base: 0,
            offset: 0,
            len,
        })
    }

    /// Wrap an arbitrary seekable source, starting at its current position.
    pub fn from_source<S: ByteSource + 'static>(mut source: S) -> Result<Self> {
        let base = source.stream_position().map_err(|e| DecodeError::io(0, e))?;
        let end = source
            .seek(SeekFrom::End(0))
            .map_err(|e| DecodeError::io(0, e))?;
        source
            .seek(SeekFrom::Start(base))
            .map_err(|e| DecodeError::io(0, e))?;
        Ok(Self {
            source: Box::new(source),
            base,
            offset: 0,
            len: end.saturating_sub(base),
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.offset)
    }

    pub fn at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Fail with `Truncated` unless `needed` more bytes are available.
    pub fn require(&self, needed: u64) -> Result<()> {
        let available = self.remaining();
        if available < needed {
            return Err(DecodeError::Truncated {
                offset: self.offset,
                needed,
                available,
            });
        }
        Ok(())
    }

    /// Fill `buf` completely or fail without consuming anything.
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<()> {
        let needed = buf.len() as u64;
        self.require(needed)?;
        if let Err(err) = self.source.read_exact(buf) {
            return Err(self.read_error(needed, err));
        }
        self.offset += needed;
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        self.require(n as u64)?;
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Advance `n` bytes without materializing them.
    pub fn skip(&mut self, n: u64) -> Result<()> {
        self.require(n)?;
        let target = self.base + self.offset + n;
        self.source
            .seek(SeekFrom::Start(target))
            .map_err(|e| DecodeError::io(self.offset, e))?;
        self.offset += n;
        Ok(())
    }

    fn read_error(&self, needed: u64, err: io::Error) -> DecodeError {
        // The length was checked up front, so an early EOF means the source
        // shrank underneath us.
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::Truncated {
                offset: self.offset,
                needed,
                available: 0,
            }
        } else {
            DecodeError::io(self.offset, err)
        }
    }
}

impl std::fmt::Debug for ByteCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteCursor")
            .field("offset", &self.offset)
            .field("len", &self.len)
            .finish()
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| open_failed(path, source))
}

fn open_failed(path: &Path, source: io::Error) -> DecodeError {
    DecodeError::OpenFailed {
        path: path.to_path_buf(),
        source,
    }
}
