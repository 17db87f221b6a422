//! Seekable byte streams: the uniform source every decoder reads from.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Origin for [`IoStream::seek`], matching the three POSIX `whence` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Polymorphic seekable byte stream every decoder reads from (and a writable
/// memory variant can be written to).
///
/// Failures are reported as short reads/writes or a negative seek result —
/// never as a panic. `size()` returns `-1` when the length is not knowable.
pub trait IoStream: Send {
    /// Read up to `buf.len()` bytes, returning the number actually read (`0`
    /// at EOF). The stream position advances by exactly the returned count.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write up to `buf.len()` bytes, returning the number actually written.
    /// Read-only backings return `0` unconditionally.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Reposition the stream, returning the new absolute position, or a
    /// negative value if the seek could not be satisfied.
    fn seek(&mut self, offset: i64, whence: Whence) -> i64;

    /// Current absolute position.
    fn tell(&self) -> i64;

    /// Total length of the underlying object, or `-1` if unknowable.
    fn size(&self) -> i64;

    /// Release any underlying resource. Idempotent.
    fn close(&mut self);

    /// Whether the stream is still usable.
    fn is_open(&self) -> bool;
}

/// A stream backed by a host filesystem file.
pub struct FileStream {
    file: Option<File>,
    len: i64,
}

impl FileStream {
    /// Open `path` for reading and writing (creating it if absent).
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        let len = file.metadata().map(|m| m.len() as i64).unwrap_or(-1);
        Ok(Self {
            file: Some(file),
            len,
        })
    }

    /// Open `path` read-only.
    pub fn open_read_only(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = File::open(path)?;
        let len = file.metadata().map(|m| m.len() as i64).unwrap_or(-1);
        Ok(Self {
            file: Some(file),
            len,
        })
    }
}

impl IoStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        file.read(buf).unwrap_or(0)
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let Some(file) = self.file.as_mut() else {
            return 0;
        };
        let n = file.write(buf).unwrap_or(0);
        self.len = file.metadata().map(|m| m.len() as i64).unwrap_or(self.len);
        n
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        let Some(file) = self.file.as_mut() else {
            return -1;
        };
        let pos = match whence {
            Whence::Set => SeekFrom::Start(offset.max(0) as u64),
            Whence::Cur => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        file.seek(pos).map(|p| p as i64).unwrap_or(-1)
    }

    fn tell(&self) -> i64 {
        let Some(file) = &self.file else {
            return -1;
        };
        // `stream_position` is the only portable way to read position without seeking.
        let mut f = file.try_clone().expect("clone file handle for tell()");
        f.stream_position().map(|p| p as i64).unwrap_or(-1)
    }

    fn size(&self) -> i64 {
        self.len
    }

    fn close(&mut self) {
        self.file = None;
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }
}

/// A read-only stream over an in-memory buffer. Writes always return `0`.
pub struct MemoryStream {
    data: Vec<u8>,
    pos: usize,
    open: bool,
}

impl MemoryStream {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            open: true,
        }
    }
}

impl IoStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.open {
            return 0;
        }
        let remaining = self.data.len().saturating_sub(self.pos);
        let n = buf.len().min(remaining);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    fn write(&mut self, _buf: &[u8]) -> usize {
        0
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        seek_within(self.data.len(), &mut self.pos, offset, whence)
    }

    fn tell(&self) -> i64 {
        self.pos as i64
    }

    fn size(&self) -> i64 {
        self.data.len() as i64
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// A writable stream over an in-memory buffer. Writes overwrite in place but
/// never grow the buffer past its original size.
pub struct MemoryStreamMut {
    data: Vec<u8>,
    pos: usize,
    open: bool,
}

impl MemoryStreamMut {
    #[must_use]
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            pos: 0,
            open: true,
        }
    }

    /// Consume the stream, returning the underlying buffer.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl IoStream for MemoryStreamMut {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        if !self.open {
            return 0;
        }
        let remaining = self.data.len().saturating_sub(self.pos);
        let n = buf.len().min(remaining);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        if !self.open {
            return 0;
        }
        let remaining = self.data.len().saturating_sub(self.pos);
        let n = buf.len().min(remaining);
        self.data[self.pos..self.pos + n].copy_from_slice(&buf[..n]);
        self.pos += n;
        n
    }

    fn seek(&mut self, offset: i64, whence: Whence) -> i64 {
        seek_within(self.data.len(), &mut self.pos, offset, whence)
    }

    fn tell(&self) -> i64 {
        self.pos as i64
    }

    fn size(&self) -> i64 {
        self.data.len() as i64
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Adapts a [`Box<dyn IoStream>`] to `std::io::{Read, Seek}` for the
/// container-library decoders (`hound`, `claxon`, `lewton`) that expect the
/// standard traits rather than this crate's own [`IoStream`].
pub struct StreamAdapter {
    stream: Box<dyn IoStream>,
}

impl StreamAdapter {
    #[must_use]
    pub fn new(stream: Box<dyn IoStream>) -> Self {
        Self { stream }
    }

    /// Release the adapter, returning the underlying stream.
    #[must_use]
    pub fn into_inner(self) -> Box<dyn IoStream> {
        self.stream
    }
}

impl Read for StreamAdapter {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(self.stream.read(buf))
    }
}

impl Seek for StreamAdapter {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let (offset, whence) = match pos {
            SeekFrom::Start(p) => (p as i64, Whence::Set),
            SeekFrom::Current(p) => (p, Whence::Cur),
            SeekFrom::End(p) => (p, Whence::End),
        };
        let result = self.stream.seek(offset, whence);
        if result < 0 {
            Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, "seek out of range"))
        } else {
            Ok(result as u64)
        }
    }
}

fn seek_within(len: usize, pos: &mut usize, offset: i64, whence: Whence) -> i64 {
    let base = match whence {
        Whence::Set => 0i64,
        Whence::Cur => *pos as i64,
        Whence::End => len as i64,
    };
    let target = base + offset;
    if target < 0 || target > len as i64 {
        return -1;
    }
    *pos = target as usize;
    target
}
