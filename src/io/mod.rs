//! Byte sources the container parser reads from
//!
//! The parser only needs a seekable stream with a blocking read that may
//! come up short at end of stream. [`ReadSeekSource`] adapts anything that
//! implements `Read + Seek` (files, in-memory cursors) and
//! [`ProgressiveSource`] models a download that is still arriving.

pub mod progressive;
pub mod reader;

pub use progressive::{ProgressiveSource, ProgressiveWriter};
pub use reader::ReadSeekSource;

use crate::error::{Error, Result};

/// A seekable byte stream.
///
/// `read` blocks until `buf` is full or the stream ends, and returns the
/// number of bytes actually read; a short count means end of stream (or, for
/// progressive sources, end of what will ever arrive). Failures surface as
/// [`Error::Io`].
pub trait ByteSource: Send {
    /// Read up to `buf.len()` bytes, blocking until they are available.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Read whatever is available right now without waiting.
    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.read(buf)
    }

    /// Read exactly one byte.
    fn read_byte(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        if self.read(&mut byte)? == 1 {
            Ok(byte[0])
        } else {
            Err(Error::EndOfStream)
        }
    }

    /// Move the read position to `pos`, counted from the start of the stream.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Current read position.
    fn tell(&self) -> u64;

    /// Whether a read has hit the end of the stream.
    fn eof(&self) -> bool;

    /// Whether the source has failed.
    fn bad(&self) -> bool;

    /// Total size in bytes, if known.
    fn size(&self) -> Option<u64>;
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn read_nonblocking(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_nonblocking(buf)
    }

    fn read_byte(&mut self) -> Result<u8> {
        (**self).read_byte()
    }

    fn seek(&mut self, pos: u64) -> Result<()> {
        (**self).seek(pos)
    }

    fn tell(&self) -> u64 {
        (**self).tell()
    }

    fn eof(&self) -> bool {
        (**self).eof()
    }

    fn bad(&self) -> bool {
        (**self).bad()
    }

    fn size(&self) -> Option<u64> {
        (**self).size()
    }
}
