//! Buffer management for encoded payloads
//!
//! Every payload handed to a downstream decoder carries a zero-filled tail
//! past its logical size, so decoders that read a few bytes ahead never
//! touch memory they do not own.

use bytes::{Bytes, BytesMut};

/// An immutable payload with a zero-filled padding tail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Bytes,
    len: usize,
}

impl Buffer {
    /// Copy `data` into a new buffer padded with `padding` zero bytes
    pub fn padded(data: &[u8], padding: usize) -> Self {
        let mut buf = BufferRef::zeroed(data.len(), padding);
        buf.as_mut()[..data.len()].copy_from_slice(data);
        buf.freeze(data.len())
    }

    /// Create a buffer from a vector, without padding
    pub fn from_vec(vec: Vec<u8>) -> Self {
        let len = vec.len();
        Buffer {
            data: Bytes::from(vec),
            len,
        }
    }

    /// Create an empty buffer
    pub fn empty() -> Self {
        Buffer {
            data: Bytes::new(),
            len: 0,
        }
    }

    /// Logical length of the payload
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The payload bytes, without padding
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The payload followed by its zero padding
    pub fn padded_slice(&self) -> &[u8] {
        &self.data
    }

    /// Number of zero bytes following the payload
    pub fn padding(&self) -> usize {
        self.data.len() - self.len
    }

    /// Clone the underlying bytes including padding (cheap, reference counted)
    pub fn clone_bytes(&self) -> Bytes {
        self.data.clone()
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// A mutable, zero-initialised buffer being filled from a byte source
pub struct BufferRef {
    data: BytesMut,
}

impl BufferRef {
    /// Allocate `size + padding` zero bytes
    pub fn zeroed(size: usize, padding: usize) -> Self {
        BufferRef {
            data: BytesMut::zeroed(size + padding),
        }
    }

    /// Total allocated length, padding included
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if nothing was allocated
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get mutable access to the buffer
    pub fn as_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Freeze into an immutable [`Buffer`] whose logical size is `filled`.
    ///
    /// Bytes from `filled` to the end are zeroed again, so a partially
    /// filled buffer never exposes stale data past its logical size.
    pub fn freeze(mut self, filled: usize) -> Buffer {
        let filled = filled.min(self.data.len());
        self.data[filled..].fill(0);
        Buffer {
            data: self.data.freeze(),
            len: filled,
        }
    }
}
