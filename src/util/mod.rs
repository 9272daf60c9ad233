//! Common utilities and data structures

pub mod bits;
pub mod buffer;

pub use bits::BitReader;
pub use buffer::{Buffer, BufferRef};

use std::fmt;

/// Kinds of elementary stream carried by an FLV file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// Video stream
    Video,
    /// Audio stream
    Audio,
    /// Script data (metadata) stream
    Data,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaType::Video => write!(f, "video"),
            MediaType::Audio => write!(f, "audio"),
            MediaType::Data => write!(f, "data"),
        }
    }
}
