//! FLV (Flash Video) container format
//!
//! FLV is Adobe's container format primarily used for web streaming.
//! A file is a 9-byte header followed by a chain of tags, each preceded by
//! the 4-byte size of the tag before it:
//!
//! ```text
//! header(9) | prev_size0(4) | tag(11 + body) | prev_size(4) | tag | ...
//! ```

pub mod amf0;
pub mod parser;
pub mod tag;
pub mod writer;

pub use amf0::{Amf0Value, ScriptData};
pub use parser::{FlvMediaParser, FlvParser};
pub use tag::{AudioFlags, VideoFlags};
pub use writer::FlvWriter;

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};

/// Size of the file header
pub const HEADER_SIZE: usize = 9;

/// Size of a tag header, not counting the first body byte
pub const TAG_HEADER_SIZE: usize = 11;

/// Bytes read at the start of every tag: the header plus the first body
/// byte (audio/video flags or the AMF0 marker of script data)
pub const TAG_PREFIX_SIZE: usize = TAG_HEADER_SIZE + 1;

/// Size of the "previous tag size" field between tags
pub const PREV_TAG_SIZE_LEN: usize = 4;

/// AMF0 type marker of the script data name string
pub const AMF0_STRING_MARKER: u8 = 0x02;

/// Value of the 3-byte AMF0 object-end sequence (`00 00 09`)
pub const AMF0_OBJECT_END: u32 = 9;

/// Read a 24-bit big-endian integer
///
/// # Panics
/// Panics if `bytes` is shorter than three bytes.
#[inline]
pub fn read_u24(bytes: &[u8]) -> u32 {
    BigEndian::read_u24(bytes)
}

/// FLV file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvHeader {
    pub signature: [u8; 3], // "FLV"
    pub version: u8,        // Usually 1
    pub has_video: bool,
    pub has_audio: bool,
    pub data_offset: u32, // Offset to first tag (usually 9)
}

impl FlvHeader {
    pub fn new(has_video: bool, has_audio: bool) -> Self {
        FlvHeader {
            signature: *b"FLV",
            version: 1,
            has_video,
            has_audio,
            data_offset: HEADER_SIZE as u32,
        }
    }

    /// Decode the 9-byte file header.
    ///
    /// Fails when fewer than nine bytes are given or the signature is not
    /// `"FLV"`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_SIZE {
            return Err(Error::invalid_header(format!(
                "need {} header bytes, got {}",
                HEADER_SIZE,
                data.len()
            )));
        }
        if &data[0..3] != b"FLV" {
            return Err(Error::invalid_header("missing FLV signature"));
        }

        let flags = data[4];
        Ok(FlvHeader {
            signature: *b"FLV",
            version: data[3],
            has_video: flags & 0x01 != 0,
            has_audio: flags & 0x04 != 0,
            data_offset: BigEndian::read_u32(&data[5..9]),
        })
    }

    /// Encode header to bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_SIZE);
        bytes.extend_from_slice(&self.signature);
        bytes.push(self.version);

        let mut flags = 0u8;
        if self.has_video {
            flags |= 0x01;
        }
        if self.has_audio {
            flags |= 0x04;
        }
        bytes.push(flags);

        bytes.extend_from_slice(&self.data_offset.to_be_bytes());
        bytes
    }
}

/// FLV tag type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlvTagType {
    Audio = 8,
    Video = 9,
    ScriptData = 18,
}

impl FlvTagType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            8 => Some(FlvTagType::Audio),
            9 => Some(FlvTagType::Video),
            18 => Some(FlvTagType::ScriptData),
            _ => None,
        }
    }
}

/// FLV tag header, as decoded from the 12-byte tag prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlvTagHeader {
    /// Raw tag type byte; see [`FlvTagHeader::kind`]
    pub tag_type: u8,
    /// Size of the tag body (24 bits)
    pub data_size: u32,
    /// Timestamp in milliseconds (24 bits + 8 bit extension)
    pub timestamp: u32,
    /// Always 0 (24 bits), ignored
    pub stream_id: u32,
    /// First body byte: codec flags, or the AMF0 marker of script data
    pub first_byte: u8,
}

impl FlvTagHeader {
    pub fn new(tag_type: FlvTagType, data_size: u32, timestamp: u32) -> Self {
        FlvTagHeader {
            tag_type: tag_type as u8,
            data_size,
            timestamp,
            stream_id: 0,
            first_byte: 0,
        }
    }

    /// Decode a tag prefix.
    ///
    /// The timestamp keeps the container's split layout: bytes 4..7 are the
    /// low 24 bits and byte 7 holds the most significant byte.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < TAG_PREFIX_SIZE {
            return Err(Error::Truncated {
                need: TAG_PREFIX_SIZE,
                have: data.len(),
            });
        }

        Ok(FlvTagHeader {
            tag_type: data[0],
            data_size: read_u24(&data[1..4]),
            timestamp: read_u24(&data[4..7]) | ((data[7] as u32) << 24),
            stream_id: read_u24(&data[8..11]),
            first_byte: data[11],
        })
    }

    /// The tag type, if it is one FLV defines
    pub fn kind(&self) -> Option<FlvTagType> {
        FlvTagType::from_u8(self.tag_type)
    }

    /// Value the trailing "previous tag size" field must hold
    pub fn expected_trailing_size(&self) -> u32 {
        self.data_size + TAG_HEADER_SIZE as u32
    }

    /// Encode the 11-byte tag header
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(TAG_HEADER_SIZE);

        bytes.push(self.tag_type);

        // Data size (24 bits)
        bytes.push(((self.data_size >> 16) & 0xFF) as u8);
        bytes.push(((self.data_size >> 8) & 0xFF) as u8);
        bytes.push((self.data_size & 0xFF) as u8);

        // Timestamp (24 bits) + extended (8 bits)
        bytes.push(((self.timestamp >> 16) & 0xFF) as u8);
        bytes.push(((self.timestamp >> 8) & 0xFF) as u8);
        bytes.push((self.timestamp & 0xFF) as u8);
        bytes.push(((self.timestamp >> 24) & 0xFF) as u8);

        // Stream ID (24 bits, always 0)
        bytes.push(0);
        bytes.push(0);
        bytes.push(0);

        bytes
    }
}

/// Video codec IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlvVideoCodec {
    H263 = 2,
    ScreenVideo = 3,
    VP6 = 4,
    VP6Alpha = 5,
    ScreenVideo2 = 6,
    AVC = 7,   // H.264
    HEVC = 12, // H.265, legacy extension using the AVC framing
}

impl FlvVideoCodec {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            2 => Some(FlvVideoCodec::H263),
            3 => Some(FlvVideoCodec::ScreenVideo),
            4 => Some(FlvVideoCodec::VP6),
            5 => Some(FlvVideoCodec::VP6Alpha),
            6 => Some(FlvVideoCodec::ScreenVideo2),
            7 => Some(FlvVideoCodec::AVC),
            12 => Some(FlvVideoCodec::HEVC),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlvVideoCodec::H263 => "h263",
            FlvVideoCodec::ScreenVideo => "screenvideo",
            FlvVideoCodec::VP6 => "vp6",
            FlvVideoCodec::VP6Alpha => "vp6a",
            FlvVideoCodec::ScreenVideo2 => "screenvideo2",
            FlvVideoCodec::AVC => "h264",
            FlvVideoCodec::HEVC => "h265",
        }
    }
}

/// Audio codec IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum FlvAudioCodec {
    PCM = 0,
    ADPCM = 1,
    MP3 = 2,
    PCMLittleEndian = 3,
    Nellymoser16kHz = 4,
    Nellymoser8kHz = 5,
    Nellymoser = 6,
    G711ALaw = 7,
    G711MuLaw = 8,
    AAC = 10,
    Speex = 11,
    MP3_8kHz = 14,
    DeviceSpecific = 15,
}

impl FlvAudioCodec {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FlvAudioCodec::PCM),
            1 => Some(FlvAudioCodec::ADPCM),
            2 => Some(FlvAudioCodec::MP3),
            3 => Some(FlvAudioCodec::PCMLittleEndian),
            4 => Some(FlvAudioCodec::Nellymoser16kHz),
            5 => Some(FlvAudioCodec::Nellymoser8kHz),
            6 => Some(FlvAudioCodec::Nellymoser),
            7 => Some(FlvAudioCodec::G711ALaw),
            8 => Some(FlvAudioCodec::G711MuLaw),
            10 => Some(FlvAudioCodec::AAC),
            11 => Some(FlvAudioCodec::Speex),
            14 => Some(FlvAudioCodec::MP3_8kHz),
            15 => Some(FlvAudioCodec::DeviceSpecific),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FlvAudioCodec::PCM => "pcm",
            FlvAudioCodec::ADPCM => "adpcm",
            FlvAudioCodec::MP3 => "mp3",
            FlvAudioCodec::PCMLittleEndian => "pcm_le",
            FlvAudioCodec::Nellymoser16kHz => "nellymoser16",
            FlvAudioCodec::Nellymoser8kHz => "nellymoser8",
            FlvAudioCodec::Nellymoser => "nellymoser",
            FlvAudioCodec::G711ALaw => "alaw",
            FlvAudioCodec::G711MuLaw => "mulaw",
            FlvAudioCodec::AAC => "aac",
            FlvAudioCodec::Speex => "speex",
            FlvAudioCodec::MP3_8kHz => "mp3_8khz",
            FlvAudioCodec::DeviceSpecific => "device",
        }
    }
}
