//! Codec flag bytes and codec-specific payload framing
//!
//! Audio and video tags start their body with one flags byte. Some codecs
//! follow it with a few more header bytes that belong to the container, not
//! to the elementary stream, and must be stripped before the payload is
//! handed to a decoder.

use super::{FlvAudioCodec, FlvVideoCodec};
use crate::error::Result;
use crate::util::BitReader;

/// Sample rates addressed by bits 2-3 of the audio flags byte
pub const SAMPLE_RATES: [u32; 4] = [5500, 11000, 22050, 44100];

/// Packet type marking a decoder configuration record (AAC, AVC)
pub const SEQUENCE_HEADER: u8 = 0;

/// Decoded audio flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFlags {
    /// Codec id (high nibble)
    pub codec_id: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bytes per sample, 1 or 2
    pub sample_size: u8,
    pub stereo: bool,
}

impl AudioFlags {
    pub fn new(codec: FlvAudioCodec, sample_rate: u32, sample_size: u8, stereo: bool) -> Self {
        AudioFlags {
            codec_id: codec as u8,
            sample_rate,
            sample_size,
            stereo,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        AudioFlags {
            codec_id: (byte & 0xF0) >> 4,
            sample_rate: SAMPLE_RATES[((byte & 0x0C) >> 2) as usize],
            sample_size: if byte & 0x02 != 0 { 2 } else { 1 },
            stereo: byte & 0x01 != 0,
        }
    }

    /// Encode the flags byte; rates not in [`SAMPLE_RATES`] use the closest one
    pub fn to_byte(&self) -> u8 {
        let rate_index = SAMPLE_RATES
            .iter()
            .enumerate()
            .min_by_key(|(_, &rate)| rate.abs_diff(self.sample_rate))
            .map(|(i, _)| i as u8)
            .unwrap_or(0);

        let mut byte = (self.codec_id & 0x0F) << 4;
        byte |= rate_index << 2;
        if self.sample_size == 2 {
            byte |= 0x02;
        }
        if self.stereo {
            byte |= 0x01;
        }
        byte
    }

    pub fn codec(&self) -> Option<FlvAudioCodec> {
        FlvAudioCodec::from_u8(self.codec_id)
    }

    /// Container header bytes between the flags byte and the payload
    pub fn codec_header_len(&self) -> u32 {
        match self.codec() {
            Some(FlvAudioCodec::AAC) => 1,
            _ => 0,
        }
    }
}

/// Video frame types (high nibble of the video flags byte)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Key = 1,
    Inter = 2,
    DisposableInter = 3,
    GeneratedKey = 4,
    Command = 5,
}

impl FrameType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(FrameType::Key),
            2 => Some(FrameType::Inter),
            3 => Some(FrameType::DisposableInter),
            4 => Some(FrameType::GeneratedKey),
            5 => Some(FrameType::Command),
            _ => None,
        }
    }
}

/// Decoded video flags byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFlags {
    /// Frame type (high nibble)
    pub frame_type: u8,
    /// Codec id (low nibble)
    pub codec_id: u8,
}

impl VideoFlags {
    pub fn new(frame_type: FrameType, codec: FlvVideoCodec) -> Self {
        VideoFlags {
            frame_type: frame_type as u8,
            codec_id: codec as u8,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        VideoFlags {
            frame_type: (byte & 0xF0) >> 4,
            codec_id: byte & 0x0F,
        }
    }

    pub fn to_byte(&self) -> u8 {
        ((self.frame_type & 0x0F) << 4) | (self.codec_id & 0x0F)
    }

    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }

    pub fn is_keyframe(&self) -> bool {
        self.frame_type == FrameType::Key as u8
    }

    pub fn codec(&self) -> Option<FlvVideoCodec> {
        FlvVideoCodec::from_u8(self.codec_id)
    }

    /// Container header bytes between the flags byte and the payload.
    ///
    /// VP6 carries one adjustment byte; AVC carries a packet type plus a
    /// 24-bit composition time offset.
    pub fn codec_header_len(&self) -> u32 {
        match self.codec() {
            Some(FlvVideoCodec::VP6) | Some(FlvVideoCodec::VP6Alpha) => 1,
            Some(FlvVideoCodec::AVC) | Some(FlvVideoCodec::HEVC) => 4,
            _ => 0,
        }
    }

    /// Whether the first codec header byte is an AVC-style packet type
    pub fn has_packet_type(&self) -> bool {
        matches!(
            self.codec(),
            Some(FlvVideoCodec::AVC) | Some(FlvVideoCodec::HEVC)
        )
    }
}

/// Picture dimensions carried in the first bytes of a video payload.
///
/// Only Sorenson H.263 and Screen Video describe their size in a header
/// the container can read; other codecs return `None`.
pub fn probe_dimensions(codec: Option<FlvVideoCodec>, payload: &[u8]) -> Option<(u32, u32)> {
    let probed = match codec? {
        FlvVideoCodec::H263 => h263_dimensions(payload),
        FlvVideoCodec::ScreenVideo | FlvVideoCodec::ScreenVideo2 => {
            screen_video_dimensions(payload)
        }
        _ => return None,
    };
    probed.ok().flatten()
}

fn h263_dimensions(payload: &[u8]) -> Result<Option<(u32, u32)>> {
    let mut br = BitReader::new(payload);

    // picture start code
    if br.read_bits(17)? != 1 {
        return Ok(None);
    }
    // version, temporal reference
    br.skip_bits(5 + 8)?;

    let dims = match br.read_bits(3)? {
        0 => (br.read_bits(8)?, br.read_bits(8)?),
        1 => (br.read_bits(16)?, br.read_bits(16)?),
        2 => (352, 288),
        3 => (176, 144),
        4 => (128, 96),
        5 => (320, 240),
        6 => (160, 120),
        _ => return Ok(None),
    };
    Ok(Some(dims))
}

fn screen_video_dimensions(payload: &[u8]) -> Result<Option<(u32, u32)>> {
    let mut br = BitReader::new(payload);
    br.skip_bits(4)?; // block width
    let width = br.read_bits(12)?;
    br.skip_bits(4)?; // block height
    let height = br.read_bits(12)?;
    Ok(Some((width, height)))
}
