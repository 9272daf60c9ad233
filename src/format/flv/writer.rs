//! FLV writer
//!
//! Produces byte-exact FLV streams: header, `PreviousTagSize0`, then tags
//! each followed by their `11 + body` trailing size.

use super::amf0::ScriptData;
use super::tag::{AudioFlags, VideoFlags};
use super::{FlvHeader, FlvTagHeader, FlvTagType, PREV_TAG_SIZE_LEN, TAG_HEADER_SIZE};
use crate::error::{Error, Result};
use std::io::Write;

/// AAC / AVC packet types
const PACKET_SEQUENCE_HEADER: u8 = 0;
const PACKET_RAW: u8 = 1;

/// FLV writer
pub struct FlvWriter<W: Write> {
    writer: W,
    header: FlvHeader,
    started: bool,
    last_timestamp: u32,
    bytes_written: u64,
}

impl<W: Write> FlvWriter<W> {
    /// Create a new FLV writer
    pub fn new(writer: W, has_video: bool, has_audio: bool) -> Self {
        FlvWriter {
            writer,
            header: FlvHeader::new(has_video, has_audio),
            started: false,
            last_timestamp: 0,
            bytes_written: 0,
        }
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(())
    }

    /// Write previous tag size
    fn write_prev_tag_size(&mut self, size: u32) -> Result<()> {
        self.write_all(&size.to_be_bytes())
    }

    /// Write the file header and `PreviousTagSize0`
    pub fn write_header(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::invalid_state("Header already written"));
        }

        let header = self.header.to_bytes();
        self.write_all(&header)?;
        self.write_prev_tag_size(0)?;

        self.started = true;
        Ok(())
    }

    /// Offset the parser uses to address the next tag: the position of the
    /// size field that precedes it
    pub fn next_tag_offset(&self) -> u64 {
        self.bytes_written.saturating_sub(PREV_TAG_SIZE_LEN as u64)
    }

    /// Write a tag with an arbitrary type byte and trailing size.
    ///
    /// Returns the tag's offset as reported by [`FlvWriter::next_tag_offset`].
    pub fn write_raw_tag(
        &mut self,
        tag_type: u8,
        body: &[u8],
        timestamp: u32,
        trailing_size: u32,
    ) -> Result<u64> {
        if !self.started {
            return Err(Error::invalid_state("Header not written"));
        }
        if body.len() > 0x00FF_FFFF {
            return Err(Error::format(format!("tag body of {} bytes exceeds 24 bits", body.len())));
        }

        let offset = self.next_tag_offset();
        let mut header = FlvTagHeader::new(FlvTagType::Audio, body.len() as u32, timestamp);
        header.tag_type = tag_type;

        self.write_all(&header.to_bytes())?;
        self.write_all(body)?;
        self.write_prev_tag_size(trailing_size)?;

        self.last_timestamp = timestamp;
        Ok(offset)
    }

    /// Write a well-formed tag
    pub fn write_tag(&mut self, tag_type: FlvTagType, body: &[u8], timestamp: u32) -> Result<u64> {
        let trailing = TAG_HEADER_SIZE as u32 + body.len() as u32;
        self.write_raw_tag(tag_type as u8, body, timestamp, trailing)
    }

    /// Write an audio tag; AAC payloads are marked as raw frames
    pub fn write_audio(&mut self, flags: AudioFlags, payload: &[u8], timestamp: u32) -> Result<u64> {
        let mut body = vec![flags.to_byte()];
        if flags.codec_header_len() > 0 {
            body.push(PACKET_RAW);
        }
        body.extend_from_slice(payload);
        self.write_tag(FlvTagType::Audio, &body, timestamp)
    }

    /// Write an AAC AudioSpecificConfig
    pub fn write_aac_sequence_header(
        &mut self,
        flags: AudioFlags,
        config: &[u8],
        timestamp: u32,
    ) -> Result<u64> {
        let mut body = vec![flags.to_byte(), PACKET_SEQUENCE_HEADER];
        body.extend_from_slice(config);
        self.write_tag(FlvTagType::Audio, &body, timestamp)
    }

    /// Write a video tag, adding the codec's container header bytes
    pub fn write_video(&mut self, flags: VideoFlags, payload: &[u8], timestamp: u32) -> Result<u64> {
        let mut body = vec![flags.to_byte()];
        if flags.has_packet_type() {
            // packet type + zero composition time
            body.extend_from_slice(&[PACKET_RAW, 0, 0, 0]);
        } else {
            body.resize(1 + flags.codec_header_len() as usize, 0);
        }
        body.extend_from_slice(payload);
        self.write_tag(FlvTagType::Video, &body, timestamp)
    }

    /// Write an AVC decoder configuration record
    pub fn write_avc_sequence_header(
        &mut self,
        flags: VideoFlags,
        record: &[u8],
        timestamp: u32,
    ) -> Result<u64> {
        let mut body = vec![flags.to_byte(), PACKET_SEQUENCE_HEADER, 0, 0, 0];
        body.extend_from_slice(record);
        self.write_tag(FlvTagType::Video, &body, timestamp)
    }

    /// Write a script data tag
    pub fn write_script_data(&mut self, data: &ScriptData, timestamp: u32) -> Result<u64> {
        let body = data.encode();
        self.write_tag(FlvTagType::ScriptData, &body, timestamp)
    }

    /// Timestamp of the last tag written
    pub fn last_timestamp(&self) -> u32 {
        self.last_timestamp
    }

    /// Total bytes written
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flush and give back the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}
