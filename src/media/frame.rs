//! Encoded frames and stream descriptions handed to decoders

use crate::format::flv::{FlvAudioCodec, FlvVideoCodec};
use crate::util::Buffer;
use std::fmt;

/// Decoder initialisation data attached to a stream or frame.
///
/// Each variant belongs to the decoder family that knows how to use it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExtraInfo {
    /// Codec configuration bytes taken from an FLV sequence header
    /// (AAC AudioSpecificConfig, AVC decoder configuration record)
    Flv(Buffer),
}

impl ExtraInfo {
    /// The FLV sequence header bytes, if that is what this holds
    pub fn as_flv(&self) -> Option<&Buffer> {
        match self {
            ExtraInfo::Flv(buf) => Some(buf),
        }
    }
}

/// Anything queued by presentation time
pub trait TimedFrame {
    /// Presentation timestamp in milliseconds
    fn timestamp(&self) -> u32;
}

/// An encoded audio frame
#[derive(Debug)]
pub struct EncodedAudioFrame {
    data: Buffer,
    timestamp: u32,
    extra: Option<ExtraInfo>,
}

impl EncodedAudioFrame {
    pub fn new(data: Buffer, timestamp: u32) -> Self {
        EncodedAudioFrame {
            data,
            timestamp,
            extra: None,
        }
    }

    /// Attach decoder data to this frame
    pub fn with_extra(mut self, extra: ExtraInfo) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Payload, zero padded past [`EncodedAudioFrame::size`]
    pub fn data(&self) -> &Buffer {
        &self.data
    }

    /// Number of payload bytes actually read
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn extra(&self) -> Option<&ExtraInfo> {
        self.extra.as_ref()
    }

    pub fn into_data(self) -> Buffer {
        self.data
    }
}

impl TimedFrame for EncodedAudioFrame {
    fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

/// An encoded video frame
#[derive(Debug)]
pub struct EncodedVideoFrame {
    data: Buffer,
    timestamp: u32,
    frame_num: u32,
    keyframe: bool,
    extra: Option<ExtraInfo>,
}

impl EncodedVideoFrame {
    pub fn new(data: Buffer, timestamp: u32, frame_num: u32) -> Self {
        EncodedVideoFrame {
            data,
            timestamp,
            frame_num,
            keyframe: false,
            extra: None,
        }
    }

    pub fn with_keyframe(mut self, keyframe: bool) -> Self {
        self.keyframe = keyframe;
        self
    }

    /// Attach decoder data to this frame
    pub fn with_extra(mut self, extra: ExtraInfo) -> Self {
        self.extra = Some(extra);
        self
    }

    /// Payload, zero padded past [`EncodedVideoFrame::size`]
    pub fn data(&self) -> &Buffer {
        &self.data
    }

    /// Number of payload bytes actually read
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Sequence number of this frame within the stream
    pub fn frame_num(&self) -> u32 {
        self.frame_num
    }

    pub fn is_keyframe(&self) -> bool {
        self.keyframe
    }

    pub fn extra(&self) -> Option<&ExtraInfo> {
        self.extra.as_ref()
    }

    pub fn into_data(self) -> Buffer {
        self.data
    }
}

impl TimedFrame for EncodedVideoFrame {
    fn timestamp(&self) -> u32 {
        self.timestamp
    }
}

impl fmt::Display for EncodedVideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VideoFrame(num={}, size={}, ts={}, key={})",
            self.frame_num,
            self.size(),
            self.timestamp,
            self.keyframe
        )
    }
}

impl fmt::Display for EncodedAudioFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioFrame(size={}, ts={})", self.size(), self.timestamp)
    }
}

/// Audio stream information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioInfo {
    /// FLV sound format id
    pub codec_id: u8,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bytes per sample
    pub sample_size: u8,
    pub stereo: bool,
    /// Duration in milliseconds, 0 if unknown
    pub duration: u64,
    /// Decoder configuration, e.g. the AAC AudioSpecificConfig
    pub extra: Option<ExtraInfo>,
}

impl AudioInfo {
    pub fn codec(&self) -> Option<FlvAudioCodec> {
        FlvAudioCodec::from_u8(self.codec_id)
    }

    pub fn channels(&self) -> u16 {
        if self.stereo {
            2
        } else {
            1
        }
    }
}

/// Video stream information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInfo {
    /// FLV codec id
    pub codec_id: u8,
    /// Width in pixels, 0 if the container does not say
    pub width: u32,
    /// Height in pixels, 0 if the container does not say
    pub height: u32,
    /// Frames per second, 0 if unknown
    pub frame_rate: u16,
    /// Duration in milliseconds, 0 if unknown
    pub duration: u64,
    /// Decoder configuration, e.g. the AVC decoder configuration record
    pub extra: Option<ExtraInfo>,
}

impl VideoInfo {
    pub fn codec(&self) -> Option<FlvVideoCodec> {
        FlvVideoCodec::from_u8(self.codec_id)
    }
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codec = self.codec().map(|c| c.name()).unwrap_or("unknown");
        write!(
            f,
            "codec:{} (id {}) - size:{}x{} - frameRate:{} - duration:{}",
            codec, self.codec_id, self.width, self.height, self.frame_rate, self.duration
        )
    }
}

impl fmt::Display for AudioInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let codec = self.codec().map(|c| c.name()).unwrap_or("unknown");
        write!(
            f,
            "codec:{} (id {}) - rate:{} - sampleSize:{} - channels:{}",
            codec,
            self.codec_id,
            self.sample_rate,
            self.sample_size,
            self.channels()
        )
    }
}
