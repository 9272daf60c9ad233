//! Threaded demux and buffering engine
//!
//! A [`ContainerParser`] turns a byte stream into frames one tag at a time.
//! [`MediaParser`] drives it from a background thread, keeps the decoded
//! frames in timestamp-ordered buffers and exposes them to a consumer.
//! The two share a [`ParserContext`] holding the state both sides read.

pub mod config;
pub mod cue;
pub mod frame;
pub mod meta;
pub mod parser;
pub mod queue;

pub use config::ParserConfig;
pub use cue::{CuePoint, CuePointIndex};
pub use frame::{AudioInfo, EncodedAudioFrame, EncodedVideoFrame, ExtraInfo, TimedFrame, VideoInfo};
pub use meta::{MetaTag, MetaTagMap};
pub use parser::MediaParser;
pub use queue::FrameBuffer;

use crate::util::Buffer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::OnceLock;

/// Outcome of scanning one tag
#[derive(Debug)]
pub enum ParseStep {
    /// Nothing left to scan for the requested cursor
    Idle,
    /// A tag was consumed without producing a frame
    Advanced,
    /// A tag of an unknown type was skipped
    Skipped(u8),
    Audio(EncodedAudioFrame),
    Video(EncodedVideoFrame),
}

impl ParseStep {
    /// Whether the cursor moved
    pub fn made_progress(&self) -> bool {
        !matches!(self, ParseStep::Idle)
    }
}

/// A container format the engine can drive.
///
/// Implementations own their byte source and two cursors: a full-parse
/// cursor that produces frames and an index cursor that only records cue
/// points. Stream-level failures are reported by setting the completion
/// flags on the context, never by returning errors.
pub trait ContainerParser: Send + 'static {
    /// Scan the next tag at the index cursor (`index_only`) or the
    /// full-parse cursor, returning any frame it yields.
    fn parse_next_tag(&mut self, ctx: &ParserContext, index_only: bool) -> ParseStep;

    /// First cue point at or after `time`
    fn find_cue_point(&self, time: u32) -> Option<CuePoint>;

    /// Move the full-parse cursor to `offset`
    fn reposition(&mut self, offset: u64);

    /// Current full-parse cursor
    fn position(&self) -> u64;

    fn cue_points(&self) -> Vec<CuePoint>;

    fn has_audio(&self) -> bool;

    fn has_video(&self) -> bool;

    /// Total size of the underlying stream, if known
    fn bytes_total(&self) -> Option<u64>;
}

/// State shared between a container parser and the engine driving it
#[derive(Debug)]
pub struct ParserContext {
    config: ParserConfig,
    parsing_complete: AtomicBool,
    indexing_complete: AtomicBool,
    seek_requested: AtomicBool,
    bytes_loaded: Mutex<u64>,
    meta_tags: Mutex<MetaTagMap>,
    audio_info: OnceLock<AudioInfo>,
    video_info: OnceLock<VideoInfo>,
}

impl ParserContext {
    pub fn new(config: ParserConfig) -> Self {
        ParserContext {
            config,
            parsing_complete: AtomicBool::new(false),
            indexing_complete: AtomicBool::new(false),
            seek_requested: AtomicBool::new(false),
            bytes_loaded: Mutex::new(0),
            meta_tags: Mutex::new(MetaTagMap::new()),
            audio_info: OnceLock::new(),
            video_info: OnceLock::new(),
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn parsing_completed(&self) -> bool {
        self.parsing_complete.load(Ordering::Acquire)
    }

    pub fn set_parsing_complete(&self, complete: bool) {
        self.parsing_complete.store(complete, Ordering::Release);
    }

    pub fn indexing_completed(&self) -> bool {
        self.indexing_complete.load(Ordering::Acquire)
    }

    pub fn set_indexing_complete(&self) {
        self.indexing_complete.store(true, Ordering::Release);
    }

    pub fn request_seek(&self) {
        self.seek_requested.store(true, Ordering::Release);
    }

    /// Clear the seek request, returning whether one was pending
    pub fn take_seek_request(&self) -> bool {
        self.seek_requested.swap(false, Ordering::AcqRel)
    }

    pub fn bytes_loaded(&self) -> u64 {
        *self.bytes_loaded.lock()
    }

    /// Raise the loaded high-water mark to `pos`
    pub fn update_bytes_loaded(&self, pos: u64) {
        let mut loaded = self.bytes_loaded.lock();
        if pos > *loaded {
            *loaded = pos;
        }
    }

    pub fn insert_meta_tag(&self, timestamp: u32, data: Buffer) {
        self.meta_tags.lock().insert(timestamp, data);
    }

    pub fn fetch_meta_tags(&self, ts: u32) -> Vec<MetaTag> {
        self.meta_tags.lock().fetch_up_to(ts)
    }

    pub fn audio_info(&self) -> Option<&AudioInfo> {
        self.audio_info.get()
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.video_info.get()
    }

    /// Publish the audio description; only the first call has an effect
    pub fn set_audio_info(&self, info: AudioInfo) -> bool {
        self.audio_info.set(info).is_ok()
    }

    /// Publish the video description; only the first call has an effect
    pub fn set_video_info(&self, info: VideoInfo) -> bool {
        self.video_info.set(info).is_ok()
    }
}
