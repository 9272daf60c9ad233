//! Background parsing engine
//!
//! [`MediaParser`] owns a [`ContainerParser`] and, in threaded mode, a worker
//! thread that keeps the audio and video buffers topped up to the configured
//! buffer time. When the buffers are full the worker switches to index-only
//! scanning so cue points become available ahead of playback, then sleeps
//! until the consumer pops a frame, seeks, or shuts it down.
//!
//! Locking: the stream lock guards the container parser and is never held
//! while the queue lock is taken. Frames are produced under the stream lock,
//! carried out of it, then pushed under the queue lock.

use super::frame::{AudioInfo, EncodedAudioFrame, EncodedVideoFrame, VideoInfo};
use super::{ContainerParser, CuePoint, FrameBuffer, MetaTag, ParseStep, ParserConfig, ParserContext};
use crate::error::Result;
use crate::util::MediaType;
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Barrier};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, trace};

const UNKNOWN_SIZE: u64 = u64::MAX;

/// Frame buffers plus the seek epoch their contents belong to
struct Queues {
    audio: FrameBuffer<EncodedAudioFrame>,
    video: FrameBuffer<EncodedVideoFrame>,
    epoch: u64,
}

impl Queues {
    /// Whether frames parsed during `epoch` may enter the buffers.
    /// A newer epoch flushes whatever the buffers still hold.
    fn admit(&mut self, epoch: u64) -> bool {
        if epoch < self.epoch {
            return false;
        }
        if epoch > self.epoch {
            self.flush(epoch);
        }
        true
    }

    fn flush(&mut self, epoch: u64) -> usize {
        self.epoch = epoch;
        self.audio.clear() + self.video.clear()
    }

    fn is_empty(&self, kind: MediaType) -> bool {
        match kind {
            MediaType::Audio => self.audio.is_empty(),
            _ => self.video.is_empty(),
        }
    }
}

struct StreamState<P> {
    parser: P,
    epoch: u64,
}

struct Shared<P> {
    ctx: ParserContext,
    stream: Mutex<StreamState<P>>,
    queues: Mutex<Queues>,
    wakeup: Condvar,
    kill: AtomicBool,
    buffer_time: AtomicU64,
    bytes_total: AtomicU64,
    advertises_audio: bool,
    advertises_video: bool,
}

impl<P: ContainerParser> Shared<P> {
    /// Buffered presentation time in ms over the streams that exist
    fn buffer_length(&self, q: &Queues) -> u64 {
        let has_audio = self.ctx.audio_info().is_some();
        let has_video = self.ctx.video_info().is_some();
        match (has_audio, has_video) {
            (true, true) => q.audio.span().min(q.video.span()),
            (true, false) => q.audio.span(),
            (false, true) => q.video.span(),
            (false, false) => 0,
        }
    }

    fn buffer_full(&self, q: &Queues) -> bool {
        self.buffer_length(q) > self.buffer_time.load(Ordering::Relaxed)
    }

    /// Nothing useful left to do until the consumer acts
    fn should_sleep(&self, q: &Queues) -> bool {
        self.ctx.parsing_completed() || (self.buffer_full(q) && self.ctx.indexing_completed())
    }

    fn wait_if_needed(&self, q: &mut MutexGuard<'_, Queues>) {
        if !self.kill.load(Ordering::Acquire) && self.should_sleep(q) {
            trace!("parser thread going to sleep");
            self.wakeup.wait(q);
        }
    }

    /// Scan one tag, index-only when the buffers are already full
    fn parse_next_chunk(&self, wait: bool) -> bool {
        let index_only = {
            let q = self.queues.lock();
            self.buffer_full(&q)
        };
        self.parse_chunk(index_only, wait)
    }

    fn parse_chunk(&self, index_only: bool, wait: bool) -> bool {
        let (step, epoch, flush) = {
            let mut stream = self.stream.lock();
            let flush = self.ctx.take_seek_request();
            let step = stream.parser.parse_next_tag(&self.ctx, index_only);
            if let Some(total) = stream.parser.bytes_total() {
                self.bytes_total.store(total, Ordering::Relaxed);
            }
            (step, stream.epoch, flush)
        };

        if flush {
            self.flush_for(epoch);
        }

        match step {
            ParseStep::Idle => false,
            ParseStep::Advanced | ParseStep::Skipped(_) => true,
            ParseStep::Audio(frame) => {
                self.push_audio(frame, epoch, wait);
                true
            }
            ParseStep::Video(frame) => {
                self.push_video(frame, epoch, wait);
                true
            }
        }
    }

    fn push_audio(&self, frame: EncodedAudioFrame, epoch: u64, wait: bool) {
        let mut q = self.queues.lock();
        if !q.admit(epoch) {
            trace!("dropping {} parsed before seek", frame);
            return;
        }
        trace!("pushing {}", frame);
        q.audio.insert(frame);
        if wait {
            self.wait_if_needed(&mut q);
        }
    }

    fn push_video(&self, frame: EncodedVideoFrame, epoch: u64, wait: bool) {
        let mut q = self.queues.lock();
        if !q.admit(epoch) {
            trace!("dropping {} parsed before seek", frame);
            return;
        }
        trace!("pushing {}", frame);
        q.video.insert(frame);
        if wait {
            self.wait_if_needed(&mut q);
        }
    }

    /// Empty the buffers for a seek and wake the parser thread
    fn flush_for(&self, epoch: u64) {
        let mut q = self.queues.lock();
        if epoch > q.epoch {
            let dropped = q.flush(epoch);
            debug!("flushed {} buffered frames after seek", dropped);
        }
        self.wakeup.notify_all();
    }

    fn run(&self) {
        debug!("parser thread started");
        while !self.kill.load(Ordering::Acquire) {
            self.parse_next_chunk(true);
            thread::sleep(self.ctx.config().yield_interval);

            let mut q = self.queues.lock();
            self.wait_if_needed(&mut q);
        }
        debug!("parser thread exiting");
    }
}

/// Demuxer front end delivering timestamp-ordered frames
pub struct MediaParser<P: ContainerParser> {
    shared: Arc<Shared<P>>,
    worker: Option<JoinHandle<()>>,
}

impl<P: ContainerParser> MediaParser<P> {
    /// Wrap `parser`, probe for stream infos and start the parser thread
    /// if the configuration asks for one.
    pub fn new(parser: P, config: ParserConfig) -> Result<Self> {
        config.validate()?;
        let threaded = config.threaded;
        let probe = config.probe_stream_info;

        let ctx = ParserContext::new(config);
        ctx.update_bytes_loaded(parser.position());
        let buffer_time = ctx.config().buffer_time_ms;

        let shared = Arc::new(Shared {
            bytes_total: AtomicU64::new(parser.bytes_total().unwrap_or(UNKNOWN_SIZE)),
            advertises_audio: parser.has_audio(),
            advertises_video: parser.has_video(),
            ctx,
            stream: Mutex::new(StreamState { parser, epoch: 0 }),
            queues: Mutex::new(Queues {
                audio: FrameBuffer::new(),
                video: FrameBuffer::new(),
                epoch: 0,
            }),
            wakeup: Condvar::new(),
            kill: AtomicBool::new(false),
            buffer_time: AtomicU64::new(buffer_time),
        });

        let mut media = MediaParser {
            shared,
            worker: None,
        };
        if probe {
            media.probe_stream_info();
        }
        if threaded {
            media.start_parser_thread()?;
        }
        Ok(media)
    }

    fn start_parser_thread(&mut self) -> Result<()> {
        let started = Arc::new(Barrier::new(2));
        let ready = Arc::clone(&started);
        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("media-parser".into())
            .spawn(move || {
                ready.wait();
                shared.run();
            })?;
        started.wait();
        self.worker = Some(handle);
        Ok(())
    }

    /// Parse until every advertised stream has described itself
    fn probe_stream_info(&self) {
        let s = &self.shared;
        let missing = || {
            (s.advertises_audio && s.ctx.audio_info().is_none())
                || (s.advertises_video && s.ctx.video_info().is_none())
        };

        while missing() && !s.ctx.parsing_completed() {
            if s.buffer_full(&s.queues.lock()) {
                break;
            }
            if !s.parse_chunk(false, false) {
                break;
            }
        }

        if s.advertises_video && s.ctx.video_info().is_none() {
            error!("header advertises video but no video stream info was found");
        }
        if s.advertises_audio && s.ctx.audio_info().is_none() {
            error!("header advertises audio but no audio stream info was found");
        }
    }

    /// Ask the parser thread to exit and wait for it
    pub fn stop_parser_thread(&mut self) {
        self.shared.kill.store(true, Ordering::Release);
        {
            let _q = self.shared.queues.lock();
            self.shared.wakeup.notify_all();
        }
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("parser thread panicked");
            }
        }
    }

    /// Scan one tag from the calling thread.
    ///
    /// Returns false once there is nothing left to scan.
    pub fn parse_next_chunk(&self) -> bool {
        self.shared.parse_next_chunk(false)
    }

    /// Seek to the first cue point at or after `time` (ms).
    ///
    /// Returns the cue point's timestamp, or `None` without changing any
    /// state when no such cue point has been indexed yet.
    pub fn seek(&self, time: u32) -> Option<u32> {
        let s = &self.shared;
        let (epoch, target) = {
            let mut stream = s.stream.lock();
            let cue = match stream.parser.find_cue_point(time) {
                Some(cue) => cue,
                None => {
                    debug!("no cue point at or after {}ms", time);
                    return None;
                }
            };
            debug!(
                "seek to {}ms lands on cue point {}ms at offset {}",
                time, cue.timestamp, cue.offset
            );
            stream.parser.reposition(cue.offset);
            s.ctx.set_parsing_complete(false);
            s.ctx.request_seek();
            stream.epoch += 1;
            (stream.epoch, cue.timestamp)
        };
        s.flush_for(epoch);
        Some(target)
    }

    /// Single-threaded mode: parse until a `kind` frame is buffered or
    /// there is no more to parse.
    fn drive(&self, kind: MediaType) {
        if self.worker.is_some() {
            return;
        }
        let s = &self.shared;
        let expected = match kind {
            MediaType::Audio => s.ctx.audio_info().is_some() || s.advertises_audio,
            _ => s.ctx.video_info().is_some() || s.advertises_video,
        };
        if !expected {
            return;
        }
        while !s.ctx.parsing_completed() && s.queues.lock().is_empty(kind) {
            if !s.parse_chunk(false, false) {
                break;
            }
        }
    }

    pub fn next_audio_frame(&self) -> Option<EncodedAudioFrame> {
        self.drive(MediaType::Audio);
        let mut q = self.shared.queues.lock();
        let frame = q.audio.pop_front();
        if frame.is_some() {
            self.shared.wakeup.notify_all();
        }
        frame
    }

    pub fn next_video_frame(&self) -> Option<EncodedVideoFrame> {
        self.drive(MediaType::Video);
        let mut q = self.shared.queues.lock();
        let frame = q.video.pop_front();
        if frame.is_some() {
            self.shared.wakeup.notify_all();
        }
        frame
    }

    pub fn next_audio_frame_timestamp(&self) -> Option<u32> {
        self.drive(MediaType::Audio);
        self.shared.queues.lock().audio.front_timestamp()
    }

    pub fn next_video_frame_timestamp(&self) -> Option<u32> {
        self.drive(MediaType::Video);
        self.shared.queues.lock().video.front_timestamp()
    }

    /// Earliest timestamp across both buffers
    pub fn next_frame_timestamp(&self) -> Option<u32> {
        self.drive(MediaType::Audio);
        self.drive(MediaType::Video);
        let q = self.shared.queues.lock();
        match (q.audio.front_timestamp(), q.video.front_timestamp()) {
            (Some(a), Some(v)) => Some(a.min(v)),
            (a, v) => a.or(v),
        }
    }

    /// Buffered presentation time in ms
    pub fn buffer_length(&self) -> u64 {
        let q = self.shared.queues.lock();
        self.shared.buffer_length(&q)
    }

    /// Number of buffered (audio, video) frames
    pub fn buffered_frames(&self) -> (usize, usize) {
        let q = self.shared.queues.lock();
        (q.audio.len(), q.video.len())
    }

    pub fn buffer_time(&self) -> u64 {
        self.shared.buffer_time.load(Ordering::Relaxed)
    }

    /// Change the target buffer depth; a larger target wakes the parser
    pub fn set_buffer_time(&self, ms: u64) {
        self.shared.buffer_time.store(ms, Ordering::Relaxed);
        let _q = self.shared.queues.lock();
        self.shared.wakeup.notify_all();
    }

    pub fn bytes_loaded(&self) -> u64 {
        self.shared.ctx.bytes_loaded()
    }

    pub fn bytes_total(&self) -> Option<u64> {
        match self.shared.bytes_total.load(Ordering::Relaxed) {
            UNKNOWN_SIZE => None,
            total => Some(total),
        }
    }

    pub fn audio_info(&self) -> Option<&AudioInfo> {
        self.shared.ctx.audio_info()
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        self.shared.ctx.video_info()
    }

    pub fn parsing_completed(&self) -> bool {
        self.shared.ctx.parsing_completed()
    }

    pub fn indexing_completed(&self) -> bool {
        self.shared.ctx.indexing_completed()
    }

    /// Remove and return script data up to and including `ts`
    pub fn fetch_meta_tags(&self, ts: u32) -> Vec<MetaTag> {
        self.shared.ctx.fetch_meta_tags(ts)
    }

    pub fn cue_points(&self) -> Vec<CuePoint> {
        self.shared.stream.lock().parser.cue_points()
    }

    pub fn is_threaded(&self) -> bool {
        self.worker.is_some()
    }

    pub fn config(&self) -> &ParserConfig {
        self.shared.ctx.config()
    }
}

impl<P: ContainerParser> Drop for MediaParser<P> {
    /// Blocks until the parser thread has exited. A thread stuck in a
    /// blocking read of a progressive source exits once that source is
    /// finished or failed.
    fn drop(&mut self) {
        self.stop_parser_thread();
    }
}
