//! Common test utilities for flvmedia integration tests
//!
//! Builders that synthesise FLV byte streams with the crate's own writer,
//! plus small helpers for opening and polling parsers.

#![allow(dead_code)]

use flvmedia::format::flv::tag::{AudioFlags, FrameType, VideoFlags};
use flvmedia::format::flv::{FlvAudioCodec, FlvVideoCodec, FlvWriter};
use flvmedia::io::ReadSeekSource;
use flvmedia::{FlvMediaParser, ParserConfig};
use std::io::Cursor;
use std::time::{Duration, Instant};

pub type MemoryParser = FlvMediaParser<ReadSeekSource<Cursor<Vec<u8>>>>;

/// Sorenson H.263 picture header announcing 320x240
pub const H263_QVGA: [u8; 6] = [0x00, 0x00, 0x80, 0x02, 0x80, 0x00];

pub fn mp3_flags() -> AudioFlags {
    AudioFlags::new(FlvAudioCodec::MP3, 44100, 2, true)
}

pub fn aac_flags() -> AudioFlags {
    AudioFlags::new(FlvAudioCodec::AAC, 44100, 2, true)
}

pub fn video_flags(codec: FlvVideoCodec, keyframe: bool) -> VideoFlags {
    let frame_type = if keyframe {
        FrameType::Key
    } else {
        FrameType::Inter
    };
    VideoFlags::new(frame_type, codec)
}

/// Started writer over an in-memory buffer
pub fn writer(has_video: bool, has_audio: bool) -> FlvWriter<Vec<u8>> {
    let mut w = FlvWriter::new(Vec::new(), has_video, has_audio);
    w.write_header().expect("header");
    w
}

/// Interleaved H.263 video and MP3 audio, one of each every `step` ms,
/// with a video key frame whenever the timestamp is a multiple of
/// `keyframe_interval`.
pub fn av_file(duration_ms: u32, step: u32, keyframe_interval: u32) -> Vec<u8> {
    let mut w = writer(true, true);
    let mut ts = 0;
    while ts < duration_ms {
        let key = ts % keyframe_interval == 0;
        let mut payload = H263_QVGA.to_vec();
        payload.extend_from_slice(&[0x11; 26]);
        w.write_video(video_flags(FlvVideoCodec::H263, key), &payload, ts)
            .expect("video tag");
        w.write_audio(mp3_flags(), &[0x22; 24], ts).expect("audio tag");
        ts += step;
    }
    w.into_inner().expect("flush")
}

/// MP3 audio only, `count` frames `step` ms apart
pub fn audio_file(count: u32, step: u32) -> Vec<u8> {
    let mut w = writer(false, true);
    for i in 0..count {
        w.write_audio(mp3_flags(), &[0x33; 32], i * step)
            .expect("audio tag");
    }
    w.into_inner().expect("flush")
}

pub fn single_threaded() -> ParserConfig {
    ParserConfig::default().with_threaded(false)
}

pub fn open(bytes: Vec<u8>, config: ParserConfig) -> MemoryParser {
    FlvMediaParser::open_flv(ReadSeekSource::from_bytes(bytes), config).expect("valid FLV")
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}
