//! Integration tests for the buffering engine
//!
//! Seeking, background buffering, the seek/push race and progressive
//! sources, run against synthesised FLV streams.

use flvmedia::io::ProgressiveSource;
use flvmedia::media::TimedFrame;
use flvmedia::{FlvMediaParser, ParserConfig};
use std::thread;
use std::time::{Duration, Instant};

#[path = "common/mod.rs"]
mod common;

use common::*;

const TIMEOUT: Duration = Duration::from_secs(10);

#[test]
fn test_seek_round_trip() {
    let parser = open(av_file(3000, 40, 1000), single_threaded());
    while parser.next_video_frame().is_some() {}
    while parser.next_audio_frame().is_some() {}
    assert!(parser.parsing_completed());

    let cues: Vec<u32> = parser.cue_points().iter().map(|c| c.timestamp).collect();
    assert_eq!(cues, vec![0, 1000, 2000]);

    assert_eq!(parser.seek(1000), Some(1000));
    assert_eq!(parser.buffered_frames(), (0, 0));
    assert!(!parser.parsing_completed());

    let frame = parser.next_video_frame().unwrap();
    assert_eq!(frame.timestamp(), 1000);
    assert!(frame.is_keyframe());
    assert_eq!(parser.next_audio_frame().map(|f| f.timestamp()), Some(1000));
}

#[test]
fn test_seek_lands_on_next_cue_point() {
    let parser = open(av_file(3000, 40, 1000), single_threaded());
    while parser.next_video_frame().is_some() {}

    assert_eq!(parser.seek(999), Some(1000));
    assert_eq!(parser.seek(1001), Some(2000));
    assert_eq!(parser.next_video_frame().map(|f| f.timestamp()), Some(2000));

    // nothing indexed past 2000; the current position is kept
    assert_eq!(parser.seek(2500), None);
    assert_eq!(parser.next_video_frame().map(|f| f.timestamp()), Some(2040));
}

#[test]
fn test_seek_before_indexing_fails() {
    let parser = open(av_file(3000, 40, 1000), single_threaded());
    assert_eq!(parser.seek(2000), None);
    assert_eq!(parser.next_video_frame().map(|f| f.timestamp()), Some(0));
}

#[test]
fn test_threaded_delivery_in_order() {
    let parser = open(av_file(4000, 40, 1000), ParserConfig::default());
    assert!(parser.is_threaded());

    let mut timestamps = Vec::new();
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        match parser.next_video_frame() {
            Some(frame) => timestamps.push(frame.timestamp()),
            None if parser.parsing_completed() && parser.buffered_frames().1 == 0 => break,
            None => thread::sleep(Duration::from_millis(1)),
        }
    }

    assert_eq!(timestamps.len(), 100);
    assert!(timestamps.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(parser.bytes_loaded(), parser.bytes_total().unwrap());
}

#[test]
fn test_full_buffer_switches_to_indexing() {
    let parser = open(av_file(10_000, 40, 1000), ParserConfig::default());

    // nothing is consumed, so the parser fills the buffer then indexes ahead
    assert!(wait_until(TIMEOUT, || parser.indexing_completed()));
    assert!(parser.buffer_length() > parser.buffer_time());
    assert!(!parser.parsing_completed());

    let cues: Vec<u32> = parser.cue_points().iter().map(|c| c.timestamp).collect();
    assert_eq!(cues, (0..10).map(|s| s * 1000).collect::<Vec<_>>());

    // the index lets us jump far ahead of what was buffered
    assert_eq!(parser.seek(7000), Some(7000));
    assert!(wait_until(TIMEOUT, || parser.next_video_frame_timestamp().is_some()));
    assert_eq!(parser.next_video_frame().map(|f| f.timestamp()), Some(7000));
}

#[test]
fn test_seek_while_parser_waits_on_full_buffer() {
    // audio only: a single cue point at 0 (the next would need 5s)
    let parser = open(audio_file(200, 20), ParserConfig::default());
    assert!(wait_until(TIMEOUT, || {
        parser.indexing_completed() && parser.buffer_length() > parser.buffer_time()
    }));
    assert_eq!(parser.cue_points().len(), 1);
    assert_eq!(parser.seek(1), None);

    let started = Instant::now();
    assert_eq!(parser.seek(0), Some(0));
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(wait_until(TIMEOUT, || parser.next_audio_frame_timestamp().is_some()));
    assert_eq!(parser.next_audio_frame().map(|f| f.timestamp()), Some(0));
    assert_eq!(parser.next_audio_frame().map(|f| f.timestamp()), Some(20));
}

#[test]
fn test_repeated_seeks_never_deliver_stale_frames() {
    let parser = open(
        av_file(6000, 40, 1000),
        ParserConfig::default().with_buffer_time(400),
    );
    assert!(wait_until(TIMEOUT, || parser.indexing_completed()));

    for target in [3000, 1000, 5000, 0, 2000] {
        assert_eq!(parser.seek(target), Some(target));
        assert!(wait_until(TIMEOUT, || parser.next_video_frame_timestamp().is_some()));
        assert_eq!(parser.next_video_frame().map(|f| f.timestamp()), Some(target));
    }
}

#[test]
fn test_drop_stops_waiting_parser() {
    let parser = open(av_file(10_000, 40, 1000), ParserConfig::default());
    assert!(wait_until(TIMEOUT, || parser.buffer_length() > parser.buffer_time()));

    let started = Instant::now();
    drop(parser);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_progressive_source() {
    let bytes = av_file(2000, 40, 1000);
    let total = bytes.len() as u64;
    let (source, feed) = ProgressiveSource::new();

    let feeder = thread::spawn(move || {
        for chunk in bytes.chunks(97) {
            feed.append(chunk);
            thread::sleep(Duration::from_micros(200));
        }
        feed.finish();
    });

    let parser = FlvMediaParser::open_flv(source, ParserConfig::default()).unwrap();
    assert!(parser.video_info().is_some());

    let mut count = 0;
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        match parser.next_video_frame() {
            Some(_) => count += 1,
            None if parser.parsing_completed() && parser.buffered_frames().1 == 0 => break,
            None => thread::sleep(Duration::from_millis(1)),
        }
    }
    feeder.join().unwrap();

    assert_eq!(count, 50);
    assert_eq!(parser.bytes_total(), Some(total));
    assert_eq!(parser.bytes_loaded(), total);
}

#[test]
fn test_single_threaded_timestamps() {
    let parser = open(av_file(400, 40, 1000), single_threaded());
    assert!(!parser.is_threaded());
    assert_eq!(parser.next_frame_timestamp(), Some(0));
    parser.next_video_frame().unwrap();
    parser.next_audio_frame().unwrap();
    assert_eq!(parser.next_video_frame_timestamp(), Some(40));
    assert_eq!(parser.next_audio_frame_timestamp(), Some(40));
    assert_eq!(parser.buffer_length(), 0);
}
