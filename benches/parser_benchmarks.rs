//! FLV parsing benchmarks
//!
//! Full-parse and index-only scan throughput over synthesised files

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use flvmedia::format::flv::tag::{AudioFlags, FrameType, VideoFlags};
use flvmedia::format::flv::{FlvAudioCodec, FlvParser, FlvVideoCodec, FlvWriter};
use flvmedia::io::ReadSeekSource;
use flvmedia::media::{ContainerParser, ParserContext};
use flvmedia::{FlvMediaParser, ParserConfig};

/// Interleaved VP6 video (25 fps) and MP3 audio, key frame every second
fn create_test_file(seconds: u32, video_size: usize) -> Vec<u8> {
    let mut w = FlvWriter::new(Vec::new(), true, true);
    w.write_header().unwrap();
    let audio = AudioFlags::new(FlvAudioCodec::MP3, 44100, 2, true);
    let video_payload = vec![0x5Au8; video_size];
    let audio_payload = vec![0xA5u8; 418];

    for ts in (0..seconds * 1000).step_by(40) {
        let frame_type = if ts % 1000 == 0 {
            FrameType::Key
        } else {
            FrameType::Inter
        };
        w.write_video(VideoFlags::new(frame_type, FlvVideoCodec::VP6), &video_payload, ts)
            .unwrap();
        w.write_audio(audio, &audio_payload, ts).unwrap();
    }
    w.into_inner().unwrap()
}

fn bench_full_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("flv_full_parse");

    for video_size in [1024usize, 16 * 1024] {
        let file = create_test_file(10, video_size);
        group.throughput(Throughput::Bytes(file.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(video_size), &file, |b, file| {
            b.iter(|| {
                let parser = FlvMediaParser::open_flv(
                    ReadSeekSource::from_bytes(file.clone()),
                    ParserConfig::default().with_threaded(false),
                )
                .unwrap();
                let mut frames = 0;
                while let Some(frame) = parser.next_video_frame() {
                    black_box(&frame);
                    frames += 1;
                    while parser.next_audio_frame().is_some() {}
                }
                frames
            });
        });
    }

    group.finish();
}

fn bench_index_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("flv_index_only");
    let file = create_test_file(60, 4096);
    group.throughput(Throughput::Bytes(file.len() as u64));

    group.bench_function("60s", |b| {
        b.iter(|| {
            let mut parser = FlvParser::new(ReadSeekSource::from_bytes(file.clone())).unwrap();
            let ctx = ParserContext::new(ParserConfig::default());
            while parser.parse_next_tag(&ctx, true).made_progress() {}
            black_box(parser.cue_points().len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_full_parse, bench_index_only);
criterion_main!(benches);
