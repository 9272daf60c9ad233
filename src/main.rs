//! flvmedia CLI
//!
//! Inspect FLV files and list the frames the buffering engine delivers

use clap::{Parser, Subcommand};
use flvmedia::format::flv::Amf0Value;
use flvmedia::io::ReadSeekSource;
use flvmedia::{init, Config, FlvParser, MediaParser, ParserConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(name = "flvmedia")]
#[command(about = "FLV demuxer and buffering engine", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show header flags, stream information and script data
    Info {
        /// Input file path
        input: PathBuf,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// List the frames delivered to a consumer
    Frames {
        /// Input file path
        input: PathBuf,

        /// Seek to this time (ms) before listing
        #[arg(long)]
        seek: Option<u32>,

        /// Stop after this many frames
        #[arg(short, long)]
        limit: Option<usize>,

        /// Parse on the calling thread instead of a background thread
        #[arg(long)]
        single_threaded: bool,

        /// Buffer time in milliseconds
        #[arg(long, default_value = "100")]
        buffer_time: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init(Config {
        verbose: cli.verbose,
        debug: cli.debug,
    })?;

    info!("flvmedia v{}", flvmedia::VERSION);

    match cli.command {
        Commands::Info { input, json } => cmd_info(&input, json)?,
        Commands::Frames {
            input,
            seek,
            limit,
            single_threaded,
            buffer_time,
        } => {
            let config = ParserConfig::default()
                .with_threaded(!single_threaded)
                .with_buffer_time(buffer_time);
            cmd_frames(&input, config, seek, limit)?;
        }
    }

    Ok(())
}

type FileParser = MediaParser<FlvParser<ReadSeekSource<std::io::BufReader<std::fs::File>>>>;

fn open(input: &Path, config: ParserConfig) -> anyhow::Result<FileParser> {
    let source = ReadSeekSource::open(input)
        .map_err(|e| anyhow::anyhow!("Failed to open {}: {}", input.display(), e))?;
    MediaParser::open_flv(source, config)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", input.display(), e))
}

fn amf_to_json(value: &Amf0Value) -> serde_json::Value {
    use serde_json::Value;

    let object = |props: &[(String, Amf0Value)]| {
        Value::Object(
            props
                .iter()
                .map(|(k, v)| (k.clone(), amf_to_json(v)))
                .collect(),
        )
    };

    match value {
        Amf0Value::Number(n) => serde_json::json!(n),
        Amf0Value::Boolean(b) => Value::Bool(*b),
        Amf0Value::String(s) | Amf0Value::LongString(s) => Value::String(s.clone()),
        Amf0Value::Object(props) | Amf0Value::EcmaArray(props) => object(props),
        Amf0Value::StrictArray(items) => Value::Array(items.iter().map(amf_to_json).collect()),
        Amf0Value::Date { millis, .. } => serde_json::json!({ "date": millis }),
        Amf0Value::Reference(idx) => serde_json::json!({ "reference": idx }),
        Amf0Value::Null | Amf0Value::Undefined => Value::Null,
    }
}

fn cmd_info(input: &Path, json: bool) -> anyhow::Result<()> {
    #[derive(Serialize)]
    struct InfoResult {
        file: String,
        bytes_total: Option<u64>,
        bytes_loaded: u64,
        cue_points: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        video: Option<VideoProbe>,
        #[serde(skip_serializing_if = "Option::is_none")]
        audio: Option<AudioProbe>,
        script_data: Vec<ScriptProbe>,
    }

    #[derive(Serialize)]
    struct VideoProbe {
        codec: String,
        codec_id: u8,
        width: u32,
        height: u32,
        has_decoder_config: bool,
    }

    #[derive(Serialize)]
    struct AudioProbe {
        codec: String,
        codec_id: u8,
        sample_rate: u32,
        sample_size: u8,
        channels: u16,
        has_decoder_config: bool,
    }

    #[derive(Serialize)]
    struct ScriptProbe {
        timestamp: u32,
        name: String,
        value: serde_json::Value,
    }

    // Scan on this thread so the whole file is indexed before reporting
    let parser = open(input, ParserConfig::default().with_threaded(false))?;
    loop {
        let audio = parser.next_audio_frame();
        let video = parser.next_video_frame();
        if audio.is_none() && video.is_none() && !parser.parse_next_chunk() {
            break;
        }
    }

    let mut script_data = Vec::new();
    for tag in parser.fetch_meta_tags(u32::MAX) {
        match tag.decode() {
            Ok(script) => script_data.push(ScriptProbe {
                timestamp: tag.timestamp,
                name: script.name,
                value: amf_to_json(&script.value),
            }),
            Err(e) => eprintln!("Warning: undecodable script data at {}ms: {}", tag.timestamp, e),
        }
    }

    let result = InfoResult {
        file: input.display().to_string(),
        bytes_total: parser.bytes_total(),
        bytes_loaded: parser.bytes_loaded(),
        cue_points: parser.cue_points().len(),
        video: parser.video_info().map(|v| VideoProbe {
            codec: v.codec().map(|c| c.name()).unwrap_or("unknown").to_string(),
            codec_id: v.codec_id,
            width: v.width,
            height: v.height,
            has_decoder_config: v.extra.is_some(),
        }),
        audio: parser.audio_info().map(|a| AudioProbe {
            codec: a.codec().map(|c| c.name()).unwrap_or("unknown").to_string(),
            codec_id: a.codec_id,
            sample_rate: a.sample_rate,
            sample_size: a.sample_size,
            channels: a.channels(),
            has_decoder_config: a.extra.is_some(),
        }),
        script_data,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("File: {}", result.file);
    match result.bytes_total {
        Some(total) => println!("  Size: {} bytes ({} scanned)", total, result.bytes_loaded),
        None => println!("  Scanned: {} bytes", result.bytes_loaded),
    }
    println!("  Cue points: {}", result.cue_points);
    if let Some(video) = parser.video_info() {
        println!("  Video: {}", video);
    }
    if let Some(audio) = parser.audio_info() {
        println!("  Audio: {}", audio);
    }
    for script in &result.script_data {
        println!("  Script data @{}ms: {} = {}", script.timestamp, script.name, script.value);
    }

    Ok(())
}

fn cmd_frames(
    input: &Path,
    config: ParserConfig,
    seek: Option<u32>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let parser = open(input, config)?;

    if let Some(target) = seek {
        match parser.seek(target) {
            Some(landed) => info!("Seeked to {}ms (requested {}ms)", landed, target),
            None => {
                return Err(anyhow::anyhow!(
                    "No cue point at or after {}ms has been indexed",
                    target
                ))
            }
        }
    }

    let limit = limit.unwrap_or(usize::MAX);
    let mut count = 0;
    while count < limit {
        let audio_ts = parser.next_audio_frame_timestamp();
        let video_ts = parser.next_video_frame_timestamp();
        let line = match (audio_ts, video_ts) {
            (Some(a), Some(v)) if a < v => parser.next_audio_frame().map(|f| f.to_string()),
            (Some(_), None) => parser.next_audio_frame().map(|f| f.to_string()),
            (_, Some(_)) => parser.next_video_frame().map(|f| f.to_string()),
            (None, None) if parser.parsing_completed() => break,
            (None, None) => {
                if parser.is_threaded() {
                    std::thread::sleep(std::time::Duration::from_millis(1));
                } else if !parser.parse_next_chunk() {
                    break;
                }
                continue;
            }
        };
        if let Some(line) = line {
            println!("{}", line);
            count += 1;
        }
    }

    info!("{} frames listed", count);
    Ok(())
}
