//! flvmedia - FLV demuxing with background buffering
//!
//! Reads Flash Video streams tag by tag and delivers timestamp-ordered
//! encoded audio and video frames to a consumer, while a background thread
//! keeps a configurable amount of media buffered and indexes key frames
//! ahead of playback for seeking.
//!
//! # Architecture
//!
//! - `io`: byte sources (files, in-memory data, progressive downloads)
//! - `format`: the FLV container layer (header and tag decoding, AMF0
//!   script data, the tag scanner and a writer)
//! - `media`: the format-independent buffering engine, frames, cue points
//!   and metadata store
//! - `util`: padded payload buffers and bit reading
//!
//! ```no_run
//! use flvmedia::io::ReadSeekSource;
//! use flvmedia::{FlvMediaParser, ParserConfig};
//!
//! # fn main() -> flvmedia::Result<()> {
//! let source = ReadSeekSource::open("movie.flv")?;
//! let parser = FlvMediaParser::open_flv(source, ParserConfig::default())?;
//! while let Some(frame) = parser.next_video_frame() {
//!     println!("{}", frame);
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod format;
pub mod io;
pub mod media;
pub mod util;

pub use error::{Error, Result};
pub use format::flv::{FlvMediaParser, FlvParser, FlvWriter};
pub use media::{
    AudioInfo, ContainerParser, CuePoint, EncodedAudioFrame, EncodedVideoFrame, ExtraInfo,
    MediaParser, MetaTag, ParserConfig, VideoInfo,
};

/// flvmedia version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// Library-wide settings
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Enable verbose logging
    pub verbose: bool,
    /// Enable debug output
    pub debug: bool,
}

/// Install the logging subscriber the configuration asks for
pub fn init(config: Config) -> Result<()> {
    if config.verbose || config.debug {
        let level = if config.debug { "debug" } else { "info" };
        tracing_subscriber::fmt()
            .with_env_filter(level)
            .try_init()
            .map_err(|e| Error::config(format!("Failed to initialize logging: {}", e)))?;
    }

    Ok(())
}
