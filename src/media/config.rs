//! Parser tunables

use crate::error::{Error, Result};
use std::time::Duration;

/// Configuration for [`MediaParser`](super::MediaParser)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Buffer depth in milliseconds the background thread aims to keep
    pub buffer_time_ms: u64,
    /// Run a background parser thread; when false the consumer drives parsing
    pub threaded: bool,
    /// Zero bytes appended after every payload
    pub padding_bytes: usize,
    /// Minimum spacing of audio cue points in files without video
    pub audio_cue_gap_ms: u32,
    /// How far the index cursor may trail the parse cursor before tags
    /// stop being indexed during full parsing
    pub index_lag_bytes: u64,
    /// Parse ahead at construction until stream infos are known
    pub probe_stream_info: bool,
    /// Sleep between chunks on the background thread
    pub yield_interval: Duration,
}

impl Default for ParserConfig {
    fn default() -> Self {
        ParserConfig {
            buffer_time_ms: 100,
            threaded: true,
            padding_bytes: 8,
            audio_cue_gap_ms: 5000,
            index_lag_bytes: 4,
            probe_stream_info: true,
            yield_interval: Duration::from_micros(100),
        }
    }
}

impl ParserConfig {
    pub fn with_buffer_time(mut self, ms: u64) -> Self {
        self.buffer_time_ms = ms;
        self
    }

    pub fn with_threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn with_padding(mut self, bytes: usize) -> Self {
        self.padding_bytes = bytes;
        self
    }

    pub fn with_audio_cue_gap(mut self, ms: u32) -> Self {
        self.audio_cue_gap_ms = ms;
        self
    }

    pub fn with_index_lag(mut self, bytes: u64) -> Self {
        self.index_lag_bytes = bytes;
        self
    }

    pub fn with_probe_stream_info(mut self, probe: bool) -> Self {
        self.probe_stream_info = probe;
        self
    }

    pub fn with_yield_interval(mut self, interval: Duration) -> Self {
        self.yield_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.padding_bytes == 0 {
            return Err(Error::config("padding_bytes must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ParserConfig::default();
        assert_eq!(config.buffer_time_ms, 100);
        assert!(config.threaded);
        assert_eq!(config.padding_bytes, 8);
        assert_eq!(config.audio_cue_gap_ms, 5000);
        assert_eq!(config.index_lag_bytes, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_padding_rejected() {
        let config = ParserConfig::default().with_padding(0);
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_builder() {
        let config = ParserConfig::default()
            .with_threaded(false)
            .with_buffer_time(2000)
            .with_audio_cue_gap(1000);
        assert!(!config.threaded);
        assert_eq!(config.buffer_time_ms, 2000);
        assert_eq!(config.audio_cue_gap_ms, 1000);
    }
}
