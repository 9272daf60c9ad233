//! Error types for flvmedia

use thiserror::Error;

/// Result type alias for flvmedia operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for flvmedia
#[derive(Error, Debug)]
pub enum Error {
    /// IO error from the underlying byte source
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream does not start with a usable FLV header
    #[error("Invalid FLV header: {0}")]
    InvalidHeader(String),

    /// A fixed-size layout was shorter than required
    #[error("Truncated data: need {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    /// Malformed AMF0 script data
    #[error("AMF error: {0}")]
    Amf(String),

    /// Format error
    #[error("Format error: {0}")]
    Format(String),

    /// Invalid state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// End of stream
    #[error("End of stream")]
    EndOfStream,
}

impl Error {
    /// Create a header error
    pub fn invalid_header<S: Into<String>>(msg: S) -> Self {
        Error::InvalidHeader(msg.into())
    }

    /// Create a format error
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Error::Format(msg.into())
    }

    /// Create an AMF error
    pub fn amf<S: Into<String>>(msg: S) -> Self {
        Error::Amf(msg.into())
    }

    /// Create an invalid state error
    pub fn invalid_state<S: Into<String>>(msg: S) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Whether this error means the source simply ran out of data
    pub fn is_end_of_stream(&self) -> bool {
        match self {
            Error::EndOfStream | Error::Truncated { .. } => true,
            Error::Io(e) => e.kind() == std::io::ErrorKind::UnexpectedEof,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Truncated { need: 12, have: 5 };
        assert_eq!(err.to_string(), "Truncated data: need 12 bytes, have 5");
        assert_eq!(
            Error::invalid_header("bad magic").to_string(),
            "Invalid FLV header: bad magic"
        );
    }

    #[test]
    fn test_end_of_stream_classification() {
        assert!(Error::EndOfStream.is_end_of_stream());
        assert!(Error::Truncated { need: 4, have: 0 }.is_end_of_stream());
        let eof = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        assert!(Error::from(eof).is_end_of_stream());
        assert!(!Error::format("x").is_end_of_stream());
    }
}
