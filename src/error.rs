//! Error types for the diff engine

use thiserror::Error;

/// Result type alias for diff operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while decoding, comparing or encoding screenshots
#[derive(Error, Debug)]
pub enum Error {
    /// Input bytes are not a well-formed PNG stream
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// Well-formed PNG that uses a feature outside the supported subset
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// zlib inflate/deflate failure
    #[error("Compression failed: {0}")]
    Compression(String),

    /// The screenshot source could not produce a capture
    #[error("Capture failed: {0}")]
    Capture(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    /// I/O error while reading or writing buffers
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Self {
        Error::UnsupportedFormat(msg.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_name_the_cause() {
        let e = Error::malformed("bad PNG signature");
        assert_eq!(e.to_string(), "Malformed input: bad PNG signature");
        let e = Error::unsupported("interlaced images");
        assert_eq!(e.to_string(), "Unsupported format: interlaced images");
    }
}
