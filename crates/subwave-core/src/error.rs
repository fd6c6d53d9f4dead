//! Error types for format validation and decode sessions
//!
//! Only decode-session failures are reported upward. Capacity overflow,
//! queries before a stream is installed and forbidden drags are normal
//! states and never surface as errors.

use thiserror::Error;

/// Invalid PCM layout
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("Sample rate must be greater than zero")]
    ZeroSampleRate,

    #[error("Channel count must be greater than zero")]
    ZeroChannels,

    #[error("Unsupported bit depth: {0}")]
    UnsupportedBitDepth(u16),

    #[error("Float samples must be 32 bits wide, got {0}")]
    UnsupportedFloatDepth(u16),
}

/// Result type for format checks
pub type FormatResult<T> = Result<T, FormatError>;

/// Kind of decode-session failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecodeErrorCode {
    /// Media could not be opened or probed
    Open,
    /// Container has no decodable audio track
    NoAudioTrack,
    /// Requested stream index does not exist
    StreamIndex,
    /// Codec or sample layout is not supported
    Unsupported,
    /// Read failure while decoding
    Io,
}

/// Decode-session failure, reported to the UI as code/message/debug
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DecodeError {
    pub code: DecodeErrorCode,
    pub message: String,
    pub debug: String,
}

impl DecodeError {
    pub fn new(code: DecodeErrorCode, message: impl Into<String>, debug: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            debug: debug.into(),
        }
    }

    pub fn open(path: impl std::fmt::Display, debug: impl Into<String>) -> Self {
        Self::new(
            DecodeErrorCode::Open,
            format!("Failed to open media: {}", path),
            debug,
        )
    }

    pub fn no_audio_track() -> Self {
        Self::new(
            DecodeErrorCode::NoAudioTrack,
            "No audio track found",
            String::new(),
        )
    }

    pub fn stream_index(requested: usize, available: usize) -> Self {
        Self::new(
            DecodeErrorCode::StreamIndex,
            format!("Audio stream {} not found", requested),
            format!("{} audio streams available", available),
        )
    }

    pub fn unsupported(debug: impl Into<String>) -> Self {
        Self::new(
            DecodeErrorCode::Unsupported,
            "Unsupported audio format",
            debug,
        )
    }

    pub fn io(debug: impl Into<String>) -> Self {
        Self::new(DecodeErrorCode::Io, "Error reading audio stream", debug)
    }
}

impl From<FormatError> for DecodeError {
    fn from(err: FormatError) -> Self {
        Self::unsupported(err.to_string())
    }
}

/// Result type for decode sessions
pub type DecodeResult<T> = Result<T, DecodeError>;
