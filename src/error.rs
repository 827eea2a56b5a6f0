//! Error types for the RFS protocol core.
//!
//! Nothing in here is fatal to the link. Stream level faults (bad markers, bad header
//! checksums, CRC mismatches) never surface as errors at all, they are recovered inside
//! the synchronizer and only show up in the statistics. These types cover what is
//! left: a message that was framed correctly but whose contents don't make sense,
//! frames we refuse to build, and bad configuration.

use thiserror::Error;

/// A framed message could not be interpreted.
///
/// The offending message is dropped, the stream carries on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Fewer bytes than the fixed part of the structure.
    #[error("payload too short: need {needed} bytes, got {got}")]
    TooShort { needed: usize, got: usize },

    /// Message type byte outside the closed enumeration.
    #[error("unknown message type 0x{0:02X}")]
    UnknownType(u8),

    /// A declared count is above its sanity bound.
    #[error("{field} count {count} exceeds maximum {max}")]
    CountTooLarge {
        field: &'static str,
        count: usize,
        max:   usize,
    },

    /// Declared counts point past the end of the body.
    #[error("truncated body: need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },

    #[error("invalid frame dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Raw image size matches neither grayscale nor RGB for the declared dimensions.
    #[error("image data size mismatch: expected {expected}, got {got}")]
    SizeMismatch { expected: usize, got: usize },

    #[error("unknown frame kind {0:?}")]
    UnknownFrameKind([u8; 4]),

    #[error("image decode failed: {0}")]
    ImageDecode(String),

    #[error("unknown command 0x{0:02X}")]
    UnknownCommand(u8),
}

/// A frame could not be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("empty payload")]
    EmptyPayload,

    #[error("payload of {size} bytes exceeds maximum {max}")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("{field} count {count} exceeds maximum {max}")]
    CountTooLarge {
        field: &'static str,
        count: usize,
        max:   usize,
    },
}

/// Invalid command line or configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing value for {0}")]
    MissingValue(&'static str),

    #[error("invalid value {value:?} for {flag}")]
    InvalidValue { flag: &'static str, value: String },

    #[error("unknown argument {0:?}")]
    UnknownFlag(String),
}

pub type ParseResult<T> = std::result::Result<T, ParseError>;
