//! PackStream serialization format.
//!
//! PackStream is the self-describing binary format the Bolt protocol uses
//! to carry values between client and server.
//!
//! # Supported Types
//!
//! - **Null**: Single byte marker
//! - **Boolean**: True/False markers
//! - **Integer**: Variable-length encoding (-2^63 to 2^63-1)
//! - **Float**: 64-bit IEEE 754
//! - **String**: UTF-8 encoded, variable length prefix
//! - **List**: Heterogeneous collections
//! - **Map**: String keys to arbitrary values, insertion-ordered
//! - **Structure**: Tagged records, up to 65,535 fields
//!
//! # Graph Structures (decode-only)
//!
//! - **Node**: id, labels, properties
//! - **Relationship**: id, start_id, end_id, type, properties
//! - **Path**: nodes, relationships, sequence
//!
//! # Temporal Structures (version 2+)
//!
//! - **Date**: Days since Unix epoch
//! - **LocalTime** / **Time**: Nanoseconds since midnight, with or without offset
//! - **LocalDateTime** / **DateTime**: Seconds + nanoseconds, with or without offset
//! - **DateTimeZoned**: Seconds + nanoseconds + named timezone
//! - **Duration**: Months, days, seconds, nanoseconds
//!
//! # Spatial Structures (version 2+)
//!
//! - **Point2D** / **Point3D**: SRID + coordinates

pub mod decoder;
pub mod encoder;
pub mod marker;
pub mod structures;
pub mod types;

pub use decoder::{decode, PackStreamDecoder};
pub use encoder::{encode, PackStreamEncoder};
pub use structures::{
    Date, Duration, LocalDateTime, LocalTime, Node, OffsetDateTime, OffsetTime, Path, Point2D,
    Point3D, Relationship, UnboundRelationship, ZonedDateTime,
};
pub use types::{Struct, Value, ValueMap};

use std::fmt;

/// Errors raised while encoding a value.
///
/// Encode errors are local: the value is unrepresentable, but the session
/// that attempted the encode stays healthy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A collection or string exceeds the largest wire size field
    ValueTooLarge(&'static str, usize),
    /// The value kind does not exist at the negotiated version
    VersionUnsupported {
        /// Name of the value kind
        kind: &'static str,
        /// The negotiated version that rejected it
        version: crate::version::BoltVersion,
    },
    /// The value kind only ever arrives from the server
    DecodeOnly(&'static str),
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::ValueTooLarge(kind, size) => {
                write!(f, "{} too large to encode: {} entries", kind, size)
            }
            EncodeError::VersionUnsupported { kind, version } => {
                write!(f, "{} values are not supported at Bolt v{}", kind, version)
            }
            EncodeError::DecodeOnly(kind) => {
                write!(f, "{} values are decode-only", kind)
            }
        }
    }
}

impl std::error::Error for EncodeError {}

/// Errors raised while decoding bytes.
///
/// Decode errors mean the peer sent malformed data; the connection they
/// arrived on must be dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended in the middle of a value
    UnexpectedEof,
    /// Marker byte does not start any known value kind
    UnknownMarker(u8),
    /// String payload is not valid UTF-8
    InvalidUtf8(String),
    /// Map key decoded as something other than a string
    InvalidMapKey,
    /// Structure signature unknown at the negotiated version
    UnknownSignature(u8),
    /// Structure fields do not match the signature's layout
    InvalidStructure(String),
    /// Bytes left over after a complete message
    TrailingBytes(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeError::UnknownMarker(m) => write!(f, "unknown marker byte 0x{:02X}", m),
            DecodeError::InvalidUtf8(e) => write!(f, "invalid UTF-8 in string: {}", e),
            DecodeError::InvalidMapKey => write!(f, "map keys must be strings"),
            DecodeError::UnknownSignature(s) => {
                write!(f, "unknown structure signature 0x{:02X}", s)
            }
            DecodeError::InvalidStructure(msg) => write!(f, "invalid structure: {}", msg),
            DecodeError::TrailingBytes(n) => {
                write!(f, "{} trailing bytes after message", n)
            }
        }
    }
}

impl std::error::Error for DecodeError {}
