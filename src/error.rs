//! Protocol error types.

use std::io;

use thiserror::Error;

use crate::packstream::{DecodeError, EncodeError};

/// Result type for protocol operations.
pub type BoltResult<T> = Result<T, BoltError>;

/// The closed error taxonomy of the protocol core.
///
/// Only [`BoltError::ServerFailure`] is recoverable on the same session
/// (via `RESET`, or `ACK_FAILURE` before version 3). Encode errors leave
/// the session healthy because nothing was written. Everything else is
/// fatal and leaves the session defunct.
#[derive(Debug, Error)]
pub enum BoltError {
    /// A value could not be represented on the wire
    #[error("encode error: {0}")]
    Encode(#[from] EncodeError),

    /// The peer sent malformed bytes
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// The peer violated the message sequencing rules
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server reported a failure for a request
    #[error("server failure: {code}: {message}")]
    ServerFailure {
        /// Server error code, e.g. `Neo.ClientError.Statement.SyntaxError`
        code: String,
        /// Human-readable error message
        message: String,
    },

    /// The transport failed to read, write or close
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    /// A read or write deadline expired
    #[error("operation timed out")]
    Timeout,

    /// Version negotiation failed
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// The server rejected the authentication request
    #[error("authentication failed: {code}: {message}")]
    Auth {
        /// Server error code
        code: String,
        /// Human-readable error message
        message: String,
    },
}

impl BoltError {
    /// Shorthand for a protocol violation.
    pub fn protocol(msg: impl Into<String>) -> Self {
        BoltError::Protocol(msg.into())
    }

    /// Whether the session that produced this error can keep going.
    ///
    /// Server failures recover through `RESET`/`ACK_FAILURE`; encode
    /// errors never reached the wire. Every other variant leaves the
    /// session defunct.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BoltError::ServerFailure { .. } | BoltError::Encode(_))
    }

    /// Whether the server failure code marks a transient condition worth
    /// retrying on a fresh session.
    pub fn is_transient(&self) -> bool {
        match self {
            BoltError::ServerFailure { code, .. } => code.starts_with("Neo.TransientError"),
            _ => false,
        }
    }
}

/// Errors raised during version negotiation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandshakeError {
    /// The server supports none of the proposed versions
    #[error("no common protocol version")]
    NoCommonVersion,

    /// The server answered with a version that was never proposed
    #[error("server selected unsupported version 0x{0:08X}")]
    UnexpectedVersion(u32),
}
