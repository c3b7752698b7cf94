//! Protocol version definitions and dispatch.
//!
//! Versions are negotiated once during the handshake and never change for
//! the lifetime of a session. Encoders, decoders and the session state
//! machine all take the negotiated version as a parameter and consult the
//! predicates here instead of scattering version comparisons.

use std::fmt;

/// A negotiated Bolt protocol version.
///
/// On the wire a version is a 32-bit big-endian identifier; the values
/// supported here are `1`, `2` and `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u32)]
pub enum BoltVersion {
    /// Version 1: INIT/ACK_FAILURE era, no temporal or spatial types
    V1 = 1,
    /// Version 2: adds temporal and spatial types
    V2 = 2,
    /// Version 3: HELLO/GOODBYE, explicit transactions, RUN metadata
    V3 = 3,
}

impl BoltVersion {
    /// All supported versions, preferred first. This is the default
    /// proposal list for the handshake.
    pub const ALL: [BoltVersion; 3] = [BoltVersion::V3, BoltVersion::V2, BoltVersion::V1];

    /// Create a version from its wire identifier.
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(BoltVersion::V1),
            2 => Some(BoltVersion::V2),
            3 => Some(BoltVersion::V3),
            _ => None,
        }
    }

    /// The wire identifier.
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Big-endian wire bytes.
    pub fn to_bytes(self) -> [u8; 4] {
        (self as u32).to_be_bytes()
    }

    /// Parse from big-endian wire bytes.
    pub fn from_bytes(bytes: [u8; 4]) -> Option<Self> {
        Self::from_u32(u32::from_be_bytes(bytes))
    }

    /// Temporal value support (version 2 and later).
    pub fn supports_temporal(self) -> bool {
        self >= BoltVersion::V2
    }

    /// Spatial value support (version 2 and later).
    pub fn supports_spatial(self) -> bool {
        self >= BoltVersion::V2
    }

    /// Explicit transaction messages BEGIN/COMMIT/ROLLBACK (version 3).
    pub fn supports_transactions(self) -> bool {
        self >= BoltVersion::V3
    }

    /// Graceful GOODBYE on close (version 3).
    pub fn supports_goodbye(self) -> bool {
        self >= BoltVersion::V3
    }

    /// Whether authentication uses the single-map HELLO form instead of
    /// the two-field INIT form.
    pub fn uses_hello(self) -> bool {
        self >= BoltVersion::V3
    }

    /// Whether failure recovery uses ACK_FAILURE (versions 1 and 2;
    /// version 3 recovers with RESET only).
    pub fn uses_ack_failure(self) -> bool {
        self < BoltVersion::V3
    }

    /// Whether RUN carries a third metadata field.
    pub fn run_has_metadata(self) -> bool {
        self >= BoltVersion::V3
    }
}

impl fmt::Display for BoltVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}
