//! Protocol version negotiation.
//!
//! The handshake runs once, immediately after the transport is
//! established and before any chunked traffic:
//!
//! 1. Client sends the 4-byte magic preamble.
//! 2. Client sends four 32-bit big-endian version proposals, preferred
//!    first, zero-padded.
//! 3. Server answers with one 32-bit big-endian value: the selected
//!    version, or zero for "no common version".

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::error::{BoltResult, HandshakeError};
use crate::version::BoltVersion;

/// Magic preamble identifying a Bolt connection.
pub const MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Size of the client's handshake message (magic + four proposals).
pub const REQUEST_SIZE: usize = 20;

/// Size of the server's handshake response.
pub const RESPONSE_SIZE: usize = 4;

/// Build the client handshake message for the given proposals.
///
/// At most four proposals are sent; unused slots are zero.
pub fn request_bytes(proposals: &[BoltVersion]) -> [u8; REQUEST_SIZE] {
    let mut request = [0u8; REQUEST_SIZE];
    request[0..4].copy_from_slice(&MAGIC);
    for (i, version) in proposals.iter().take(4).enumerate() {
        let offset = 4 + i * 4;
        request[offset..offset + 4].copy_from_slice(&version.to_bytes());
    }
    request
}

/// Run the client side of the handshake on a fresh transport.
///
/// On "no common version" the caller must close the transport; the
/// session layer does this by dropping it.
pub async fn negotiate<T>(transport: &mut T, proposals: &[BoltVersion]) -> BoltResult<BoltVersion>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    transport.write_all(&request_bytes(proposals)).await?;
    transport.flush().await?;

    let mut response = [0u8; RESPONSE_SIZE];
    transport.read_exact(&mut response).await?;

    let raw = u32::from_be_bytes(response);
    if raw == 0 {
        debug!("server rejected all proposed versions");
        return Err(HandshakeError::NoCommonVersion.into());
    }

    match BoltVersion::from_u32(raw) {
        Some(version) if proposals.contains(&version) => {
            debug!(%version, "negotiated protocol version");
            Ok(version)
        }
        _ => Err(HandshakeError::UnexpectedVersion(raw).into()),
    }
}
