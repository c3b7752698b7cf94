//! Chunked message framing.
//!
//! A message's serialized bytes travel as one or more chunks, each a
//! 16-bit big-endian length followed by that many content bytes. A
//! two-byte zero-length marker terminates the chunk sequence of exactly
//! one message. A bare end marker between messages is a keep-alive and
//! carries nothing.

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::BoltError;
use crate::message::{Request, Response};
use crate::version::BoltVersion;

/// Maximum content bytes a single chunk can carry.
pub const MAX_CHUNK_LEN: usize = 0xFFFF;

/// End-of-message marker.
pub const END_MARKER: [u8; 2] = [0x00, 0x00];

/// Default cap on a reassembled message (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Split a message payload into chunks and append them, end marker
/// included, to `dst`.
pub fn write_chunked(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(payload.len() + (payload.len() / MAX_CHUNK_LEN + 1) * 2 + 2);

    let mut offset = 0;
    while offset < payload.len() {
        let chunk_len = (payload.len() - offset).min(MAX_CHUNK_LEN);
        dst.put_u16(chunk_len as u16);
        dst.put_slice(&payload[offset..offset + chunk_len]);
        offset += chunk_len;
    }

    dst.put_slice(&END_MARKER);
}

/// Reassembles chunk sequences into complete message payloads.
///
/// The accumulation buffer is reused across messages, so steady-state
/// reads allocate nothing.
#[derive(Debug)]
pub struct Dechunker {
    message: BytesMut,
    max_message_size: usize,
}

impl Dechunker {
    /// Create a dechunker with the default message-size cap.
    pub fn new() -> Self {
        Self::with_max_size(DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a dechunker with a custom message-size cap.
    pub fn with_max_size(max_message_size: usize) -> Self {
        Self {
            message: BytesMut::with_capacity(4096),
            max_message_size,
        }
    }

    /// Consume as many complete chunks from `src` as possible.
    ///
    /// Returns the payload of one message when its end marker has been
    /// seen, `None` when more bytes are needed. Keep-alive sequences (an
    /// end marker with no content) are skipped.
    pub fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>, BoltError> {
        loop {
            if src.len() < 2 {
                return Ok(None);
            }

            let chunk_len = u16::from_be_bytes([src[0], src[1]]) as usize;

            if chunk_len == 0 {
                src.advance(2);
                if self.message.is_empty() {
                    // keep-alive, nothing to deliver
                    continue;
                }
                return Ok(Some(self.message.split()));
            }

            if src.len() < 2 + chunk_len {
                return Ok(None);
            }

            if self.message.len() + chunk_len > self.max_message_size {
                return Err(BoltError::protocol(format!(
                    "message exceeds {} bytes",
                    self.max_message_size
                )));
            }

            src.advance(2);
            self.message.extend_from_slice(&src[..chunk_len]);
            src.advance(chunk_len);
        }
    }
}

impl Default for Dechunker {
    fn default() -> Self {
        Self::new()
    }
}

/// Framing codec: encodes requests into chunked bytes and decodes chunked
/// bytes into responses, at a fixed negotiated version.
#[derive(Debug)]
pub struct MessageCodec {
    version: BoltVersion,
    dechunker: Dechunker,
}

impl MessageCodec {
    /// Create a codec for the negotiated version.
    pub fn new(version: BoltVersion) -> Self {
        Self {
            version,
            dechunker: Dechunker::new(),
        }
    }

    /// Create a codec with a custom message-size cap.
    pub fn with_max_size(version: BoltVersion, max_message_size: usize) -> Self {
        Self {
            version,
            dechunker: Dechunker::with_max_size(max_message_size),
        }
    }

    /// The negotiated version this codec encodes and decodes for.
    pub fn version(&self) -> BoltVersion {
        self.version
    }
}

impl Decoder for MessageCodec {
    type Item = Response;
    type Error = BoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.dechunker.decode(src)? {
            Some(payload) => {
                let response = Response::from_bytes(&payload, self.version)?;
                Ok(Some(response))
            }
            None => Ok(None),
        }
    }
}

impl<'a> Encoder<&'a Request> for MessageCodec {
    type Error = BoltError;

    fn encode(&mut self, item: &'a Request, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = item.to_bytes(self.version)?;
        write_chunked(&payload, dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::request::Run;

    fn dechunk_all(mut framed: BytesMut) -> Vec<BytesMut> {
        let mut dechunker = Dechunker::new();
        let mut out = Vec::new();
        while let Some(payload) = dechunker.decode(&mut framed).unwrap() {
            out.push(payload);
        }
        assert!(framed.is_empty());
        out
    }

    #[test]
    fn test_small_message_single_chunk() {
        let mut framed = BytesMut::new();
        write_chunked(&[1, 2, 3], &mut framed);
        assert_eq!(framed.to_vec(), [0x00, 0x03, 1, 2, 3, 0x00, 0x00]);

        let messages = dechunk_all(framed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to_vec(), [1, 2, 3]);
    }

    #[test]
    fn test_exactly_one_full_chunk() {
        let payload = vec![0xAB; MAX_CHUNK_LEN];
        let mut framed = BytesMut::new();
        write_chunked(&payload, &mut framed);

        // one header, one full chunk, one end marker
        assert_eq!(framed.len(), 2 + MAX_CHUNK_LEN + 2);
        assert_eq!(&framed[..2], [0xFF, 0xFF]);

        let messages = dechunk_all(framed);
        assert_eq!(messages[0].len(), MAX_CHUNK_LEN);
    }

    #[test]
    fn test_one_byte_over_full_chunk() {
        let payload = vec![0xCD; MAX_CHUNK_LEN + 1];
        let mut framed = BytesMut::new();
        write_chunked(&payload, &mut framed);

        // two headers, the split content, one end marker
        assert_eq!(framed.len(), 2 + MAX_CHUNK_LEN + 2 + 1 + 2);
        assert_eq!(&framed[..2], [0xFF, 0xFF]);
        assert_eq!(&framed[2 + MAX_CHUNK_LEN..2 + MAX_CHUNK_LEN + 2], [0x00, 0x01]);

        let messages = dechunk_all(framed);
        assert_eq!(messages[0].to_vec(), payload);
    }

    #[test]
    fn test_roundtrip_large_payload() {
        let payload: Vec<u8> = (0..1_000_000u32).map(|i| (i % 251) as u8).collect();
        let mut framed = BytesMut::new();
        write_chunked(&payload, &mut framed);

        let messages = dechunk_all(framed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to_vec(), payload);
    }

    #[test]
    fn test_any_split_point_is_legal() {
        // the same payload arriving as many tiny chunks reassembles
        let payload = b"one message in many pieces";
        let mut framed = BytesMut::new();
        for piece in payload.chunks(3) {
            framed.put_u16(piece.len() as u16);
            framed.put_slice(piece);
        }
        framed.put_slice(&END_MARKER);

        let messages = dechunk_all(framed);
        assert_eq!(messages[0].to_vec(), payload);
    }

    #[test]
    fn test_partial_input_returns_none() {
        let mut framed = BytesMut::new();
        write_chunked(&[1, 2, 3, 4], &mut framed);

        let mut dechunker = Dechunker::new();

        // header only
        let mut partial = BytesMut::from(&framed[..2]);
        assert!(dechunker.decode(&mut partial).unwrap().is_none());

        // header plus half the content
        let mut partial = BytesMut::from(&framed[..4]);
        assert!(dechunker.decode(&mut partial).unwrap().is_none());

        // content but no end marker yet
        let mut partial = BytesMut::from(&framed[..6]);
        assert!(dechunker.decode(&mut partial).unwrap().is_none());

        let mut complete = framed;
        let message = dechunker.decode(&mut complete).unwrap().unwrap();
        assert_eq!(message.to_vec(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_keep_alive_skipped() {
        let mut framed = BytesMut::new();
        framed.put_slice(&END_MARKER);
        framed.put_slice(&END_MARKER);
        write_chunked(&[7], &mut framed);

        let messages = dechunk_all(framed);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].to_vec(), [7]);
    }

    #[test]
    fn test_end_marker_delimits_exactly_one_message() {
        let mut framed = BytesMut::new();
        write_chunked(&[1], &mut framed);
        write_chunked(&[2, 2], &mut framed);
        write_chunked(&[3, 3, 3], &mut framed);

        let messages = dechunk_all(framed);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].to_vec(), [1]);
        assert_eq!(messages[1].to_vec(), [2, 2]);
        assert_eq!(messages[2].to_vec(), [3, 3, 3]);
    }

    #[test]
    fn test_message_size_cap() {
        let mut dechunker = Dechunker::with_max_size(10);
        let mut framed = BytesMut::new();
        write_chunked(&[0u8; 11], &mut framed);

        let err = dechunker.decode(&mut framed).unwrap_err();
        assert!(matches!(err, BoltError::Protocol(_)));
    }

    #[test]
    fn test_codec_encodes_requests_and_decodes_responses() {
        let mut codec = MessageCodec::new(BoltVersion::V3);

        let mut framed = BytesMut::new();
        codec
            .encode(&Request::Run(Run::new("RETURN 1")), &mut framed)
            .unwrap();
        assert_eq!(&framed[..2], [0x00, 0x0D]); // B3 10 88 'RETURN 1' A0 A0
        assert_eq!(&framed[framed.len() - 2..], END_MARKER);

        // server replies IGNORED
        let mut incoming = BytesMut::new();
        write_chunked(&[0xB0, 0x7E], &mut incoming);
        let response = codec.decode(&mut incoming).unwrap().unwrap();
        assert!(matches!(response, Response::Ignored));

        // half a response is not a response yet
        let mut incoming = BytesMut::new();
        incoming.put_slice(&[0x00, 0x02, 0xB0]);
        assert!(codec.decode(&mut incoming).unwrap().is_none());
    }
}
