//! Framed codec for front-end communication.
//!
//! Uses LengthDelimitedCodec for framing (4-byte native-endian length prefix)
//! + serde_json for payloads. Works over any AsyncRead/AsyncWrite.
//!
//! Framing and payload decoding are kept apart: a broken length prefix or a
//! truncated payload is an `io::Error`, while a complete frame with bad JSON
//! decodes to `Some(Err(..))` so the caller can still answer it.

use std::io;
use std::marker::PhantomData;

use serde::{Serialize, de::DeserializeOwned};
use tokio_util::bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

/// Largest inbound frame accepted before the length prefix is treated as corrupt.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// Largest outbound payload the 4-byte length prefix can describe.
pub const MAX_RESPONSE_LEN: usize = u32::MAX as usize;

/// Browsers drop host-to-extension messages above this size.
pub const BROWSER_MESSAGE_LIMIT: usize = 1024 * 1024;

/// Codec that frames messages with a length prefix and serializes with JSON.
///
/// Inbound frames are capped at [`MAX_FRAME_LEN`]; outbound frames only at the
/// configured outbound limit, so large program output still gets written.
pub struct FrameCodec<T> {
    decoder: LengthDelimitedCodec,
    encoder: LengthDelimitedCodec,
    outbound_limit: usize,
    _phantom: PhantomData<T>,
}

impl<T> Default for FrameCodec<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FrameCodec<T> {
    pub fn new() -> Self {
        Self {
            decoder: length_delimited(MAX_FRAME_LEN),
            encoder: length_delimited(MAX_RESPONSE_LEN),
            outbound_limit: MAX_RESPONSE_LEN,
            _phantom: PhantomData,
        }
    }

    /// Refuse to encode payloads above `limit` bytes (clamped to [`MAX_RESPONSE_LEN`]).
    pub fn with_outbound_limit(mut self, limit: usize) -> Self {
        self.outbound_limit = limit.min(MAX_RESPONSE_LEN);
        self
    }
}

fn length_delimited(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .native_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}

impl<T: DeserializeOwned> Decoder for FrameCodec<T> {
    type Item = Result<T, serde_json::Error>;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        Ok(self
            .decoder
            .decode(src)?
            .map(|bytes| serde_json::from_slice(&bytes)))
    }
}

impl<T: Serialize> Encoder<T> for FrameCodec<T> {
    type Error = io::Error;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let json =
            serde_json::to_vec(&item).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        let json_len = json.len();
        tracing::trace!(json_size_bytes = json_len, "Encoding frame");
        if json_len > BROWSER_MESSAGE_LIMIT {
            tracing::warn!(
                json_size_bytes = json_len,
                json_size_kb = json_len / 1024,
                "Frame exceeds browser message limit"
            );
        }
        if json_len > self.outbound_limit {
            // Nothing has been written to `dst`; the caller may send a smaller frame instead.
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "{json_len} byte payload exceeds the {} byte frame limit",
                    self.outbound_limit
                ),
            ));
        }
        self.encoder.encode(Bytes::from(json), dst)
    }
}
