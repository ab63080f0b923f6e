//! Sequential frame channel over an inbound and an outbound byte stream.

use std::io;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{FramedRead, FramedWrite};

use super::codec::FrameCodec;
use super::protocol::Response;
use crate::error::FrameError;

/// One complete inbound frame.
#[derive(Debug)]
pub enum Frame {
    Message(Value),
    /// Framing was intact but the payload was not UTF-8 JSON.
    Undecodable(serde_json::Error),
}

/// Exactly one reader and one writer; a response is flushed before the next read.
pub struct FrameChannel<R, W> {
    reader: FramedRead<R, FrameCodec<Value>>,
    writer: FramedWrite<W, FrameCodec<Response>>,
}

impl<R, W> FrameChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: FramedRead::new(reader, FrameCodec::new()),
            writer: FramedWrite::new(writer, FrameCodec::new()),
        }
    }

    /// Cap the size of outbound payloads; larger responses fail with
    /// [`FrameError::Oversized`] and leave the stream untouched.
    pub fn with_outbound_limit(mut self, limit: usize) -> Self {
        *self.writer.encoder_mut() = FrameCodec::new().with_outbound_limit(limit);
        self
    }

    /// Read the next frame. `Ok(None)` means the inbound stream closed cleanly
    /// on a frame boundary.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        match self.reader.next().await {
            Some(Ok(Ok(value))) => Ok(Some(Frame::Message(value))),
            Some(Ok(Err(e))) => Ok(Some(Frame::Undecodable(e))),
            Some(Err(e)) => Err(FrameError::Malformed(e)),
            None => Ok(None),
        }
    }

    /// Write one response and flush it.
    pub async fn write_frame(&mut self, response: Response) -> Result<(), FrameError> {
        self.writer.send(response).await.map_err(|e| match e.kind() {
            io::ErrorKind::InvalidInput => FrameError::Oversized(e),
            _ => FrameError::Write(e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::bytes::BytesMut;
    use tokio_util::codec::{Decoder, Encoder};

    fn encode(value: Value) -> Vec<u8> {
        let mut buf = BytesMut::new();
        FrameCodec::<Value>::new().encode(value, &mut buf).unwrap();
        buf.to_vec()
    }

    #[tokio::test]
    async fn reads_frames_then_end_of_stream() {
        let mut input = encode(serde_json::json!({"action": "ping"}));
        input.extend(encode(serde_json::json!({"action": "ping", "n": "ü"})));
        let mut output: Vec<u8> = Vec::new();
        let mut channel = FrameChannel::new(input.as_slice(), &mut output);

        for expected in [
            serde_json::json!({"action": "ping"}),
            serde_json::json!({"action": "ping", "n": "ü"}),
        ] {
            match channel.read_frame().await.unwrap() {
                Some(Frame::Message(value)) => assert_eq!(value, expected),
                other => panic!("unexpected frame: {other:?}"),
            }
        }
        assert!(channel.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_input_is_end_of_stream() {
        let mut output: Vec<u8> = Vec::new();
        let mut channel = FrameChannel::new(&b""[..], &mut output);
        assert!(channel.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn partial_length_prefix_is_malformed() {
        let input = [3u8, 0, 0];
        let mut output: Vec<u8> = Vec::new();
        let mut channel = FrameChannel::new(&input[..], &mut output);
        assert!(matches!(
            channel.read_frame().await,
            Err(FrameError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn truncated_payload_is_malformed() {
        let mut input = 20u32.to_ne_bytes().to_vec();
        input.extend_from_slice(b"{\"action\"");
        let mut output: Vec<u8> = Vec::new();
        let mut channel = FrameChannel::new(input.as_slice(), &mut output);
        assert!(matches!(
            channel.read_frame().await,
            Err(FrameError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn undecodable_payload_is_surfaced() {
        let mut input = 3u32.to_ne_bytes().to_vec();
        input.extend_from_slice(b"{{{");
        let mut output: Vec<u8> = Vec::new();
        let mut channel = FrameChannel::new(input.as_slice(), &mut output);
        assert!(matches!(
            channel.read_frame().await,
            Ok(Some(Frame::Undecodable(_)))
        ));
    }

    #[tokio::test]
    async fn written_frames_decode_back() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut channel = FrameChannel::new(&b""[..], &mut output);
            channel.write_frame(Response::message("pong")).await.unwrap();
            channel
                .write_frame(Response::failure("Unknown action: x"))
                .await
                .unwrap();
        }

        let mut buf = BytesMut::from(output.as_slice());
        let mut codec = FrameCodec::<Response>::new();
        let first = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        let second = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(first, Response::message("pong"));
        assert_eq!(second, Response::failure("Unknown action: x"));
        assert!(buf.is_empty());
    }

    #[tokio::test]
    async fn oversized_response_is_refused_and_channel_stays_usable() {
        let mut output: Vec<u8> = Vec::new();
        {
            let mut channel = FrameChannel::new(&b""[..], &mut output).with_outbound_limit(64);
            let big = Response::message("x".repeat(100));
            assert!(matches!(
                channel.write_frame(big).await,
                Err(FrameError::Oversized(_))
            ));
            channel.write_frame(Response::message("pong")).await.unwrap();
        }

        let mut buf = BytesMut::from(output.as_slice());
        let mut codec = FrameCodec::<Response>::new();
        let only = codec.decode(&mut buf).unwrap().unwrap().unwrap();
        assert_eq!(only, Response::message("pong"));
        assert!(buf.is_empty());
    }
}
