//! Stream framing: `"OK"` then a sequence of `(4-byte big-endian length,
//! body)` records. Used for streaming-authenticated methods (directory
//! listings and blob downloads, in `gns_node`'s routes).

use bytes::{Buf, Bytes, BytesMut};

use crate::error::RpcError;
use crate::headers::{MAX_FRAME_LEN, STREAM_PREAMBLE};

pub fn encode_frame(body: &[u8]) -> Result<Bytes, RpcError> {
    if body.len() as u64 > MAX_FRAME_LEN as u64 {
        return Err(RpcError::FrameTooLarge);
    }
    let mut out = BytesMut::with_capacity(4 + body.len());
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
    Ok(out.freeze())
}

pub fn encode_preamble() -> Bytes {
    Bytes::from_static(STREAM_PREAMBLE)
}

/// Incrementally assembles frames from a byte stream. Callers feed bytes
/// as they arrive (over a `reqwest`/`axum` body stream) and poll
/// [`FrameReader::next_frame`] after each feed; a `None` inside `Ok` means
/// "need more bytes", not end of stream.
#[derive(Default)]
pub struct FrameReader {
    buf: BytesMut,
    consumed_preamble: bool,
}

impl FrameReader {
    pub fn new() -> Self {
        Self { buf: BytesMut::new(), consumed_preamble: false }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Returns `Ok(Some(frame))` once a complete frame is buffered,
    /// `Ok(None)` if more bytes are needed, or `Err` on a protocol
    /// violation (oversized length prefix or a malformed preamble).
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, RpcError> {
        if !self.consumed_preamble {
            if self.buf.len() < STREAM_PREAMBLE.len() {
                return Ok(None);
            }
            if &self.buf[..STREAM_PREAMBLE.len()] != STREAM_PREAMBLE {
                return Err(RpcError::MalformedHeader("stream did not begin with the OK preamble".into()));
            }
            self.buf.advance(STREAM_PREAMBLE.len());
            self.consumed_preamble = true;
        }

        if self.buf.len() < 4 {
            return Ok(None);
        }
        let len = u32::from_be_bytes(self.buf[..4].try_into().expect("checked length above"));
        if len > MAX_FRAME_LEN {
            return Err(RpcError::FrameTooLarge);
        }
        let total = 4 + len as usize;
        if self.buf.len() < total {
            return Ok(None);
        }
        self.buf.advance(4);
        let frame = self.buf.split_to(len as usize).freeze();
        Ok(Some(frame))
    }

    /// Called once the underlying connection has closed; a non-empty
    /// leftover buffer means the stream was cut mid-frame.
    pub fn finish(&self) -> Result<(), RpcError> {
        if self.buf.is_empty() { Ok(()) } else { Err(RpcError::Truncated) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_frames_fed_in_arbitrary_chunks() {
        let mut out = BytesMut::new();
        out.extend_from_slice(STREAM_PREAMBLE);
        out.extend_from_slice(&encode_frame(b"hello").unwrap());
        out.extend_from_slice(&encode_frame(b"world").unwrap());

        let mut reader = FrameReader::new();
        let mut frames = Vec::new();
        for byte in out.iter() {
            reader.feed(&[*byte]);
            while let Some(frame) = reader.next_frame().unwrap() {
                frames.push(frame);
            }
        }
        reader.finish().unwrap();
        assert_eq!(frames, vec![Bytes::from_static(b"hello"), Bytes::from_static(b"world")]);
    }

    #[test]
    fn rejects_oversized_length_prefix() {
        let mut reader = FrameReader::new();
        reader.feed(STREAM_PREAMBLE);
        reader.feed(&(MAX_FRAME_LEN + 1).to_be_bytes());
        assert!(matches!(reader.next_frame(), Err(RpcError::FrameTooLarge)));
    }

    #[test]
    fn finish_rejects_truncated_trailing_bytes() {
        let mut reader = FrameReader::new();
        reader.feed(STREAM_PREAMBLE);
        reader.feed(&3u32.to_be_bytes());
        reader.feed(b"ab");
        assert!(reader.finish().is_err());
    }
}
