//! `tokio_util::codec` adapter for padlink frames.
//!
//! Decodes into [`Verified`] values and encodes raw payloads, applying the
//! same size ceiling and truncation rules as the blocking reader and writer.

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::checksum::Verified;
use crate::codec::{pending_frame_len, Framer};
use crate::error::{FrameError, Result};

/// Frame codec for use with `FramedRead` / `FramedWrite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PadCodec {
    framer: Framer,
}

impl PadCodec {
    /// Codec with the default 8 KiB payload ceiling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with an explicit payload ceiling.
    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self {
            framer: Framer::new(max_packet_size),
        }
    }

    /// The framer backing this codec.
    pub fn framer(&self) -> &Framer {
        &self.framer
    }
}

impl Decoder for PadCodec {
    type Item = Verified;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Verified>> {
        self.framer.open(src)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Verified>> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::TruncatedFrame {
                expected: pending_frame_len(buf),
                received: buf.len(),
            }),
        }
    }
}

impl Encoder<&[u8]> for PadCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        self.framer.seal_into(payload, dst)
    }
}

impl Encoder<Bytes> for PadCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.framer.seal_into(&payload, dst)
    }
}
