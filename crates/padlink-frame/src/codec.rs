use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::checksum::{put_wire_unit, verify_packet, Verified, CHECKSUM_SIZE};
use crate::error::{FrameError, Result};

/// Length prefix: 4 bytes, big-endian wire unit length.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Default maximum payload size: 8 KiB.
pub const DEFAULT_MAX_PACKET_SIZE: usize = 8192;

/// Largest wire unit a receiver accepts for a given payload ceiling.
pub const fn max_wire_unit(max_packet_size: usize) -> usize {
    max_packet_size.saturating_add(CHECKSUM_SIZE)
}

/// Prepend the length prefix to an already-sealed wire unit.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────────┬──────────────┐
/// │ Length       │ Payload          │ CRC-32       │
/// │ (4B BE)      │ (Length-4 bytes) │ (4B BE)      │
/// └──────────────┴──────────────────┴──────────────┘
///                 \_________ wire unit ___________/
/// ```
pub fn encode_frame(wire_unit: &[u8], dst: &mut BytesMut) -> Result<()> {
    let len = prefix_for(wire_unit.len())?;
    dst.reserve(LENGTH_PREFIX_SIZE + wire_unit.len());
    dst.put_u32(len);
    dst.put_slice(wire_unit);
    Ok(())
}

/// Checksum and frame `payload` in one pass.
///
/// Equivalent to `encode_frame(&append_crc(payload), dst)` without the
/// intermediate buffer. No size ceiling is applied here.
pub fn frame_payload(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let wire_len = payload.len().saturating_add(CHECKSUM_SIZE);
    let len = prefix_for(wire_len)?;
    dst.reserve(LENGTH_PREFIX_SIZE + wire_len);
    dst.put_u32(len);
    put_wire_unit(payload, dst);
    Ok(())
}

fn prefix_for(wire_len: usize) -> Result<u32> {
    u32::try_from(wire_len).map_err(|_| FrameError::FrameTooLarge {
        len: wire_len,
        max: u32::MAX as usize,
    })
}

/// Decode one frame from a buffer, yielding its wire unit.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the prefix and wire unit bytes.
pub fn decode_frame(src: &mut BytesMut, max_wire_unit: usize) -> Result<Option<Bytes>> {
    if src.len() < LENGTH_PREFIX_SIZE {
        return Ok(None);
    }

    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    if len > max_wire_unit {
        return Err(FrameError::FrameTooLarge {
            len,
            max: max_wire_unit,
        });
    }

    let total = LENGTH_PREFIX_SIZE + len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None);
    }

    src.advance(LENGTH_PREFIX_SIZE);
    Ok(Some(src.split_to(len).freeze()))
}

/// Bytes the frame at the head of `src` occupies, as far as can be told.
///
/// With fewer than four bytes buffered only the prefix itself is known.
pub(crate) fn pending_frame_len(src: &[u8]) -> usize {
    if src.len() < LENGTH_PREFIX_SIZE {
        return LENGTH_PREFIX_SIZE;
    }
    let len = u32::from_be_bytes([src[0], src[1], src[2], src[3]]) as usize;
    LENGTH_PREFIX_SIZE.saturating_add(len)
}

/// Configuration for the frame reader and writer.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes, before checksum and prefix. Default: 8 KiB.
    pub max_packet_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl FrameConfig {
    /// A framer enforcing this configuration's size ceiling.
    pub fn framer(&self) -> Framer {
        Framer::new(self.max_packet_size)
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

/// Size-checked sealing and opening of frames.
///
/// Carries the payload ceiling as a per-instance value, so two links in one
/// process can run with different limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framer {
    max_packet_size: usize,
}

impl Framer {
    /// Create a framer with an explicit payload ceiling.
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    /// The payload ceiling in bytes.
    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }

    /// Reject payloads over the ceiling.
    pub fn check_payload(&self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.max_packet_size {
            return Err(FrameError::OversizedPayload {
                size: payload.len(),
                max: self.max_packet_size,
            });
        }
        Ok(())
    }

    /// Check, checksum and frame `payload`, appending to `dst`.
    ///
    /// On error `dst` is left untouched.
    pub fn seal_into(&self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        self.check_payload(payload)?;
        frame_payload(payload, dst)
    }

    /// Check, checksum and frame `payload` into a new buffer.
    pub fn seal(&self, payload: &[u8]) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len() + CHECKSUM_SIZE);
        self.seal_into(payload, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode and verify the next frame in `src`.
    ///
    /// `Ok(None)` means more bytes are needed.
    pub fn open(&self, src: &mut BytesMut) -> Result<Option<Verified>> {
        let wire_unit = decode_frame(src, max_wire_unit(self.max_packet_size))?;
        Ok(wire_unit.map(|wire_unit| verify_packet(&wire_unit)))
    }
}

impl Default for Framer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKET_SIZE)
    }
}

impl From<&FrameConfig> for Framer {
    fn from(config: &FrameConfig) -> Self {
        config.framer()
    }
}
