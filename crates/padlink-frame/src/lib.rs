//! Checksummed, length-prefixed packet framing for padlink.
//!
//! This is the integrity layer of padlink. Every payload crosses the wire as:
//! - A 4-byte big-endian length prefix (payload length + 4)
//! - The payload bytes
//! - A 4-byte big-endian CRC-32 (IEEE) of the payload
//!
//! Corrupt packets are reported as a normal [`Verified::Corrupt`] value, not
//! as an error. Errors are reserved for conditions that end a connection
//! (truncation, oversized prefixes, I/O) or skip a single message
//! (oversized payloads on the sending side).

#[cfg(feature = "async")]
pub mod async_codec;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use async_codec::PadCodec;
pub use checksum::{append_crc, compute_crc, verify_packet, Corruption, Verified, CHECKSUM_SIZE};
pub use codec::{
    decode_frame, encode_frame, frame_payload, max_wire_unit, FrameConfig, Framer,
    DEFAULT_MAX_PACKET_SIZE, LENGTH_PREFIX_SIZE,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
