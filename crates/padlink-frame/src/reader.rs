use std::io::{ErrorKind, Read};

use bytes::BytesMut;
use padlink_transport::LinkStream;
use tracing::debug;

use crate::checksum::{verify_packet, Verified};
use crate::codec::{decode_frame, max_wire_unit, pending_frame_len, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete, verified frames from any `Read` stream.
///
/// Handles partial reads internally; callers always get whole frames.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read and verify the next frame (blocking).
    ///
    /// A bad checksum comes back as `Ok(Verified::Corrupt { .. })` and the
    /// reader stays positioned at the next frame. EOF at a frame boundary is
    /// `Err(FrameError::ConnectionClosed)`; EOF anywhere else is
    /// `Err(FrameError::TruncatedFrame { .. })`.
    ///
    /// A read timeout (`Io` with `WouldBlock` or `TimedOut`) keeps any partial
    /// frame buffered; calling `read_frame` again resumes it.
    pub fn read_frame(&mut self) -> Result<Verified> {
        let limit = max_wire_unit(self.config.max_packet_size);
        loop {
            if let Some(wire_unit) = decode_frame(&mut self.buf, limit)? {
                let verified = verify_packet(&wire_unit);
                if let Some(reason) = verified.corruption() {
                    debug!(len = wire_unit.len(), %reason, "received corrupt wire unit");
                }
                return Ok(verified);
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(self.eof_error());
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    fn eof_error(&self) -> FrameError {
        if self.buf.is_empty() {
            return FrameError::ConnectionClosed;
        }
        FrameError::TruncatedFrame {
            expected: pending_frame_len(&self.buf),
            received: self.buf.len(),
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    ///
    /// Bytes already buffered past the last returned frame are discarded.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_packet_size(&mut self, max_packet_size: usize) {
        self.config.max_packet_size = max_packet_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<LinkStream> {
    /// Create a frame reader for `LinkStream` and apply read timeout from config.
    pub fn with_config_link(inner: LinkStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: padlink_transport::TransportError) -> FrameError {
    match err {
        padlink_transport::TransportError::Io(io)
        | padlink_transport::TransportError::Accept(io) => FrameError::Io(io),
        padlink_transport::TransportError::Bind { source, .. }
        | padlink_transport::TransportError::Connect { source, .. } => FrameError::Io(source),
        other => FrameError::Io(std::io::Error::other(other.to_string())),
    }
}
