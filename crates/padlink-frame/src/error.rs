/// Errors that can occur during frame encoding/decoding.
///
/// A checksum mismatch is deliberately absent: it is reported through
/// [`crate::Verified::Corrupt`] so the connection stays usable.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the configured maximum packet size. Nothing was sent.
    #[error("payload too large ({size} bytes, max {max})")]
    OversizedPayload { size: usize, max: usize },

    /// A received length prefix announces more bytes than this side accepts.
    #[error("frame length prefix too large ({len} bytes, max {max})")]
    FrameTooLarge { len: usize, max: usize },

    /// The stream ended part-way through a length prefix or frame body.
    #[error("truncated frame (received {received} of {expected} bytes)")]
    TruncatedFrame { expected: usize, received: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed at a frame boundary.
    #[error("connection closed")]
    ConnectionClosed,
}

impl FrameError {
    /// Whether the connection can keep going after this error.
    ///
    /// Only an oversized outgoing payload is a per-message failure; everything
    /// else leaves the stream in an unknown position.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, FrameError::OversizedPayload { .. })
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
