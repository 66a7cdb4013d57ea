//! CRC-32 wire units.
//!
//! A wire unit is the payload followed by the big-endian CRC-32 (IEEE) of the
//! payload:
//!
//! ```text
//! ┌──────────────────┬──────────────┐
//! │ Payload          │ CRC-32       │
//! │ (N bytes)        │ (4B BE)      │
//! └──────────────────┴──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use padlink_frame::{append_crc, verify_packet};
//!
//! let wire_unit = append_crc(b"sample");
//! let verified = verify_packet(&wire_unit);
//! assert!(verified.is_intact());
//! assert_eq!(verified.payload(), b"sample");
//! ```

use bytes::{BufMut, Bytes, BytesMut};

/// Size of the trailing checksum in bytes.
pub const CHECKSUM_SIZE: usize = 4;

/// Why a wire unit failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Corruption {
    /// Too short to hold a checksum trailer.
    #[error("wire unit too short ({len} bytes, need at least 4)")]
    TooShort { len: usize },

    /// The trailer does not match the recomputed checksum.
    #[error("checksum mismatch (expected {expected:#010x}, computed {actual:#010x})")]
    ChecksumMismatch { expected: u32, actual: u32 },
}

/// Outcome of verifying one wire unit.
///
/// The extracted payload is carried in both variants so callers can log or
/// inspect corrupt data before dropping it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verified {
    /// Checksum matched; the payload can be consumed.
    Intact(Bytes),
    /// Checksum missing or wrong; the payload must not be consumed.
    Corrupt { payload: Bytes, reason: Corruption },
}

impl Verified {
    /// True if the checksum matched.
    pub fn is_intact(&self) -> bool {
        matches!(self, Verified::Intact(_))
    }

    /// The extracted payload, whether intact or not.
    pub fn payload(&self) -> &[u8] {
        match self {
            Verified::Intact(payload) | Verified::Corrupt { payload, .. } => payload,
        }
    }

    /// Consume and return the extracted payload, whether intact or not.
    pub fn into_payload(self) -> Bytes {
        match self {
            Verified::Intact(payload) | Verified::Corrupt { payload, .. } => payload,
        }
    }

    /// The corruption reason, if any.
    pub fn corruption(&self) -> Option<Corruption> {
        match self {
            Verified::Intact(_) => None,
            Verified::Corrupt { reason, .. } => Some(*reason),
        }
    }

    /// Split into `(payload, ok)`.
    pub fn into_parts(self) -> (Bytes, bool) {
        let ok = self.is_intact();
        (self.into_payload(), ok)
    }
}

/// CRC-32 (IEEE) of `payload`.
pub fn compute_crc(payload: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(payload);
    hasher.finalize()
}

/// Build a wire unit: `payload` followed by its big-endian CRC-32.
///
/// Size limits are the caller's job; this never fails.
pub fn append_crc(payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + CHECKSUM_SIZE);
    put_wire_unit(payload, &mut out);
    out.freeze()
}

pub(crate) fn put_wire_unit(payload: &[u8], dst: &mut BytesMut) {
    dst.put_slice(payload);
    dst.put_u32(compute_crc(payload));
}

/// Split a wire unit into payload and checksum and check them against each other.
///
/// The returned payload is a fresh copy, independent of `wire_unit`.
pub fn verify_packet(wire_unit: &[u8]) -> Verified {
    let Some(payload_len) = wire_unit.len().checked_sub(CHECKSUM_SIZE) else {
        return Verified::Corrupt {
            payload: Bytes::new(),
            reason: Corruption::TooShort {
                len: wire_unit.len(),
            },
        };
    };

    let (payload, trailer) = wire_unit.split_at(payload_len);
    let expected = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = compute_crc(payload);
    let payload = Bytes::copy_from_slice(payload);

    if actual == expected {
        Verified::Intact(payload)
    } else {
        Verified::Corrupt {
            payload,
            reason: Corruption::ChecksumMismatch { expected, actual },
        }
    }
}
