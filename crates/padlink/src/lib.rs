//! Stream controller samples over TCP with CRC-32 checked framing.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener/connector and the connected `LinkStream`
//! - [`frame`]: Length-prefixed, checksummed packet framing
//!
//! The `padlink` binary (behind the `cli` feature) wraps both into a sample
//! producer (`padlink send`) and consumer (`padlink listen`).

/// Re-export transport types.
pub mod transport {
    pub use padlink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use padlink_frame::*;
}
