//! TCP transport for padlink.
//!
//! Binds listeners, dials peers and hands out connected [`LinkStream`]s.
//! The framing layer only needs in-order, lossless bytes from this crate;
//! message boundaries are its own business.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::LinkStream;
pub use tcp::TcpTransport;
