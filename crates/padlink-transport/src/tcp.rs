use std::io::ErrorKind;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::LinkStream;

/// TCP listener transport.
///
/// Provides bind/accept on the consumer side and connect on the producer
/// side. Every stream handed out has `TCP_NODELAY` set: samples are small and
/// frequent, and batching them behind Nagle only adds latency.
pub struct TcpTransport {
    listener: TcpListener,
    addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (`host:port`). Port 0 picks an ephemeral port.
    pub fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(addr = %local, "listening on tcp");

        Ok(Self {
            listener,
            addr: local,
        })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<LinkStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        Self::adopt(stream, peer)
    }

    /// Switch the listener between blocking and polled accepts.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener.set_nonblocking(nonblocking)?;
        Ok(())
    }

    /// Accept a pending connection, or `Ok(None)` if there is none yet.
    ///
    /// Only returns immediately once [`set_nonblocking(true)`](Self::set_nonblocking)
    /// was called. The stream handed out is always in blocking mode.
    pub fn try_accept(&self) -> Result<Option<LinkStream>> {
        match self.listener.accept() {
            Ok((stream, peer)) => Self::adopt(stream, peer).map(Some),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(err) => Err(TransportError::Accept(err)),
        }
    }

    fn adopt(stream: TcpStream, peer: SocketAddr) -> Result<LinkStream> {
        // Some platforms let accepted sockets inherit the listener's mode.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        debug!(%peer, "accepted connection");
        Ok(LinkStream::from_tcp(stream))
    }

    /// Connect to a listening peer (blocking).
    pub fn connect(addr: &str) -> Result<LinkStream> {
        let stream = TcpStream::connect(addr).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        stream.set_nodelay(true)?;
        debug!(addr, "connected over tcp");
        Ok(LinkStream::from_tcp(stream))
    }

    /// Connect with an upper bound on how long the dial may take.
    ///
    /// Tries each resolved address in order and returns the last failure.
    pub fn connect_timeout(addr: &str, timeout: Duration) -> Result<LinkStream> {
        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| TransportError::Connect {
                addr: addr.to_string(),
                source: e,
            })?
            .collect();

        let mut last_err = None;
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, timeout) {
                Ok(stream) => {
                    stream.set_nodelay(true)?;
                    debug!(addr, resolved = %candidate, "connected over tcp");
                    return Ok(LinkStream::from_tcp(stream));
                }
                Err(err) => last_err = Some(err),
            }
        }

        match last_err {
            Some(source) => Err(TransportError::Connect {
                addr: addr.to_string(),
                source,
            }),
            None => Err(TransportError::Resolve {
                addr: addr.to_string(),
            }),
        }
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
