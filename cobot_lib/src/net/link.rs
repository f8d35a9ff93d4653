//! Transport under the pose streamer.
//!
//! `Connector` opens a `PoseLink`; the streamer never touches sockets
//! directly, which keeps the connection state machine testable without a
//! network.

use crate::types::Endpoint;
use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;
use tracing::debug;

/// An open, send-only link to the arm controller.
pub trait PoseLink: Send + 'static {
    /// Discards any unread inbound bytes. Fails when the peer has closed.
    fn drain_inbound(&mut self) -> io::Result<usize>;

    /// Writes one payload as a single message.
    fn send(&mut self, payload: &[u8]) -> io::Result<()>;

    /// Half-closes the link. Errors are ignored.
    fn close(&mut self);
}

/// Opens links. Called from the connect worker thread.
pub trait Connector: Send + Sync + 'static {
    type Link: PoseLink;

    fn connect(&self, endpoint: &Endpoint) -> io::Result<Self::Link>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    pub connect: Duration,
    pub send: Duration,
    pub receive: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(1000),
            send: Duration::from_millis(1000),
            receive: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    timeouts: LinkTimeouts,
}

impl TcpConnector {
    pub fn new(timeouts: LinkTimeouts) -> Self {
        Self { timeouts }
    }
}

impl Connector for TcpConnector {
    type Link = TcpLink;

    fn connect(&self, endpoint: &Endpoint) -> io::Result<TcpLink> {
        let addrs = (endpoint.host.as_str(), endpoint.port).to_socket_addrs()?;

        let mut last_err = None;
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.timeouts.connect) {
                Ok(stream) => {
                    stream.set_write_timeout(Some(self.timeouts.send))?;
                    stream.set_read_timeout(Some(self.timeouts.receive))?;
                    stream.set_nodelay(true)?;
                    debug!("TCP link open to {}", addr);
                    return Ok(TcpLink { stream });
                }
                Err(e) => {
                    debug!("Connect to {} failed: {}", addr, e);
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                ErrorKind::NotFound,
                format!("{} did not resolve to any address", endpoint),
            )
        }))
    }
}

pub struct TcpLink {
    stream: TcpStream,
}

impl PoseLink for TcpLink {
    fn drain_inbound(&mut self) -> io::Result<usize> {
        self.stream.set_nonblocking(true)?;

        let mut buf = [0u8; 1024];
        let mut total = 0;
        let result = loop {
            match self.stream.read(&mut buf) {
                Ok(0) => {
                    break Err(io::Error::new(
                        ErrorKind::ConnectionAborted,
                        "peer closed the connection",
                    ))
                }
                Ok(n) => total += n,
                Err(e) if e.kind() == ErrorKind::WouldBlock => break Ok(total),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };

        self.stream.set_nonblocking(false)?;
        result
    }

    fn send(&mut self, payload: &[u8]) -> io::Result<()> {
        self.stream.write_all(payload)?;
        self.stream.flush()
    }

    fn close(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Write);
    }
}
