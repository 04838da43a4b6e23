use crate::net::wire::{self, WireSample};
use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use tracing::debug;

/// Minimal receiving end: one datagram in, one decoded sample out.
pub struct Listener {
    socket: UdpSocket,
    buf: Vec<u8>,
}

impl Listener {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr)?;
        Ok(Self {
            socket,
            buf: vec![0u8; wire::MAX_PAYLOAD * 2],
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(timeout)
    }

    /// Wait for the next datagram. `Ok(None)` means it arrived but was
    /// discarded.
    pub fn recv(&mut self) -> io::Result<Option<WireSample>> {
        let (len, from) = self.socket.recv_from(&mut self.buf)?;
        let payload = String::from_utf8_lossy(&self.buf[..len]);
        match wire::decode(&payload) {
            Ok(sample) => Ok(Some(sample)),
            Err(err) => {
                debug!(%from, error = %err, "discarding datagram");
                Ok(None)
            }
        }
    }
}
