// Datagram transport layer
//
// The transfer engine only needs three primitives from the network: send a
// datagram, receive one with a timeout, and receive one without. Anything that
// can provide them (a UDP socket, an in-memory lossy link in tests) plugs in
// through the `Transport` trait.

pub mod memory;
pub mod udp;

use std::net::SocketAddr;
use std::time::Duration;
use crate::common::error::Result;

pub use memory::{Fate, MemoryTransport};
pub use udp::UdpTransport;

/// Unreliable datagram channel
///
/// No delivery or ordering guarantees; the sender address of every datagram
/// is reported but not validated here.
pub trait Transport {
    /// Send one datagram to `peer`
    fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<()>;

    /// Receive one datagram into `buf`.
    ///
    /// `timeout = None` blocks until something arrives. Returns `Ok(None)`
    /// when the wait timed out.
    fn recv_from(&self, buf: &mut [u8], timeout: Option<Duration>)
        -> Result<Option<(usize, SocketAddr)>>;

    fn local_addr(&self) -> Result<SocketAddr>;

    fn recv_timeout(&self, buf: &mut [u8], timeout: Duration) -> Result<Option<(usize, SocketAddr)>> {
        self.recv_from(buf, Some(timeout))
    }

    fn recv_blocking(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        loop {
            if let Some(received) = self.recv_from(buf, None)? {
                return Ok(received);
            }
        }
    }
}

impl<T: Transport + ?Sized> Transport for &T {
    fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<()> {
        (**self).send_to(data, peer)
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Option<Duration>)
        -> Result<Option<(usize, SocketAddr)>> {
        (**self).recv_from(buf, timeout)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        (**self).local_addr()
    }
}
