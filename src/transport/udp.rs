// UDP socket transport

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use log::debug;
use crate::common::error::{Error, Result};
use super::Transport;

/// Smallest read timeout handed to the socket; a zero timeout means
/// "block forever" to the OS.
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Blocking UDP socket speaking raw datagrams
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a socket. Passing port 0 lets the OS pick an ephemeral port.
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(Error::Channel)?;
        socket.set_nonblocking(false).map_err(Error::Channel)?;
        Ok(Self { socket })
    }
}

impl Transport for UdpTransport {
    fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<()> {
        self.socket.send_to(data, peer).map_err(Error::Channel)?;
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Option<Duration>)
        -> Result<Option<(usize, SocketAddr)>> {
        let timeout = timeout.map(|t| t.max(MIN_READ_TIMEOUT));
        self.socket.set_read_timeout(timeout).map_err(Error::Channel)?;

        match self.socket.recv_from(buf) {
            Ok(received) => Ok(Some(received)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock
                || e.kind() == io::ErrorKind::TimedOut => Ok(None),
            // ICMP port unreachable from an earlier send surfaces here on some
            // platforms; the peer is simply not answering yet.
            Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                debug!("recv_from: peer unreachable ({})", e);
                Ok(None)
            }
            Err(e) => Err(Error::Channel(e)),
        }
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::Channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_send_recv() {
        let a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let b = UdpTransport::bind("127.0.0.1:0").unwrap();

        a.send_to(b"ping", b.local_addr().unwrap()).unwrap();

        let mut buf = [0u8; 16];
        let (len, from) = b
            .recv_timeout(&mut buf, Duration::from_secs(2))
            .unwrap()
            .expect("datagram should arrive on loopback");
        assert_eq!(&buf[..len], b"ping");
        assert_eq!(from, a.local_addr().unwrap());
    }

    #[test]
    fn test_recv_times_out() {
        let a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let mut buf = [0u8; 16];
        let received = a.recv_timeout(&mut buf, Duration::from_millis(20)).unwrap();
        assert!(received.is_none());
    }

    #[test]
    fn test_bind_failure_is_channel_error() {
        let a = UdpTransport::bind("127.0.0.1:0").unwrap();
        let taken = a.local_addr().unwrap();
        match UdpTransport::bind(taken) {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("second bind on {} should fail", taken),
        }
    }
}
