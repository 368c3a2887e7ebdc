// In-memory datagram link with fault injection
//
// Two endpoints connected by crossbeam channels. Outbound datagrams pass
// through an optional fault filter that can drop or duplicate them, which
// makes loss and retransmission scenarios reproducible without a network.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use log::trace;
use crate::common::error::{Error, Result};
use super::Transport;

type Datagram = (Vec<u8>, SocketAddr);
type FaultFilter = Box<dyn FnMut(usize, &[u8]) -> Fate + Send>;

/// What happens to an outbound datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fate {
    Deliver,
    Drop,
    Duplicate,
}

/// One end of an in-memory link
pub struct MemoryTransport {
    local: SocketAddr,
    remote: SocketAddr,
    outbound: Sender<Datagram>,
    inbox: Receiver<Datagram>,
    /// Handle on our own inbox, used to inject datagrams from arbitrary sources
    loopback: Sender<Datagram>,
    filter: Mutex<Option<FaultFilter>>,
    sent: AtomicUsize,
}

impl MemoryTransport {
    /// Create two connected endpoints
    pub fn pair(a: SocketAddr, b: SocketAddr) -> (Self, Self) {
        let (to_b, b_inbox) = unbounded();
        let (to_a, a_inbox) = unbounded();

        let left = Self {
            local: a,
            remote: b,
            outbound: to_b.clone(),
            inbox: a_inbox,
            loopback: to_a.clone(),
            filter: Mutex::new(None),
            sent: AtomicUsize::new(0),
        };
        let right = Self {
            local: b,
            remote: a,
            outbound: to_a,
            inbox: b_inbox,
            loopback: to_b,
            filter: Mutex::new(None),
            sent: AtomicUsize::new(0),
        };
        (left, right)
    }

    /// Decide the fate of every outbound datagram. The closure receives the
    /// zero-based sequence number of the send and the datagram bytes.
    pub fn with_faults<F>(self, filter: F) -> Self
    where
        F: FnMut(usize, &[u8]) -> Fate + Send + 'static,
    {
        if let Ok(mut slot) = self.filter.lock() {
            *slot = Some(Box::new(filter));
        }
        self
    }

    /// Deliver a datagram to this endpoint as if it came from `from`
    pub fn inject(&self, data: &[u8], from: SocketAddr) {
        let _ = self.loopback.send((data.to_vec(), from));
    }

    /// Number of send attempts, including dropped ones
    pub fn sent_count(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }

    fn fate(&self, seq: usize, data: &[u8]) -> Fate {
        match self.filter.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(filter) => filter(seq, data),
                None => Fate::Deliver,
            },
            Err(_) => Fate::Deliver,
        }
    }
}

impl Transport for MemoryTransport {
    fn send_to(&self, data: &[u8], peer: SocketAddr) -> Result<()> {
        let seq = self.sent.fetch_add(1, Ordering::SeqCst);
        if peer != self.remote {
            trace!("{} -> {}: no such peer, datagram lost", self.local, peer);
            return Ok(());
        }

        let copies = match self.fate(seq, data) {
            Fate::Deliver => 1,
            Fate::Drop => 0,
            Fate::Duplicate => 2,
        };
        for _ in 0..copies {
            // A vanished peer looks exactly like a lossy network
            let _ = self.outbound.send((data.to_vec(), self.local));
        }
        trace!("{} -> {}: {} bytes x{}", self.local, peer, data.len(), copies);
        Ok(())
    }

    fn recv_from(&self, buf: &mut [u8], timeout: Option<Duration>)
        -> Result<Option<(usize, SocketAddr)>> {
        let received = match timeout {
            Some(timeout) => match self.inbox.recv_timeout(timeout) {
                Ok(datagram) => datagram,
                Err(RecvTimeoutError::Timeout) => return Ok(None),
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(Error::Protocol("memory link closed".to_string()))
                }
            },
            None => self
                .inbox
                .recv()
                .map_err(|_| Error::Protocol("memory link closed".to_string()))?,
        };

        let (data, from) = received;
        // Same truncation semantics as a real datagram socket
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(Some((len, from)))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local)
    }
}
