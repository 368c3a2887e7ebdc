// Peer-bound view of a transport
//
// A transfer talks to exactly one peer. Every wait goes through `PeerLink`,
// which classifies the datagram by its exact length and flags anything from
// another address as stray.
//
// Outside the data phase of a receive, the only frame worth answering is the
// final frame of the previous transfer from this peer (its sender may still
// be waiting for our lost ack). Every other frame is left unanswered so a
// sender whose receiver gave up cannot mistake the silence for success.

use std::net::SocketAddr;
use std::time::Duration;
use log::{debug, trace};
use crate::common::error::Result;
use crate::common::types::{FrameId, COUNT_DATAGRAM_SIZE, FRAME_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE};
use crate::protocol::control::{decode_ack, encode_ack};
use crate::protocol::frame::Frame;
use crate::transport::Transport;

/// One classified wait result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    TimedOut,
    /// Datagram from an address other than the bound peer
    Stray(SocketAddr),
    /// 8 byte datagram: a frame count or an ack id
    Control(i64),
    Frame(Frame),
    /// Any other datagram from the peer
    Other(Vec<u8>),
}

pub struct PeerLink<T: Transport> {
    transport: T,
    peer: SocketAddr,
    settled: Option<FrameId>,
    buf: Vec<u8>,
}

impl<T: Transport> PeerLink<T> {
    pub fn new(transport: T, peer: SocketAddr) -> Self {
        Self {
            transport,
            peer,
            settled: None,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// Final frame id of the last transfer received from this peer
    pub fn with_settled(mut self, settled: Option<FrameId>) -> Self {
        self.settled = settled;
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_inner(self) -> T {
        self.transport
    }

    pub fn send(&self, data: &[u8]) -> Result<()> {
        self.transport.send_to(data, self.peer)
    }

    /// Acknowledge a frame by echoing its id
    pub fn echo(&self, id: FrameId) -> Result<()> {
        trace!("ack frame {} -> {}", id, self.peer);
        self.send(&encode_ack(id))
    }

    /// Re-acknowledge `frame` only if it repeats the settled final frame
    pub fn echo_settled(&self, frame: &Frame) -> Result<()> {
        if self.settled == Some(frame.id) {
            return self.echo(frame.id);
        }
        debug!("Leaving frame {} from {} unanswered", frame.id, self.peer);
        Ok(())
    }

    /// Wait up to `timeout` for the next datagram
    pub fn wait(&mut self, timeout: Duration) -> Result<Incoming> {
        let (len, from) = match self.transport.recv_timeout(&mut self.buf, timeout)? {
            Some(received) => received,
            None => return Ok(Incoming::TimedOut),
        };

        if from != self.peer {
            debug!("Ignoring {} byte datagram from unexpected source {}", len, from);
            return Ok(Incoming::Stray(from));
        }

        let data = &self.buf[..len];
        let incoming = match len {
            COUNT_DATAGRAM_SIZE => match decode_ack(data) {
                Ok(value) => Incoming::Control(value),
                Err(_) => Incoming::Other(data.to_vec()),
            },
            FRAME_DATAGRAM_SIZE => match Frame::decode(data) {
                Ok(frame) => Incoming::Frame(frame),
                Err(e) => {
                    debug!("Discarding malformed frame: {}", e);
                    Incoming::Other(data.to_vec())
                }
            },
            _ => Incoming::Other(data.to_vec()),
        };
        Ok(incoming)
    }

    /// Wait for a datagram that is neither a frame nor stray traffic.
    ///
    /// A repeat of the settled final frame is echoed so a sender still
    /// retrying it can finish. Returns `None` on timeout.
    pub fn wait_reply(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        loop {
            match self.wait(timeout)? {
                Incoming::TimedOut => return Ok(None),
                Incoming::Frame(frame) => self.echo_settled(&frame)?,
                Incoming::Stray(_) => {}
                Incoming::Control(value) => return Ok(Some(value.to_be_bytes().to_vec())),
                Incoming::Other(data) => return Ok(Some(data)),
            }
        }
    }
}
