// Frame count negotiation
//
// Before any data moves the sender announces the frame count and repeats it
// until the receiver echoes the same value back. A receiver that cannot take
// the data answers a positive count with the absent marker (-1) instead.

use log::{debug, info, warn};
use crate::common::error::{Error, Result};
use crate::common::types::TransferPhase;
use crate::protocol::control::FrameCount;
use crate::retransmission::RetryPolicy;
use crate::transport::Transport;
use super::link::{Incoming, PeerLink};

/// Announce `count` and wait for the matching echo.
///
/// Returns the number of retransmissions it took. Fails with
/// `RetriesExhausted` after `policy.max_retries` unanswered rounds, before
/// any data frame has been sent, and with `Refused` when the receiver
/// answers a data-carrying count with the absent marker.
pub fn announce<T: Transport>(
    link: &mut PeerLink<T>,
    count: FrameCount,
    policy: &RetryPolicy,
) -> Result<u64> {
    let wire = count.to_wire();
    let block = count.encode();
    let mut retries = policy.counter(TransferPhase::Negotiation);

    debug!("Announcing frame count {} to {}", wire, link.peer());
    link.send(&block)?;

    loop {
        match link.wait(policy.timeout)? {
            Incoming::Control(ack) if ack == wire => {
                info!("Peer {} confirmed frame count {}", link.peer(), wire);
                return Ok(retries.attempts() as u64);
            }
            Incoming::Control(ack) if FrameCount::from_wire(ack) == FrameCount::Absent => {
                return Err(Error::Refused(format!(
                    "{} cannot accept {} frames",
                    link.peer(),
                    wire
                )));
            }
            Incoming::Control(ack) => debug!("Count ack {} does not match {}", ack, wire),
            Incoming::Frame(frame) => link.echo_settled(&frame)?,
            Incoming::TimedOut => debug!("No count ack within {:?}", policy.timeout),
            Incoming::Stray(_) | Incoming::Other(_) => {}
        }

        retries.record_failure()?;
        warn!(
            "Resending frame count {} (attempt {}/{})",
            wire,
            retries.attempts(),
            policy.max_retries
        );
        link.send(&block)?;
    }
}

/// Wait for the sender's frame count. The caller answers it with `accept`
/// or `refuse` once it knows whether it can store the data.
pub fn await_count<T: Transport>(
    link: &mut PeerLink<T>,
    policy: &RetryPolicy,
) -> Result<(FrameCount, u64)> {
    let mut retries = policy.counter(TransferPhase::Negotiation);

    loop {
        match link.wait(policy.timeout)? {
            Incoming::Control(value) => {
                info!("Frame count from {}: {}", link.peer(), value);
                return Ok((FrameCount::from_wire(value), retries.attempts() as u64));
            }
            Incoming::Frame(frame) => link.echo_settled(&frame)?,
            Incoming::TimedOut => debug!("Still waiting for frame count from {}", link.peer()),
            Incoming::Stray(_) | Incoming::Other(_) => {}
        }
        retries.record_failure()?;
    }
}

/// Echo `count` back; every count, including empty and absent, is
/// acknowledged so the sender can finish its negotiation
pub fn accept<T: Transport>(link: &PeerLink<T>, count: FrameCount) -> Result<()> {
    link.send(&count.encode())
}

/// Turn the transfer down. A sender that announced data aborts on this.
pub fn refuse<T: Transport>(link: &PeerLink<T>) -> Result<()> {
    warn!("Refusing transfer from {}", link.peer());
    link.send(&FrameCount::Absent.encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::thread;
    use std::time::Duration;
    use crate::protocol::frame::Frame;
    use crate::transport::{Fate, MemoryTransport};

    fn pair() -> (MemoryTransport, MemoryTransport) {
        MemoryTransport::pair("10.0.0.1:1".parse().unwrap(), "10.0.0.2:2".parse().unwrap())
    }

    fn policy(max: u32) -> RetryPolicy {
        RetryPolicy::new(Duration::from_millis(20), max)
    }

    #[test]
    fn test_announce_and_await() {
        let (a, b) = pair();
        let a_addr: SocketAddr = a.local_addr().unwrap();
        let b_addr: SocketAddr = b.local_addr().unwrap();

        let receiver = thread::spawn(move || {
            let mut link = PeerLink::new(b, a_addr);
            let (count, _) = await_count(&mut link, &policy(5)).unwrap();
            accept(&link, count).unwrap();
            count
        });

        let mut link = PeerLink::new(a, b_addr);
        let retries = announce(&mut link, FrameCount::Frames(3), &policy(5)).unwrap();
        assert_eq!(retries, 0);
        assert_eq!(receiver.join().unwrap(), FrameCount::Frames(3));
    }

    #[test]
    fn test_announce_survives_lost_count() {
        let (a, b) = pair();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();
        // First two announcements vanish
        let a = a.with_faults(|seq, _| if seq < 2 { Fate::Drop } else { Fate::Deliver });

        let receiver = thread::spawn(move || {
            let mut link = PeerLink::new(b, a_addr);
            let (count, _) = await_count(&mut link, &policy(20)).unwrap();
            accept(&link, count).unwrap();
            count
        });

        let mut link = PeerLink::new(a, b_addr);
        let retries = announce(&mut link, FrameCount::Absent, &policy(5)).unwrap();
        assert_eq!(retries, 2);
        assert_eq!(receiver.join().unwrap(), FrameCount::Absent);
    }

    #[test]
    fn test_announce_gives_up_after_ceiling() {
        let (a, b) = pair();
        let b_addr = b.local_addr().unwrap();
        let mut link = PeerLink::new(a, b_addr);

        let result = announce(&mut link, FrameCount::Frames(1), &RetryPolicy::new(Duration::from_millis(1), 20));
        assert!(matches!(
            result,
            Err(Error::RetriesExhausted { phase: TransferPhase::Negotiation, attempts: 20 })
        ));
        // One initial send plus exactly twenty retransmissions
        assert_eq!(link.transport().sent_count(), 21);
        drop(b);
    }

    #[test]
    fn test_wrong_ack_triggers_resend() {
        let (a, b) = pair();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();

        let peer = thread::spawn(move || {
            let mut buf = [0u8; 64];
            // Answer the first announcement with a wrong value, the second correctly
            b.recv_blocking(&mut buf).unwrap();
            b.send_to(&7i64.to_be_bytes(), a_addr).unwrap();
            b.recv_blocking(&mut buf).unwrap();
            b.send_to(&4i64.to_be_bytes(), a_addr).unwrap();
        });

        let mut link = PeerLink::new(a, b_addr);
        let retries = announce(&mut link, FrameCount::Frames(4), &policy(5)).unwrap();
        peer.join().unwrap();
        assert_eq!(retries, 1);
        assert_eq!(link.transport().sent_count(), 2);
    }

    #[test]
    fn test_refusal_aborts_announce() {
        let (a, b) = pair();
        let a_addr = a.local_addr().unwrap();
        let b_addr = b.local_addr().unwrap();

        let receiver = thread::spawn(move || {
            let mut link = PeerLink::new(b, a_addr);
            let (count, _) = await_count(&mut link, &policy(5)).unwrap();
            refuse(&link).unwrap();
            count
        });

        let mut link = PeerLink::new(a, b_addr);
        let result = announce(&mut link, FrameCount::Frames(2), &policy(5));
        assert_eq!(receiver.join().unwrap(), FrameCount::Frames(2));
        assert!(matches!(result, Err(Error::Refused(_))));
        // No retransmission after the refusal
        assert_eq!(link.transport().sent_count(), 1);
    }

    #[test]
    fn test_unsettled_frames_are_not_acked_during_negotiation() {
        let (a, b) = pair();
        let a_addr = a.local_addr().unwrap();
        let mut link = PeerLink::new(b, a_addr);

        a.send_to(&Frame::new(3, b"old".to_vec()).unwrap().encode(), link.transport().local_addr().unwrap()).unwrap();
        a.send_to(&FrameCount::Frames(1).encode(), link.transport().local_addr().unwrap()).unwrap();

        let (count, retries) = await_count(&mut link, &policy(5)).unwrap();
        assert_eq!(count, FrameCount::Frames(1));
        assert_eq!(retries, 1);
        assert_eq!(link.transport().sent_count(), 0);
    }
}
