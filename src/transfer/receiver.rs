// Stop-and-wait receiver: echo every frame id, keep only the expected one

use std::io::Write;
use std::time::Duration;
use indicatif::ProgressBar;
use log::{debug, trace};
use crate::common::error::Result;
use crate::protocol::control::FrameCount;
use crate::retransmission::RetryPolicy;
use crate::transport::Transport;
use super::link::{Incoming, PeerLink};
use super::session::TransferSession;

/// Receive frames `1..=session.total_frames()` into `sink`.
///
/// A frame whose id is not the expected one is acknowledged and discarded;
/// the session does not move. A repeated frame count (our count ack was
/// lost) is acknowledged again.
pub fn receive_frames<T, W, F>(
    link: &mut PeerLink<T>,
    session: &mut TransferSession,
    sink: &mut W,
    policy: &RetryPolicy,
    progress: &ProgressBar,
    mut on_payload: F,
) -> Result<()>
where
    T: Transport,
    W: Write,
    F: FnMut(&[u8]),
{
    let count = FrameCount::Frames(session.total_frames());

    while !session.is_complete() {
        match link.wait(policy.timeout)? {
            Incoming::Frame(frame) => {
                link.echo(frame.id)?;
                if session.is_expected(frame.id) {
                    sink.write_all(frame.payload())?;
                    on_payload(frame.payload());
                    session.confirm(frame.len());
                    progress.inc(1);
                    debug!("frame {} received ({} bytes)", frame.id, frame.len());
                    continue;
                }
                debug!(
                    "frame {} discarded, expecting {}",
                    frame.id,
                    session.next_expected_id()
                );
            }
            Incoming::Control(value) if value == count.to_wire() => {
                debug!("Frame count repeated, acknowledging again");
                link.send(&count.encode())?;
            }
            Incoming::TimedOut => debug!(
                "No frame within {:?}, still expecting {}",
                policy.timeout,
                session.next_expected_id()
            ),
            Incoming::Control(_) | Incoming::Stray(_) | Incoming::Other(_) => {}
        }
        session.record_failure()?;
    }

    sink.flush()?;
    Ok(())
}

/// Keep answering duplicates of the final frame for up to `linger`.
///
/// Covers the case where our last ack was lost and the sender is still
/// retransmitting. Ends at the first quiet period or unrelated datagram.
pub fn linger<T: Transport>(
    link: &mut PeerLink<T>,
    last_id: u64,
    linger: Duration,
    max_rounds: u32,
) -> Result<()> {
    for _ in 0..max_rounds {
        match link.wait(linger)? {
            Incoming::Frame(frame) if frame.id == last_id => {
                trace!("Repeating ack for final frame {}", last_id);
                link.echo(frame.id)?;
            }
            Incoming::Stray(_) => {}
            _ => break,
        }
    }
    Ok(())
}
