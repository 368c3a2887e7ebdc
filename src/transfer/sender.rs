// Stop-and-wait sender: one frame in flight, resend until its id comes back

use std::io::{self, Read};
use indicatif::ProgressBar;
use log::{debug, warn};
use crate::common::error::{Error, Result};
use crate::common::types::FRAME_PAYLOAD_SIZE;
use crate::protocol::frame::Frame;
use crate::retransmission::RetryPolicy;
use crate::transport::Transport;
use super::link::{Incoming, PeerLink};
use super::session::TransferSession;

/// Drive the data phase for frames `1..=session.total_frames()`.
///
/// Each frame carries the next `FRAME_PAYLOAD_SIZE` bytes of `source`.
/// `on_payload` sees every confirmed payload exactly once, in order.
pub fn send_frames<T, R, F>(
    link: &mut PeerLink<T>,
    session: &mut TransferSession,
    source: &mut R,
    policy: &RetryPolicy,
    progress: &ProgressBar,
    mut on_payload: F,
) -> Result<()>
where
    T: Transport,
    R: Read,
    F: FnMut(&[u8]),
{
    let mut chunk = vec![0u8; FRAME_PAYLOAD_SIZE];

    while !session.is_complete() {
        let id = session.next_expected_id();
        let len = read_full(source, &mut chunk)?;
        let frame = Frame::new(id, chunk[..len].to_vec())?;
        let block = frame.encode();

        link.send(&block)?;
        debug!("frame {} sent ({} bytes)", id, len);

        loop {
            match link.wait(policy.timeout)? {
                Incoming::Control(ack) if ack == id as i64 => break,
                Incoming::Control(ack) => debug!("frame {}: stale ack {}", id, ack),
                Incoming::Frame(stale) => link.echo_settled(&stale)?,
                Incoming::TimedOut => debug!("frame {}: no ack within {:?}", id, policy.timeout),
                Incoming::Stray(_) | Incoming::Other(_) => {}
            }

            session.record_failure()?;
            warn!(
                "frame {} dropped, resending ({}/{})",
                id,
                session.consecutive_retries(),
                policy.max_retries
            );
            link.send(&block)?;
        }

        on_payload(frame.payload());
        session.confirm(len);
        progress.inc(1);
        debug!("frame {} acknowledged", id);
    }

    Ok(())
}

/// Fill `buf` as far as the source allows; short only at end of input
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::Io(e)),
        }
    }
    Ok(filled)
}
