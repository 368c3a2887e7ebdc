// Transfer engine - stop-and-wait ARQ shared by both directions
//
// The same engine runs on both peers. Whoever holds the data plays `Sender`
// (server on GET, client on PUT, server for framed listings), the other end
// plays `Receiver`. A transfer is negotiation (agree on the frame count) and
// then the data phase (one frame in flight, resend until acknowledged).

pub mod link;
pub mod negotiation;
pub mod receiver;
pub mod sender;
pub mod session;

use std::fs::File;
use std::io::{self, Cursor, Read, Write};
use std::net::SocketAddr;
use std::path::Path;
use indicatif::ProgressBar;
use log::{error, info, warn};
use crate::common::config::TransferConfig;
use crate::common::error::{Error, Result};
use crate::common::types::{frame_count, FrameId, Role};
use crate::protocol::control::FrameCount;
use crate::storage::{PartialFile, TransferDigest};
use crate::transport::Transport;

pub use link::{Incoming, PeerLink};
pub use session::{TransferOutcome, TransferReport, TransferSession};

/// One peer's side of a transfer, bound to a single remote address
pub struct TransferEngine<T: Transport> {
    link: PeerLink<T>,
    config: TransferConfig,
    progress: ProgressBar,
}

impl<T: Transport> TransferEngine<T> {
    pub fn new(transport: T, peer: SocketAddr, config: TransferConfig) -> Self {
        Self {
            link: PeerLink::new(transport, peer),
            config,
            progress: ProgressBar::hidden(),
        }
    }

    /// Report progress (in frames) on `bar`
    pub fn with_progress(mut self, bar: ProgressBar) -> Self {
        self.progress = bar;
        self
    }

    /// Keep answering repeats of `id`, the final frame of the previous
    /// transfer received from this peer. Any other stray frame is ignored.
    pub fn with_settled(mut self, id: Option<FrameId>) -> Self {
        self.link = self.link.with_settled(id);
        self
    }

    pub fn peer(&self) -> SocketAddr {
        self.link.peer()
    }

    pub fn into_transport(self) -> T {
        self.link.into_inner()
    }

    /// Send a local file. A missing or unreadable file is announced as
    /// absent instead of failing the exchange.
    pub fn send_file(&mut self, path: &Path) -> Result<TransferReport> {
        match open_source(path) {
            Ok((file, size)) => {
                info!("Sending {:?} ({} bytes) to {}", path, size, self.peer());
                self.send_reader(file, size)
            }
            Err(e) => {
                warn!("Cannot send {:?}: {}", path, e);
                self.send_absent()
            }
        }
    }

    /// Send an in-memory buffer
    pub fn send_bytes(&mut self, data: &[u8]) -> Result<TransferReport> {
        self.send_reader(Cursor::new(data), data.len() as u64)
    }

    /// Tell the peer there is nothing to send
    pub fn send_absent(&mut self) -> Result<TransferReport> {
        let retries = negotiation::announce(
            &mut self.link,
            FrameCount::Absent,
            &self.config.negotiation_policy(),
        )?;
        Ok(TransferReport::absent(Role::Sender, retries))
    }

    /// Send `size` bytes read from `source`
    pub fn send_reader<R: Read>(&mut self, mut source: R, size: u64) -> Result<TransferReport> {
        let total = frame_count(size);
        let negotiation_retries = negotiation::announce(
            &mut self.link,
            FrameCount::Frames(total),
            &self.config.negotiation_policy(),
        )?;

        let policy = self.config.data_policy();
        let mut session = TransferSession::new(Role::Sender, total, &policy);
        let mut digest = TransferDigest::new();
        self.progress.set_length(total);

        let result = sender::send_frames(
            &mut self.link,
            &mut session,
            &mut source,
            &policy,
            &self.progress,
            |payload| digest.update(payload),
        );
        self.finish(session, negotiation_retries, digest, result)
    }

    /// Receive into a local file via `<path>.part`.
    ///
    /// Nothing is created when the peer reports the source as absent. The
    /// `.part` file is opened before the count is acknowledged; if that
    /// fails the transfer is refused so the sender aborts. On abort the
    /// partial file is removed unless `keep_partial` is set.
    pub fn receive_file(&mut self, path: &Path) -> Result<TransferReport> {
        let (count, negotiation_retries) =
            negotiation::await_count(&mut self.link, &self.config.negotiation_policy())?;
        let total = match count {
            FrameCount::Absent => {
                negotiation::accept(&self.link, count)?;
                return Ok(TransferReport::absent(Role::Receiver, negotiation_retries));
            }
            FrameCount::Frames(total) => total,
        };

        let mut part = match PartialFile::create(path, self.config.keep_partial) {
            Ok(part) => part,
            Err(e) => {
                error!("Cannot open {:?} for writing: {}", path, e);
                negotiation::refuse(&self.link)?;
                return Err(e);
            }
        };
        negotiation::accept(&self.link, count)?;

        info!("Receiving {} frames into {:?}", total, path);
        let report = self.receive_frames(total, &mut part, negotiation_retries)?;
        part.commit()?;
        Ok(report)
    }

    /// Receive the whole payload into memory. `None` when the peer has
    /// nothing to send.
    pub fn receive_bytes(&mut self) -> Result<(TransferReport, Option<Vec<u8>>)> {
        let mut sink = Vec::new();
        let report = self.receive_into(&mut sink)?;
        let data = match report.outcome {
            TransferOutcome::Absent => None,
            _ => Some(sink),
        };
        Ok((report, data))
    }

    /// Receive into any writer
    pub fn receive_into<W: Write>(&mut self, sink: &mut W) -> Result<TransferReport> {
        let (count, negotiation_retries) =
            negotiation::await_count(&mut self.link, &self.config.negotiation_policy())?;
        negotiation::accept(&self.link, count)?;
        match count {
            FrameCount::Absent => Ok(TransferReport::absent(Role::Receiver, negotiation_retries)),
            FrameCount::Frames(total) => self.receive_frames(total, sink, negotiation_retries),
        }
    }

    fn receive_frames<W: Write>(
        &mut self,
        total: u64,
        sink: &mut W,
        negotiation_retries: u64,
    ) -> Result<TransferReport> {
        let policy = self.config.data_policy();
        let mut session = TransferSession::new(Role::Receiver, total, &policy);
        let mut digest = TransferDigest::new();
        self.progress.set_length(total);

        let result = receiver::receive_frames(
            &mut self.link,
            &mut session,
            sink,
            &policy,
            &self.progress,
            |payload| digest.update(payload),
        );

        if result.is_ok() && total > 0 {
            if let Some(linger) = self.config.linger() {
                receiver::linger(&mut self.link, total, linger, policy.max_retries)?;
            }
        }
        self.finish(session, negotiation_retries, digest, result)
    }

    fn finish(
        &self,
        session: TransferSession,
        negotiation_retries: u64,
        digest: TransferDigest,
        result: Result<()>,
    ) -> Result<TransferReport> {
        if let Err(e) = result {
            self.progress.abandon();
            error!(
                "{:?} transfer with {} aborted at frame {}/{}: {}",
                session.role(),
                self.peer(),
                session.next_expected_id(),
                session.total_frames(),
                e
            );
            return Err(e);
        }
        self.progress.finish();

        let report = TransferReport {
            role: session.role(),
            outcome: if session.total_frames() == 0 {
                TransferOutcome::Empty
            } else {
                TransferOutcome::Completed
            },
            frames: session.total_frames(),
            bytes: session.bytes_transferred(),
            retransmissions: negotiation_retries + session.retransmissions(),
            digest: Some(digest.finalize_hex()),
        };
        info!(
            "{:?} transfer with {} finished: {} frames, {} bytes, {} retransmissions, blake3 {}",
            report.role,
            self.peer(),
            report.frames,
            report.bytes,
            report.retransmissions,
            report.digest.as_deref().unwrap_or("-")
        );
        Ok(report)
    }
}

fn open_source(path: &Path) -> Result<(File, u64)> {
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => Error::FileNotFound(path.display().to_string()),
        io::ErrorKind::PermissionDenied => Error::PermissionDenied(path.display().to_string()),
        _ => Error::Io(e),
    })?;
    let metadata = file.metadata()?;
    if !metadata.is_file() {
        return Err(Error::FileNotFound(path.display().to_string()));
    }
    Ok((file, metadata.len()))
}
