// Per-transfer state

use serde::Serialize;
use crate::common::error::Result;
use crate::common::types::{FrameId, Role, TransferPhase};
use crate::retransmission::{RetryCounter, RetryPolicy};

/// State of one GET/PUT/listing exchange. Owned by the call that created it
/// and dropped when the transfer ends.
#[derive(Debug)]
pub struct TransferSession {
    role: Role,
    total_frames: u64,
    next_expected_id: FrameId,
    bytes_transferred: u64,
    retransmissions: u64,
    retries: RetryCounter,
}

impl TransferSession {
    pub fn new(role: Role, total_frames: u64, policy: &RetryPolicy) -> Self {
        Self {
            role,
            total_frames,
            next_expected_id: 1,
            bytes_transferred: 0,
            retransmissions: 0,
            retries: policy.counter(TransferPhase::Data),
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn next_expected_id(&self) -> FrameId {
        self.next_expected_id
    }

    pub fn bytes_transferred(&self) -> u64 {
        self.bytes_transferred
    }

    pub fn retransmissions(&self) -> u64 {
        self.retransmissions
    }

    pub fn is_complete(&self) -> bool {
        self.next_expected_id > self.total_frames
    }

    /// Whether `id` is the unit currently being driven
    pub fn is_expected(&self, id: FrameId) -> bool {
        id == self.next_expected_id
    }

    /// The expected frame was confirmed: advance by exactly one
    pub fn confirm(&mut self, payload_len: usize) {
        self.next_expected_id += 1;
        self.bytes_transferred += payload_len as u64;
        self.retries.reset();
    }

    /// A wait for the current frame failed; errors once the ceiling is hit
    pub fn record_failure(&mut self) -> Result<()> {
        self.retries.record_failure()?;
        self.retransmissions += 1;
        Ok(())
    }

    pub fn consecutive_retries(&self) -> u32 {
        self.retries.attempts()
    }
}

/// How a transfer that did not abort ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransferOutcome {
    /// All frames confirmed
    Completed,
    /// Source existed but held no bytes
    Empty,
    /// Source did not exist or could not be read
    Absent,
}

/// Summary handed back to the caller when a transfer finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub role: Role,
    pub outcome: TransferOutcome,
    pub frames: u64,
    pub bytes: u64,
    pub retransmissions: u64,
    /// BLAKE3 of the transferred bytes, hex encoded
    pub digest: Option<String>,
}

impl TransferReport {
    pub fn absent(role: Role, retransmissions: u64) -> Self {
        Self {
            role,
            outcome: TransferOutcome::Absent,
            frames: 0,
            bytes: 0,
            retransmissions,
            digest: None,
        }
    }

    /// Id of the last frame this side received, if it received any. The
    /// peer may keep resending that frame until our final ack gets through.
    pub fn final_frame(&self) -> Option<FrameId> {
        match (self.role, self.outcome) {
            (Role::Receiver, TransferOutcome::Completed) if self.frames > 0 => Some(self.frames),
            _ => None,
        }
    }
}
