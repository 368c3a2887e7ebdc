// Retry policy for stop-and-wait retransmission
//
// Cancellation is count based: every wait has a fixed timeout and a unit is
// abandoned after `max_retries` consecutive failed retransmissions. There is
// no wall-clock deadline for a whole operation.

use std::time::Duration;
use crate::common::error::{Error, Result};
use crate::common::types::TransferPhase;

/// Timeout and retry ceiling applied to one kind of unit (count or frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// How long a single wait for the peer may block
    pub timeout: Duration,
    /// Consecutive retransmissions allowed before aborting
    pub max_retries: u32,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, max_retries: u32) -> Self {
        Self { timeout, max_retries }
    }

    /// Start counting failures for one unit
    pub fn counter(&self, phase: TransferPhase) -> RetryCounter {
        RetryCounter {
            phase,
            attempts: 0,
            max_retries: self.max_retries,
        }
    }
}

/// Consecutive-failure counter for the unit currently in flight
#[derive(Debug, Clone)]
pub struct RetryCounter {
    phase: TransferPhase,
    attempts: u32,
    max_retries: u32,
}

impl RetryCounter {
    /// Record a failed wait (timeout, mismatch, stray datagram).
    ///
    /// Returns `Ok(())` when another retransmission is allowed and
    /// `Err(RetriesExhausted)` once the ceiling has been reached.
    pub fn record_failure(&mut self) -> Result<()> {
        if self.attempts >= self.max_retries {
            return Err(Error::RetriesExhausted {
                phase: self.phase,
                attempts: self.attempts,
            });
        }
        self.attempts += 1;
        Ok(())
    }

    /// The unit was confirmed; the next unit starts from zero
    pub fn reset(&mut self) {
        self.attempts = 0;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}
