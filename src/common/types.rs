// Common type definitions and constants

use std::time::Duration;
use serde::{Serialize, Deserialize};

pub type FrameId = u64;

/// Payload capacity of a single frame
pub const FRAME_PAYLOAD_SIZE: usize = 2048;
/// id (8) + length (8) + payload
pub const FRAME_DATAGRAM_SIZE: usize = 16 + FRAME_PAYLOAD_SIZE;
/// Frame count and frame acks travel as a single i64
pub const COUNT_DATAGRAM_SIZE: usize = 8;
/// Delete status is a single i32
pub const STATUS_DATAGRAM_SIZE: usize = 4;
/// Commands are always sent as a fixed, NUL padded buffer
pub const COMMAND_DATAGRAM_SIZE: usize = 50;
/// Cap for the single-datagram directory listing
pub const LISTING_DATAGRAM_CAP: usize = 200;
/// Receive buffer large enough for any datagram the protocol sends
pub const MAX_DATAGRAM_SIZE: usize = FRAME_DATAGRAM_SIZE;

pub const DEFAULT_PORT: u16 = 4950;
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_NEGOTIATION_RETRIES: u32 = 20;
pub const DEFAULT_DATA_RETRIES: u32 = 200;

/// Which end of the frame flow the local side plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Sender,
    Receiver,
}

/// Phase of a transfer, used to pick the retry policy and for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferPhase {
    Negotiation,
    Data,
}

impl std::fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferPhase::Negotiation => write!(f, "negotiation"),
            TransferPhase::Data => write!(f, "data"),
        }
    }
}

/// How the server answers `ls`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingMode {
    /// One datagram, truncated to `LISTING_DATAGRAM_CAP` bytes
    Datagram,
    /// Listing bytes carried by the transfer engine like a file
    #[default]
    Framed,
}

/// Number of frames needed to carry `size` bytes
pub fn frame_count(size: u64) -> u64 {
    size.div_ceil(FRAME_PAYLOAD_SIZE as u64)
}
