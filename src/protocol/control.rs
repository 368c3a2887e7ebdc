// Small control datagrams: frame count, frame ack and delete status

use bytes::{Buf, BufMut, BytesMut};
use crate::common::error::{Error, Result};
use crate::common::types::{FrameId, COUNT_DATAGRAM_SIZE, STATUS_DATAGRAM_SIZE};

/// Frame count announced during negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCount {
    /// Source file does not exist or cannot be read
    Absent,
    /// Number of frames to follow; zero means an empty source
    Frames(u64),
}

impl FrameCount {
    pub fn to_wire(self) -> i64 {
        match self {
            FrameCount::Absent => -1,
            FrameCount::Frames(n) => n as i64,
        }
    }

    /// Any negative value means absent
    pub fn from_wire(value: i64) -> Self {
        if value < 0 {
            FrameCount::Absent
        } else {
            FrameCount::Frames(value as u64)
        }
    }

    pub fn encode(self) -> [u8; COUNT_DATAGRAM_SIZE] {
        encode_i64(self.to_wire())
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        decode_i64(data).map(Self::from_wire)
    }

    /// Whether a data phase follows
    pub fn has_data(self) -> bool {
        matches!(self, FrameCount::Frames(n) if n > 0)
    }
}

/// Acknowledgment for a frame: the id alone
pub fn encode_ack(id: FrameId) -> [u8; COUNT_DATAGRAM_SIZE] {
    encode_i64(id as i64)
}

pub fn decode_ack(data: &[u8]) -> Result<i64> {
    decode_i64(data)
}

fn encode_i64(value: i64) -> [u8; COUNT_DATAGRAM_SIZE] {
    value.to_be_bytes()
}

fn decode_i64(mut data: &[u8]) -> Result<i64> {
    if data.len() != COUNT_DATAGRAM_SIZE {
        return Err(Error::Protocol(format!(
            "Expected {} byte control datagram, got {}",
            COUNT_DATAGRAM_SIZE,
            data.len()
        )));
    }
    Ok(data.get_i64())
}

/// Outcome of a remote delete, sent back as a single i32
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteStatus {
    NotFound = -1,
    NoPermission = 0,
    Deleted = 1,
}

impl DeleteStatus {
    pub fn encode(self) -> [u8; STATUS_DATAGRAM_SIZE] {
        let mut buf = BytesMut::with_capacity(STATUS_DATAGRAM_SIZE);
        buf.put_i32(self as i32);
        let mut out = [0u8; STATUS_DATAGRAM_SIZE];
        out.copy_from_slice(&buf);
        out
    }

    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() != STATUS_DATAGRAM_SIZE {
            return Err(Error::Protocol(format!(
                "Expected {} byte delete status, got {}",
                STATUS_DATAGRAM_SIZE,
                data.len()
            )));
        }
        match data.get_i32() {
            -1 => Ok(DeleteStatus::NotFound),
            0 => Ok(DeleteStatus::NoPermission),
            1 => Ok(DeleteStatus::Deleted),
            other => Err(Error::Protocol(format!("Unknown delete status {}", other))),
        }
    }
}

impl std::fmt::Display for DeleteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeleteStatus::NotFound => write!(f, "file not found"),
            DeleteStatus::NoPermission => write!(f, "file does not have appropriate permission"),
            DeleteStatus::Deleted => write!(f, "file deleted"),
        }
    }
}
