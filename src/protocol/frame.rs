// Data frame wire format
//
// Every frame is a fixed 2064 byte block: id (i64, BE), length (i64, BE) and a
// full 2048 byte payload area. Framing is purely positional; bytes after
// `length` are padding.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use crate::common::error::{Error, Result};
use crate::common::types::{FrameId, FRAME_DATAGRAM_SIZE, FRAME_PAYLOAD_SIZE};

/// One unit of file data in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub id: FrameId,
    payload: Bytes,
}

impl Frame {
    /// Build a frame, rejecting payloads larger than the frame capacity
    pub fn new(id: FrameId, payload: impl Into<Bytes>) -> Result<Self> {
        let payload = payload.into();
        if payload.len() > FRAME_PAYLOAD_SIZE {
            return Err(Error::InvalidArgument(format!(
                "Frame payload of {} bytes exceeds {}",
                payload.len(),
                FRAME_PAYLOAD_SIZE
            )));
        }
        Ok(Self { id, payload })
    }

    /// Meaningful bytes only, never the padding
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Encode into the fixed-size datagram block
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(FRAME_DATAGRAM_SIZE);
        buf.put_i64(self.id as i64);
        buf.put_i64(self.payload.len() as i64);
        buf.put_slice(&self.payload);
        buf.put_bytes(0, FRAME_PAYLOAD_SIZE - self.payload.len());
        buf.freeze()
    }

    /// Decode a frame block. A block of the wrong size or with an
    /// out-of-range length is not a frame.
    pub fn decode(mut data: &[u8]) -> Result<Self> {
        if data.len() != FRAME_DATAGRAM_SIZE {
            return Err(Error::Protocol(format!(
                "Frame datagram is {} bytes, expected {}",
                data.len(),
                FRAME_DATAGRAM_SIZE
            )));
        }

        let id = data.get_i64();
        let length = data.get_i64();
        if id < 0 || length < 0 || length as usize > FRAME_PAYLOAD_SIZE {
            return Err(Error::Protocol(format!(
                "Malformed frame header: id={} length={}",
                id, length
            )));
        }

        Ok(Self {
            id: id as FrameId,
            payload: Bytes::copy_from_slice(&data[..length as usize]),
        })
    }

    /// Peek at the id of a frame block without copying the payload
    pub fn peek_id(data: &[u8]) -> Option<FrameId> {
        if data.len() != FRAME_DATAGRAM_SIZE {
            return None;
        }
        let mut header = &data[..8];
        let id = header.get_i64();
        if id < 0 {
            None
        } else {
            Some(id as FrameId)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_size_is_constant() {
        let empty = Frame::new(1, Vec::new()).unwrap();
        let full = Frame::new(2, vec![0xAB; FRAME_PAYLOAD_SIZE]).unwrap();

        assert_eq!(empty.encode().len(), FRAME_DATAGRAM_SIZE);
        assert_eq!(full.encode().len(), FRAME_DATAGRAM_SIZE);
    }

    #[test]
    fn test_header_layout_is_big_endian() {
        let frame = Frame::new(0x0102, b"hello".to_vec()).unwrap();
        let block = frame.encode();

        assert_eq!(&block[..8], &[0, 0, 0, 0, 0, 0, 0x01, 0x02]);
        assert_eq!(&block[8..16], &[0, 0, 0, 0, 0, 0, 0, 5]);
        assert_eq!(&block[16..21], b"hello");
        assert!(block[21..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_decode_ignores_padding() {
        let mut block = Frame::new(7, b"abc".to_vec()).unwrap().encode().to_vec();
        // Garbage past `length` is not part of the frame
        block[100] = 0xFF;

        let frame = Frame::decode(&block).unwrap();
        assert_eq!(frame.id, 7);
        assert_eq!(frame.payload(), b"abc");
    }

    #[test]
    fn test_oversized_payload_rejected() {
        assert!(Frame::new(1, vec![0; FRAME_PAYLOAD_SIZE + 1]).is_err());
    }

    #[test]
    fn test_decode_rejects_bad_blocks() {
        assert!(Frame::decode(&[0u8; 8]).is_err());

        let mut block = Frame::new(1, Vec::new()).unwrap().encode().to_vec();
        block[8..16].copy_from_slice(&4096i64.to_be_bytes());
        assert!(Frame::decode(&block).is_err());
    }

    #[test]
    fn test_peek_id() {
        let block = Frame::new(42, b"x".to_vec()).unwrap().encode();
        assert_eq!(Frame::peek_id(&block), Some(42));
        assert_eq!(Frame::peek_id(&block[..10]), None);
    }
}
