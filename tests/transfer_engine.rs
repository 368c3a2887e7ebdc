// Transfer engine tests over the in-memory lossy link

use std::fs;
use std::net::SocketAddr;
use std::thread;
use std::time::Duration;
use udpft::common::config::TransferConfig;
use udpft::common::error::Error;
use udpft::common::types::{TransferPhase, FRAME_PAYLOAD_SIZE};
use udpft::protocol::{Frame, FrameCount};
use udpft::protocol::control::encode_ack;
use udpft::transfer::{TransferEngine, TransferOutcome, TransferReport};
use udpft::transport::{Fate, MemoryTransport, Transport};

fn link() -> (MemoryTransport, MemoryTransport) {
    let sender: SocketAddr = "127.0.0.1:4950".parse().unwrap();
    let receiver: SocketAddr = "127.0.0.1:5000".parse().unwrap();
    MemoryTransport::pair(sender, receiver)
}

fn config() -> TransferConfig {
    TransferConfig::default()
        .with_ack_timeout(Duration::from_millis(50))
        .unwrap()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 % 251) as u8).collect()
}

/// Run a full transfer of `data`, receiver on its own thread
fn transfer(
    data: &[u8],
    sender_side: MemoryTransport,
    receiver_side: MemoryTransport,
) -> (TransferReport, TransferReport, Option<Vec<u8>>) {
    let receiving = thread::spawn(move || {
        let peer = receiver_side.remote_addr();
        let config = config().with_linger(Duration::from_millis(300));
        let mut engine = TransferEngine::new(receiver_side, peer, config);
        engine.receive_bytes().unwrap()
    });

    let peer = sender_side.remote_addr();
    let mut engine = TransferEngine::new(sender_side, peer, config());
    let sent = engine.send_bytes(data).unwrap();
    let (received, bytes) = receiving.join().unwrap();
    (sent, received, bytes)
}

#[test]
fn test_round_trip_sizes() {
    let cases = [
        (0, 0),
        (1, 1),
        (FRAME_PAYLOAD_SIZE - 1, 1),
        (FRAME_PAYLOAD_SIZE, 1),
        (FRAME_PAYLOAD_SIZE + 1, 2),
        (2 * FRAME_PAYLOAD_SIZE, 2),
    ];

    for (size, frames) in cases {
        let data = pattern(size);
        let (sender_side, receiver_side) = link();
        let (sent, received, bytes) = transfer(&data, sender_side, receiver_side);

        assert_eq!(bytes.as_deref(), Some(&data[..]), "size {}", size);
        assert_eq!(sent.frames, frames);
        assert_eq!(received.frames, frames);
        assert_eq!(received.bytes, size as u64);
        assert_eq!(sent.digest, received.digest);

        let expected = if size == 0 { TransferOutcome::Empty } else { TransferOutcome::Completed };
        assert_eq!(sent.outcome, expected);
        assert_eq!(received.outcome, expected);
    }
}

#[test]
fn test_lossy_link_delivers_exact_bytes() {
    let data = pattern(5 * FRAME_PAYLOAD_SIZE + 7);
    let (sender_side, receiver_side) = link();
    let sender_side = sender_side.with_faults(|seq, _| if seq % 3 == 1 { Fate::Drop } else { Fate::Deliver });
    let receiver_side = receiver_side.with_faults(|seq, _| if seq % 4 == 2 { Fate::Drop } else { Fate::Deliver });

    let (sent, received, bytes) = transfer(&data, sender_side, receiver_side);

    assert_eq!(bytes.unwrap(), data);
    assert_eq!(sent.frames, 6);
    assert!(sent.retransmissions > 0);
    assert_eq!(sent.digest, received.digest);
}

#[test]
fn test_lost_count_ack_is_repeated() {
    let data = pattern(3000);
    let (sender_side, receiver_side) = link();
    // The receiver's first datagram is its count acknowledgment
    let receiver_side = receiver_side.with_faults(|seq, _| if seq == 0 { Fate::Drop } else { Fate::Deliver });

    let (sent, _, bytes) = transfer(&data, sender_side, receiver_side);

    assert_eq!(bytes.unwrap(), data);
    assert!(sent.retransmissions >= 1);
}

#[test]
fn test_duplicate_frame_is_written_once() {
    let data = pattern(4 * FRAME_PAYLOAD_SIZE);
    let (sender_side, receiver_side) = link();
    let mut duplicated = false;
    let sender_side = sender_side.with_faults(move |_, datagram| {
        if !duplicated && Frame::peek_id(datagram) == Some(1) {
            duplicated = true;
            Fate::Duplicate
        } else {
            Fate::Deliver
        }
    });

    let (sent, received, bytes) = transfer(&data, sender_side, receiver_side);

    // The second copy of frame 1 is acknowledged again; that stale ack must
    // not move the sender forward or repeat bytes on the receiver
    assert_eq!(bytes.unwrap(), data);
    assert_eq!(received.bytes, data.len() as u64);
    assert!(sent.retransmissions >= 1);
}

#[test]
fn test_stale_ack_does_not_advance_sender() {
    let (sender_side, receiver_side) = link();
    let receiver_addr = receiver_side.local_addr().unwrap();
    let sender_addr = sender_side.local_addr().unwrap();

    // Count ack, then an ack for a frame that was never sent
    receiver_side.send_to(&FrameCount::Frames(1).encode(), sender_addr).unwrap();
    receiver_side.send_to(&encode_ack(0), sender_addr).unwrap();
    receiver_side.send_to(&encode_ack(1), sender_addr).unwrap();

    let mut engine = TransferEngine::new(sender_side, receiver_addr, config());
    let report = engine.send_bytes(b"one frame").unwrap();

    assert_eq!(report.frames, 1);
    // The stale ack cost one retransmission
    assert_eq!(report.retransmissions, 1);
}

#[test]
fn test_data_retry_ceiling_is_exact() {
    let (sender_side, receiver_side) = link();
    let receiver_addr = receiver_side.local_addr().unwrap();
    receiver_side
        .send_to(&FrameCount::Frames(2).encode(), sender_side.local_addr().unwrap())
        .unwrap();

    let config = config().with_retries(20, 5).unwrap();
    let mut engine = TransferEngine::new(sender_side, receiver_addr, config);
    let result = engine.send_bytes(&pattern(FRAME_PAYLOAD_SIZE + 1));

    assert!(matches!(
        result,
        Err(Error::RetriesExhausted { phase: TransferPhase::Data, attempts: 5 })
    ));
    // One count, then frame 1 sent once plus five retransmissions, frame 2 never
    let sender_side = engine.into_transport();
    assert_eq!(sender_side.sent_count(), 7);

    let mut buf = vec![0u8; 4096];
    let mut frames = 0;
    while let Some((len, _)) = receiver_side.recv_timeout(&mut buf, Duration::from_millis(10)).unwrap() {
        if let Ok(frame) = Frame::decode(&buf[..len]) {
            assert_eq!(frame.id, 1);
            frames += 1;
        }
    }
    assert_eq!(frames, 6);
}

#[test]
fn test_receiver_gives_up_without_count() {
    let (sender_side, receiver_side) = link();
    let config = config().with_retries(3, 3).unwrap();
    let mut engine = TransferEngine::new(receiver_side, sender_side.local_addr().unwrap(), config);

    assert!(matches!(
        engine.receive_bytes(),
        Err(Error::RetriesExhausted { phase: TransferPhase::Negotiation, attempts: 3 })
    ));
}

#[test]
fn test_absent_source_creates_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("copy.bin");
    let (sender_side, receiver_side) = link();

    let receiving = {
        let target = target.clone();
        thread::spawn(move || {
            let peer = receiver_side.remote_addr();
            TransferEngine::new(receiver_side, peer, config()).receive_file(&target).unwrap()
        })
    };

    let peer = sender_side.remote_addr();
    let mut engine = TransferEngine::new(sender_side, peer, config());
    let sent = engine.send_file(&dir.path().join("missing.bin")).unwrap();
    let received = receiving.join().unwrap();

    assert_eq!(sent.outcome, TransferOutcome::Absent);
    assert_eq!(received.outcome, TransferOutcome::Absent);
    assert!(received.digest.is_none());
    assert!(!target.exists());
    assert!(!dir.path().join("copy.bin.part").exists());
}

#[test]
fn test_file_round_trip_through_part_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("source.bin");
    let target = dir.path().join("target.bin");
    fs::write(&source, pattern(3 * FRAME_PAYLOAD_SIZE + 100)).unwrap();
    let (sender_side, receiver_side) = link();

    let receiving = {
        let target = target.clone();
        thread::spawn(move || {
            let peer = receiver_side.remote_addr();
            TransferEngine::new(receiver_side, peer, config()).receive_file(&target).unwrap()
        })
    };

    let peer = sender_side.remote_addr();
    let sent = TransferEngine::new(sender_side, peer, config()).send_file(&source).unwrap();
    let received = receiving.join().unwrap();

    assert_eq!(fs::read(&target).unwrap(), fs::read(&source).unwrap());
    assert_eq!(sent.digest.as_deref(), Some(udpft::storage::file_digest_hex(&source).unwrap().as_str()));
    assert_eq!(sent.digest, received.digest);
    assert!(!dir.path().join("target.bin.part").exists());
}

/// Feed the receiver a count of 3 and only the first frame
fn abandoned_upload(keep_partial: bool) -> (tempfile::TempDir, Result<TransferReport, Error>) {
    let dir = tempfile::tempdir().unwrap();
    let (sender_side, receiver_side) = link();
    let receiver_addr = receiver_side.local_addr().unwrap();

    sender_side.send_to(&FrameCount::Frames(3).encode(), receiver_addr).unwrap();
    let first = Frame::new(1, vec![7u8; FRAME_PAYLOAD_SIZE]).unwrap();
    sender_side.send_to(&first.encode(), receiver_addr).unwrap();

    let config = config().with_retries(3, 3).unwrap().with_keep_partial(keep_partial);
    let mut engine = TransferEngine::new(receiver_side, sender_side.local_addr().unwrap(), config);
    let result = engine.receive_file(&dir.path().join("upload.bin"));
    (dir, result)
}

#[test]
fn test_aborted_receive_removes_part_file() {
    let (dir, result) = abandoned_upload(false);

    assert!(matches!(
        result,
        Err(Error::RetriesExhausted { phase: TransferPhase::Data, attempts: 3 })
    ));
    assert!(!dir.path().join("upload.bin").exists());
    assert!(!dir.path().join("upload.bin.part").exists());
}

#[test]
fn test_aborted_receive_can_keep_part_file() {
    let (dir, result) = abandoned_upload(true);

    assert!(result.is_err());
    assert!(!dir.path().join("upload.bin").exists());
    assert_eq!(fs::read(dir.path().join("upload.bin.part")).unwrap().len(), FRAME_PAYLOAD_SIZE);
}

// A count of one frame and the ack of frame 1 are the same 8 bytes. If the
// count arrives twice and frame 1 is lost, the receiver's second count ack
// completes the sender while the receiver never sees any data. The wire
// format offers nothing to tell the two apart.
#[test]
fn test_repeated_count_ack_completes_single_frame_sender() {
    let (sender_side, receiver_side) = link();
    let mut dropped = false;
    let sender_side = sender_side.with_faults(move |seq, datagram| {
        if seq == 0 {
            Fate::Duplicate
        } else if !dropped && Frame::peek_id(datagram) == Some(1) {
            dropped = true;
            Fate::Drop
        } else {
            Fate::Deliver
        }
    });

    let receiving = thread::spawn(move || {
        let peer = receiver_side.remote_addr();
        let config = config().with_retries(20, 5).unwrap();
        TransferEngine::new(receiver_side, peer, config).receive_bytes()
    });

    let peer = sender_side.remote_addr();
    let sent = TransferEngine::new(sender_side, peer, config()).send_bytes(b"one frame").unwrap();

    assert_eq!(sent.outcome, TransferOutcome::Completed);
    assert_eq!(sent.frames, 1);
    assert!(matches!(
        receiving.join().unwrap(),
        Err(Error::RetriesExhausted { phase: TransferPhase::Data, attempts: 5 })
    ));
}
