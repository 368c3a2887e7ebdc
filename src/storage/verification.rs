// Transfer digests
//
// Both ends hash the bytes they confirm so a completed transfer can be checked
// against the file on either side.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use crate::common::error::Result;

/// Incremental BLAKE3 over confirmed frame payloads
#[derive(Clone, Default)]
pub struct TransferDigest {
    hasher: blake3::Hasher,
}

impl TransferDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    pub fn finalize_hex(&self) -> String {
        hex::encode(self.hasher.finalize().as_bytes())
    }
}

/// Compute the BLAKE3 hash of a file on disk
pub fn file_digest(path: &Path) -> Result<blake3::Hash> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; 65536];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Hex digest of a file, comparable with `TransferReport::digest`
pub fn file_digest_hex(path: &Path) -> Result<String> {
    file_digest(path).map(|hash| hex::encode(hash.as_bytes()))
}
