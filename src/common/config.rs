// Configuration types and parsing

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Serialize, Deserialize};
use crate::common::error::{Error, Result};
use crate::common::types::*;
use crate::retransmission::RetryPolicy;

/// Timing and retry knobs shared by both ends of a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Per-wait acknowledgment timeout
    pub ack_timeout_ms: u64,
    /// Retransmissions of the frame count before giving up
    pub negotiation_retries: u32,
    /// Retransmissions of a single data frame before giving up
    pub data_retries: u32,
    /// How long a receiver keeps re-acknowledging the final frame (0 = off)
    pub linger_ms: u64,
    /// Keep `<name>.part` after an aborted download instead of deleting it
    pub keep_partial: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            ack_timeout_ms: DEFAULT_ACK_TIMEOUT.as_millis() as u64,
            negotiation_retries: DEFAULT_NEGOTIATION_RETRIES,
            data_retries: DEFAULT_DATA_RETRIES,
            linger_ms: 0,
            keep_partial: false,
        }
    }
}

impl TransferConfig {
    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn linger(&self) -> Option<Duration> {
        if self.linger_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.linger_ms))
        }
    }

    pub fn negotiation_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.ack_timeout(), self.negotiation_retries)
    }

    pub fn data_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.ack_timeout(), self.data_retries)
    }

    pub fn with_ack_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::Config("Ack timeout must be greater than zero".to_string()));
        }
        self.ack_timeout_ms = timeout.as_millis().max(1) as u64;
        Ok(self)
    }

    pub fn with_retries(mut self, negotiation: u32, data: u32) -> Result<Self> {
        if negotiation == 0 || data == 0 {
            return Err(Error::Config("Retry ceilings must be at least 1".to_string()));
        }
        self.negotiation_retries = negotiation;
        self.data_retries = data;
        Ok(self)
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger_ms = linger.as_millis() as u64;
        self
    }

    pub fn with_keep_partial(mut self, keep: bool) -> Self {
        self.keep_partial = keep;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ack_timeout_ms == 0 {
            return Err(Error::Config("ack_timeout_ms must be greater than zero".to_string()));
        }
        if self.negotiation_retries == 0 || self.data_retries == 0 {
            return Err(Error::Config("Retry ceilings must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    pub bind_addr: SocketAddr,
    pub local_dir: PathBuf,
    pub listing_mode: ListingMode,
    pub transfer: TransferConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 0)),
            local_dir: PathBuf::from("."),
            listing_mode: ListingMode::default(),
            // The client dallies after a download so a lost final ack can be repeated
            transfer: TransferConfig {
                linger_ms: DEFAULT_ACK_TIMEOUT.as_millis() as u64,
                ..TransferConfig::default()
            },
        }
    }
}

impl ClientConfig {
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Default::default()
        }
    }

    /// Load a JSON config file; missing fields fall back to defaults
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&json)?;
        config.transfer.validate()?;
        Ok(config)
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    pub fn with_local_dir(mut self, dir: PathBuf) -> Self {
        self.local_dir = dir;
        self
    }

    pub fn with_listing_mode(mut self, mode: ListingMode) -> Self {
        self.listing_mode = mode;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub root_dir: PathBuf,
    pub listing_mode: ListingMode,
    pub transfer: TransferConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            root_dir: PathBuf::from("."),
            listing_mode: ListingMode::default(),
            transfer: TransferConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read {:?}: {}", path, e)))?;
        let config: Self = serde_json::from_str(&json)?;
        config.transfer.validate()?;
        Ok(config)
    }

    pub fn with_root_dir(mut self, dir: PathBuf) -> Self {
        self.root_dir = dir;
        self
    }

    pub fn with_listing_mode(mut self, mode: ListingMode) -> Self {
        self.listing_mode = mode;
        self
    }

    pub fn with_transfer(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }
}
