pub mod client;
pub mod common;
pub mod protocol;
pub mod retransmission;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod transport;
