// Common utilities and shared code

pub mod error;
pub mod config;
pub mod types;

pub use error::{Error, Result};
pub use config::{ClientConfig, ServerConfig, TransferConfig};
pub use types::*;
