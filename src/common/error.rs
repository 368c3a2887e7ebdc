// Error types and error handling

use std::io;
use std::fmt;
use crate::common::types::TransferPhase;

#[derive(Debug)]
pub enum Error {
    /// Socket-level failure (bind, send, receive). Fatal.
    Channel(io::Error),
    /// Local filesystem failure
    Io(io::Error),
    Timeout,
    RetriesExhausted { phase: TransferPhase, attempts: u32 },
    /// The receiver turned the transfer down (it cannot store the data)
    Refused(String),
    FileNotFound(String),
    PermissionDenied(String),
    InvalidArgument(String),
    UnknownCommand(String),
    Protocol(String),
    Config(String),
}

impl Error {
    /// Only channel failures abort the process; everything else is reported
    /// and the session continues.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Channel(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Channel(e) => write!(f, "Channel error: {}", e),
            Error::Io(e) => write!(f, "IO error: {}", e),
            Error::Timeout => write!(f, "Timed out waiting for peer"),
            Error::RetriesExhausted { phase, attempts } => {
                write!(f, "Transfer aborted in {} phase after {} retransmissions", phase, attempts)
            },
            Error::Refused(e) => write!(f, "Transfer refused: {}", e),
            Error::FileNotFound(path) => write!(f, "File not found: {}", path),
            Error::PermissionDenied(path) => write!(f, "Permission denied: {}", path),
            Error::InvalidArgument(e) => write!(f, "Invalid argument: {}", e),
            Error::UnknownCommand(verb) => write!(f, "Unknown command: {}", verb),
            Error::Protocol(e) => write!(f, "Protocol error: {}", e),
            Error::Config(e) => write!(f, "Configuration error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Channel(e) | Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::Io(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_channel_errors_are_fatal() {
        let channel = Error::Channel(io::Error::new(io::ErrorKind::AddrInUse, "bind"));
        assert!(channel.is_fatal());
        assert!(!Error::Timeout.is_fatal());
        assert!(!Error::from(io::Error::new(io::ErrorKind::NotFound, "x")).is_fatal());
        assert!(!Error::RetriesExhausted { phase: TransferPhase::Data, attempts: 200 }.is_fatal());
    }

    #[test]
    fn test_display() {
        let e = Error::RetriesExhausted { phase: TransferPhase::Negotiation, attempts: 20 };
        assert_eq!(e.to_string(), "Transfer aborted in negotiation phase after 20 retransmissions");
    }
}
