// Client module - issues one command at a time to a single server

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use crate::common::config::ClientConfig;
use crate::common::error::{Error, Result};
use crate::common::types::{FrameId, ListingMode};
use crate::protocol::command::{validate_filename, Command};
use crate::protocol::control::DeleteStatus;
use crate::storage::listing;
use crate::transfer::{PeerLink, TransferEngine, TransferOutcome, TransferReport};
use crate::transport::{Transport, UdpTransport};

const PROGRESS_TEMPLATE: &str =
    "{spinner} {msg} [{bar:40.cyan/blue}] {pos}/{len} frames ({elapsed})";

/// Result of one client command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// GET finished. `path` is `None` when the server had no such file.
    Downloaded {
        path: Option<PathBuf>,
        report: TransferReport,
    },
    Uploaded(TransferReport),
    Deleted(DeleteStatus),
    Listing(Vec<String>),
    Exit,
}

pub struct Client<T: Transport = UdpTransport> {
    transport: T,
    config: ClientConfig,
    show_progress: bool,
    /// Final frame of the last download, which the server may still resend
    settled: Option<FrameId>,
}

impl Client<UdpTransport> {
    pub fn connect(config: ClientConfig) -> Result<Self> {
        config.transfer.validate()?;
        let transport = UdpTransport::bind(config.bind_addr)?;
        debug!(
            "Client bound to {}, server is {}",
            transport.local_addr()?,
            config.server_addr
        );
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Client<T> {
    pub fn with_transport(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            config,
            show_progress: false,
            settled: None,
        }
    }

    /// Draw a progress bar on stderr during transfers
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    pub fn server_addr(&self) -> SocketAddr {
        self.config.server_addr
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run one parsed command. Unknown verbs never reach the server.
    pub fn execute(&mut self, command: Command) -> Result<Reply> {
        match command {
            Command::Get(name) => self.get(&name),
            Command::Put(name) => self.put(&name),
            Command::Delete(name) => self.delete(&name).map(Reply::Deleted),
            Command::List => self.list().map(Reply::Listing),
            Command::Exit => self.exit().map(|_| Reply::Exit),
            Command::Unknown(verb) => Err(Error::UnknownCommand(verb)),
        }
    }

    /// Download `name` into the local directory
    pub fn get(&mut self, name: &str) -> Result<Reply> {
        validate_filename(name)?;
        self.send_command(&Command::Get(name.to_string()))?;

        let target = self.config.local_dir.join(name);
        let result = self.engine(name).receive_file(&target);
        let report = self.settle(result)?;
        let path = match report.outcome {
            TransferOutcome::Absent => {
                info!("Server has no file named {}", name);
                None
            }
            _ => Some(target),
        };
        Ok(Reply::Downloaded { path, report })
    }

    /// Upload `name` from the local directory.
    ///
    /// A missing local file is reported without contacting the server.
    pub fn put(&mut self, name: &str) -> Result<Reply> {
        validate_filename(name)?;
        let source = self.config.local_dir.join(name);
        ensure_regular_file(&source)?;

        self.send_command(&Command::Put(name.to_string()))?;
        let result = self.engine(name).send_file(&source);
        let report = self.settle(result)?;
        Ok(Reply::Uploaded(report))
    }

    pub fn delete(&mut self, name: &str) -> Result<DeleteStatus> {
        validate_filename(name)?;
        self.send_command(&Command::Delete(name.to_string()))?;

        let reply = self.await_reply();
        self.settled = None;
        let status = DeleteStatus::decode(&reply?)?;
        info!("delete {}: {}", name, status);
        Ok(status)
    }

    pub fn list(&mut self) -> Result<Vec<String>> {
        self.send_command(&Command::List)?;

        match self.config.listing_mode {
            ListingMode::Datagram => {
                let reply = self.await_reply();
                self.settled = None;
                Ok(listing::parse(&reply?))
            }
            ListingMode::Framed => {
                let result = self.engine("ls").receive_bytes();
                self.settled = result.as_ref().ok().and_then(|(report, _)| report.final_frame());
                let (_, data) = result?;
                Ok(data.map(|bytes| listing::parse(&bytes)).unwrap_or_default())
            }
        }
    }

    /// Ask the server to shut down. Nothing comes back.
    pub fn exit(&mut self) -> Result<()> {
        self.send_command(&Command::Exit)
    }

    fn send_command(&self, command: &Command) -> Result<()> {
        let datagram = command.encode()?;
        debug!("Sending '{}' to {}", command, self.config.server_addr);
        self.transport.send_to(&datagram, self.config.server_addr)
    }

    /// Single datagram reply (delete status, capped listing)
    fn await_reply(&self) -> Result<Vec<u8>> {
        let mut link =
            PeerLink::new(&self.transport, self.config.server_addr).with_settled(self.settled);
        match link.wait_reply(self.config.transfer.ack_timeout())? {
            Some(reply) => Ok(reply),
            None => {
                warn!("No reply from {}", self.config.server_addr);
                Err(Error::Timeout)
            }
        }
    }

    fn engine(&self, label: &str) -> TransferEngine<&T> {
        TransferEngine::new(
            &self.transport,
            self.config.server_addr,
            self.config.transfer.clone(),
        )
        .with_settled(self.settled)
        .with_progress(self.progress_bar(label))
    }

    /// Remember what the server may still resend after `result`
    fn settle(&mut self, result: Result<TransferReport>) -> Result<TransferReport> {
        self.settled = result.as_ref().ok().and_then(TransferReport::final_frame);
        result
    }

    fn progress_bar(&self, label: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(0).with_message(label.to_string());
        match ProgressStyle::with_template(PROGRESS_TEMPLATE) {
            Ok(style) => bar.with_style(style.progress_chars("=> ")),
            Err(_) => bar,
        }
    }
}

fn ensure_regular_file(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => Ok(()),
        Ok(_) => Err(Error::FileNotFound(path.display().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            Err(Error::PermissionDenied(path.display().to_string()))
        }
        Err(_) => Err(Error::FileNotFound(path.display().to_string())),
    }
}
