// Command dispatcher - runs exactly one command to completion at a time

use std::net::SocketAddr;
use std::path::PathBuf;
use log::{info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::Result;
use crate::common::types::{ListingMode, LISTING_DATAGRAM_CAP};
use crate::protocol::command::Command;
use crate::protocol::control::DeleteStatus;
use crate::storage::{delete_file, list_dir, serialize, serialize_capped};
use crate::transfer::{TransferEngine, TransferReport};
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Executing,
}

/// What a dispatched command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    /// GET: file sent to the client
    Sent(TransferReport),
    /// PUT: file received from the client
    Received(TransferReport),
    Deleted(DeleteStatus),
    Listed { entries: usize, bytes: usize },
    Exit,
    UnknownCommand(String),
}

pub struct Dispatcher<'a, T: Transport> {
    transport: &'a T,
    config: &'a ServerConfig,
    state: DispatchState,
}

impl<'a, T: Transport> Dispatcher<'a, T> {
    pub fn new(transport: &'a T, config: &'a ServerConfig) -> Self {
        Self {
            transport,
            config,
            state: DispatchState::Idle,
        }
    }

    pub fn state(&self) -> DispatchState {
        self.state
    }

    /// Execute `command` for `peer`; always returns to `Idle`
    pub fn dispatch(&mut self, command: Command, peer: SocketAddr) -> Result<CommandOutcome> {
        self.state = DispatchState::Executing;
        info!("{} from {}", command, peer);
        let result = self.execute(command, peer);
        self.state = DispatchState::Idle;
        result
    }

    fn execute(&self, command: Command, peer: SocketAddr) -> Result<CommandOutcome> {
        match command {
            Command::Get(name) => {
                let report = self.engine(peer).send_file(&self.resolve(&name))?;
                Ok(CommandOutcome::Sent(report))
            }
            Command::Put(name) => {
                let report = self.engine(peer).receive_file(&self.resolve(&name))?;
                Ok(CommandOutcome::Received(report))
            }
            Command::Delete(name) => {
                let status = delete_file(&self.resolve(&name));
                self.transport.send_to(&status.encode(), peer)?;
                info!("delete {}: {}", name, status);
                Ok(CommandOutcome::Deleted(status))
            }
            Command::List => self.list(peer),
            Command::Exit => Ok(CommandOutcome::Exit),
            Command::Unknown(verb) => {
                warn!("Unknown command '{}' from {}", verb, peer);
                Ok(CommandOutcome::UnknownCommand(verb))
            }
        }
    }

    fn list(&self, peer: SocketAddr) -> Result<CommandOutcome> {
        let names = list_dir(&self.config.root_dir)?;
        let bytes = match self.config.listing_mode {
            ListingMode::Datagram => {
                let listing = serialize_capped(&names, LISTING_DATAGRAM_CAP);
                self.transport.send_to(&listing, peer)?;
                listing.len()
            }
            ListingMode::Framed => {
                let listing = serialize(&names);
                self.engine(peer).send_bytes(&listing)?;
                listing.len()
            }
        };
        Ok(CommandOutcome::Listed { entries: names.len(), bytes })
    }

    fn engine(&self, peer: SocketAddr) -> TransferEngine<&'a T> {
        TransferEngine::new(self.transport, peer, self.config.transfer.clone())
    }

    fn resolve(&self, name: &str) -> PathBuf {
        self.config.root_dir.join(name)
    }
}
