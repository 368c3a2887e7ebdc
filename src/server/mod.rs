// Server module - single-session command loop

mod dispatcher;

pub use dispatcher::{CommandOutcome, DispatchState, Dispatcher};

use std::net::SocketAddr;
use log::{debug, error, info, warn};
use crate::common::config::ServerConfig;
use crate::common::error::Result;
use crate::common::types::{FrameId, COMMAND_DATAGRAM_SIZE, FRAME_DATAGRAM_SIZE, MAX_DATAGRAM_SIZE};
use crate::protocol::command::Command;
use crate::protocol::control::encode_ack;
use crate::protocol::frame::Frame;
use crate::transport::{Transport, UdpTransport};

/// Whether the loop keeps going after one datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeStep {
    Continue,
    Exit,
}

/// File server answering one command at a time
pub struct Server<T: Transport = UdpTransport> {
    transport: T,
    config: ServerConfig,
    /// Final frame of the last completed upload and who sent it
    settled: Option<(SocketAddr, FrameId)>,
}

impl Server<UdpTransport> {
    /// Bind the configured address. Bind failures are fatal channel errors.
    pub fn bind(config: ServerConfig) -> Result<Self> {
        config.transfer.validate()?;
        let transport = UdpTransport::bind(config.bind_addr)?;
        info!("Server listening on {}", transport.local_addr()?);
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Server<T> {
    pub fn with_transport(transport: T, config: ServerConfig) -> Self {
        Self {
            transport,
            config,
            settled: None,
        }
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Serve until a client sends `exit`. Only channel errors end the loop
    /// early.
    pub fn run(&mut self) -> Result<()> {
        info!("Serving files from {:?}", self.config.root_dir);
        loop {
            if self.serve_one()? == ServeStep::Exit {
                info!("Exit requested, shutting down");
                return Ok(());
            }
        }
    }

    /// Block for the next datagram and handle it
    pub fn serve_one(&mut self) -> Result<ServeStep> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        debug!("Waiting for a command");
        let (len, peer) = self.transport.recv_blocking(&mut buf)?;

        match len {
            COMMAND_DATAGRAM_SIZE => {}
            FRAME_DATAGRAM_SIZE => {
                // Only the final frame of a finished upload is answered: its
                // sender may have lost our last ack. Frames of an aborted
                // upload stay unanswered so the uploader fails too.
                match Frame::peek_id(&buf[..len]) {
                    Some(id) if self.settled == Some((peer, id)) => {
                        debug!("Re-acknowledging final frame {} from {}", id, peer);
                        self.transport.send_to(&encode_ack(id), peer)?;
                    }
                    id => debug!("Ignoring frame {:?} from {} while idle", id, peer),
                }
                return Ok(ServeStep::Continue);
            }
            _ => {
                debug!("Ignoring {} byte datagram from {} while idle", len, peer);
                return Ok(ServeStep::Continue);
            }
        }

        let command = match Command::decode(&buf[..len]) {
            Ok(command) => command,
            Err(e) => {
                warn!("Rejected command from {}: {}", peer, e);
                return Ok(ServeStep::Continue);
            }
        };

        // A new command means the previous uploader has moved on
        self.settled = None;
        let mut dispatcher = Dispatcher::new(&self.transport, &self.config);
        match dispatcher.dispatch(command, peer) {
            Ok(CommandOutcome::Exit) => Ok(ServeStep::Exit),
            Ok(CommandOutcome::Received(report)) => {
                debug!("Upload finished: {:?}", report);
                self.settled = report.final_frame().map(|id| (peer, id));
                Ok(ServeStep::Continue)
            }
            Ok(outcome) => {
                debug!("Command finished: {:?}", outcome);
                Ok(ServeStep::Continue)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                error!("Command from {} failed: {}", peer, e);
                Ok(ServeStep::Continue)
            }
        }
    }
}
