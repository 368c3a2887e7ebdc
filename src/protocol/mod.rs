// Protocol module - wire formats for commands, frames and control datagrams

pub mod command;
pub mod control;
pub mod frame;

pub use command::Command;
pub use control::{DeleteStatus, FrameCount};
pub use frame::Frame;
