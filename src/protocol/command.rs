// Textual command messages ("<verb> <filename>")

use crate::common::error::{Error, Result};
use crate::common::types::COMMAND_DATAGRAM_SIZE;

/// A single parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Get(String),
    Put(String),
    Delete(String),
    List,
    Exit,
    /// Verb outside the recognised set, kept so it can be reported
    Unknown(String),
}

impl Command {
    /// Parse one line of user input or one decoded command datagram.
    ///
    /// Oversized input is rejected rather than truncated. Verbs that need a
    /// filename fail with `InvalidArgument` when it is missing.
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        if line.is_empty() {
            return Err(Error::InvalidArgument("empty command".to_string()));
        }
        if line.len() > COMMAND_DATAGRAM_SIZE {
            return Err(Error::InvalidArgument(format!(
                "command is {} bytes, limit is {}",
                line.len(),
                COMMAND_DATAGRAM_SIZE
            )));
        }

        let mut tokens = line.split_whitespace();
        let verb = tokens.next().unwrap_or_default();
        let argument = tokens.next();
        if tokens.next().is_some() {
            return Err(Error::InvalidArgument(format!("too many arguments in '{}'", line)));
        }

        let command = match verb {
            "get" => Command::Get(require_filename(verb, argument)?),
            "put" => Command::Put(require_filename(verb, argument)?),
            "delete" => Command::Delete(require_filename(verb, argument)?),
            "ls" => no_argument(Command::List, verb, argument)?,
            "exit" => no_argument(Command::Exit, verb, argument)?,
            other => Command::Unknown(other.to_string()),
        };
        Ok(command)
    }

    pub fn verb(&self) -> &str {
        match self {
            Command::Get(_) => "get",
            Command::Put(_) => "put",
            Command::Delete(_) => "delete",
            Command::List => "ls",
            Command::Exit => "exit",
            Command::Unknown(verb) => verb.as_str(),
        }
    }

    pub fn filename(&self) -> Option<&str> {
        match self {
            Command::Get(name) | Command::Put(name) | Command::Delete(name) => Some(name),
            _ => None,
        }
    }

    /// Encode into the fixed, NUL padded command block
    pub fn encode(&self) -> Result<[u8; COMMAND_DATAGRAM_SIZE]> {
        let text = match self.filename() {
            Some(name) => format!("{} {}", self.verb(), name),
            None => self.verb().to_string(),
        };
        if text.len() > COMMAND_DATAGRAM_SIZE {
            return Err(Error::InvalidArgument(format!(
                "command '{}' does not fit in {} bytes",
                text, COMMAND_DATAGRAM_SIZE
            )));
        }

        let mut block = [0u8; COMMAND_DATAGRAM_SIZE];
        block[..text.len()].copy_from_slice(text.as_bytes());
        Ok(block)
    }

    /// Decode a command block received from the wire
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() != COMMAND_DATAGRAM_SIZE {
            return Err(Error::Protocol(format!(
                "Command datagram is {} bytes, expected {}",
                data.len(),
                COMMAND_DATAGRAM_SIZE
            )));
        }
        let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
        let text = std::str::from_utf8(&data[..end])
            .map_err(|_| Error::Protocol("Command is not valid text".to_string()))?;
        Self::parse(text)
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.filename() {
            Some(name) => write!(f, "{} {}", self.verb(), name),
            None => write!(f, "{}", self.verb()),
        }
    }
}

fn require_filename(verb: &str, argument: Option<&str>) -> Result<String> {
    let name = argument
        .ok_or_else(|| Error::InvalidArgument(format!("'{}' requires a file name", verb)))?;
    validate_filename(name)?;
    Ok(name.to_string())
}

fn no_argument(command: Command, verb: &str, argument: Option<&str>) -> Result<Command> {
    match argument {
        Some(extra) => Err(Error::InvalidArgument(format!(
            "'{}' takes no argument, got '{}'",
            verb, extra
        ))),
        None => Ok(command),
    }
}

/// Filenames name an entry directly inside the working directory
pub fn validate_filename(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." {
        return Err(Error::InvalidArgument(format!("invalid file name '{}'", name)));
    }
    if !name.bytes().all(|b| b.is_ascii_graphic() && b != b'/' && b != b'\\') {
        return Err(Error::InvalidArgument(format!(
            "file name '{}' must be plain ASCII without path separators",
            name
        )));
    }
    Ok(())
}
