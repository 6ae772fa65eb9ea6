//! Module `state`
//!
//! Connection states for the one-command store protocol.

use crate::protocol::Command;

/// Where a connection is in its single command exchange.
///
/// Every connection starts in `AwaitCommand`, moves to exactly one command
/// state, and ends in `Closed`.
#[derive(Debug, PartialEq)]
pub enum ConnectionState {
    AwaitCommand,
    WriteBody { path: String, size: u64 },
    GetAwaitReady { path: String, version: Option<u32> },
    RmDone { path: String, version: Option<u32> },
    LsStreaming { filter: Option<String> },
    Closed,
}

impl From<Command> for ConnectionState {
    fn from(command: Command) -> Self {
        match command {
            Command::WRITE { path, size } => ConnectionState::WriteBody { path, size },
            Command::GET { path, version } => ConnectionState::GetAwaitReady { path, version },
            Command::RM { path, version } => ConnectionState::RmDone { path, version },
            Command::LS(filter) => ConnectionState::LsStreaming { filter },
        }
    }
}
