//! RAX Store Server
//!
//! A versioned remote file store spoken over a line-based TCP protocol.

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod remote;
pub mod server;
pub mod storage;
pub mod transfer;
pub mod utils;

pub use config::ServerConfig;
pub use remote::RemoteClient;
pub use server::Server;
