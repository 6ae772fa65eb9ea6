//! Error types
//!
//! Defines domain-specific error types for each module of the store server.

use std::fmt;
use std::io;

/// Header parsing errors. Every variant closes the connection without a reply.
#[derive(Debug, PartialEq)]
pub enum ProtocolError {
    MalformedHeader(String),
    UnknownCommand(String),
    HeaderTooLong(usize),
    InvalidSize(String),
    PayloadTooLarge { declared: u64, limit: u64 },
    NotUtf8,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedHeader(h) => write!(f, "Malformed header: {}", h),
            ProtocolError::UnknownCommand(c) => write!(f, "Unknown command: {}", c),
            ProtocolError::HeaderTooLong(max) => {
                write!(f, "Header exceeds maximum length of {} bytes", max)
            }
            ProtocolError::InvalidSize(s) => write!(f, "Invalid size: {}", s),
            ProtocolError::PayloadTooLarge { declared, limit } => write!(
                f,
                "Declared size {} bytes exceeds limit of {} bytes",
                declared, limit
            ),
            ProtocolError::NotUtf8 => write!(f, "Header is not valid UTF-8"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Storage module errors
#[derive(Debug)]
pub enum StorageError {
    FileNotFound(String),
    InvalidPath(String),
    PathTraversal(String),
    FileAlreadyExists(String),
    IndexCorrupt(String),
    IoError(io::Error),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::FileNotFound(p) => write!(f, "File not found: {}", p),
            StorageError::InvalidPath(p) => write!(f, "Invalid path: {}", p),
            StorageError::PathTraversal(p) => write!(f, "Path traversal attempt: {}", p),
            StorageError::FileAlreadyExists(p) => write!(f, "File already exists: {}", p),
            StorageError::IndexCorrupt(msg) => write!(f, "Version index corrupt: {}", msg),
            StorageError::IoError(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<io::Error> for StorageError {
    fn from(error: io::Error) -> Self {
        StorageError::IoError(error)
    }
}

/// Payload transfer errors
#[derive(Debug)]
pub enum TransferError {
    ShortTransfer { expected: u64, received: u64 },
    Timeout,
    ConnectionClosed,
    Cancelled,
    IoError(io::Error),
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::ShortTransfer { expected, received } => write!(
                f,
                "Peer closed after {} of {} bytes",
                received, expected
            ),
            TransferError::Timeout => write!(f, "Timed out waiting for peer"),
            TransferError::ConnectionClosed => write!(f, "Connection closed by peer"),
            TransferError::Cancelled => write!(f, "Transfer cancelled by server shutdown"),
            TransferError::IoError(e) => write!(f, "Transfer failed: {}", e),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<io::Error> for TransferError {
    fn from(error: io::Error) -> Self {
        TransferError::IoError(error)
    }
}

/// General server error that encompasses all error types
#[derive(Debug)]
pub enum ServerError {
    Protocol(ProtocolError),
    Storage(StorageError),
    Transfer(TransferError),
    Config(String),
    IoError(io::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::Protocol(e) => write!(f, "Protocol error: {}", e),
            ServerError::Storage(e) => write!(f, "Storage error: {}", e),
            ServerError::Transfer(e) => write!(f, "Transfer error: {}", e),
            ServerError::Config(e) => write!(f, "Configuration error: {}", e),
            ServerError::IoError(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<ProtocolError> for ServerError {
    fn from(error: ProtocolError) -> Self {
        ServerError::Protocol(error)
    }
}

impl From<StorageError> for ServerError {
    fn from(error: StorageError) -> Self {
        ServerError::Storage(error)
    }
}

impl From<TransferError> for ServerError {
    fn from(error: TransferError) -> Self {
        ServerError::Transfer(error)
    }
}

impl From<config::ConfigError> for ServerError {
    fn from(error: config::ConfigError) -> Self {
        ServerError::Config(error.to_string())
    }
}

impl From<io::Error> for ServerError {
    fn from(error: io::Error) -> Self {
        ServerError::IoError(error)
    }
}
