//! Error handlers
//!
//! Logging and status-code mapping for server errors.

use crate::error::types::{ServerError, StorageError, TransferError};
use crate::protocol::responses::{BAD_REQUEST, CONFLICT, INTERNAL_ERROR, NOT_FOUND};
use log::{error, warn};

/// Log a server error at a level matching its severity
pub fn handle_error(err: &ServerError) {
    match err {
        // Client-side mistakes and disconnects are routine
        ServerError::Protocol(_)
        | ServerError::Transfer(TransferError::ShortTransfer { .. })
        | ServerError::Transfer(TransferError::ConnectionClosed)
        | ServerError::Transfer(TransferError::Timeout)
        | ServerError::Transfer(TransferError::Cancelled)
        | ServerError::Storage(StorageError::FileNotFound(_)) => warn!("{}", err),
        _ => error!("Store Server Error: {}", err),
    }
}

/// Convert a storage error to the status code carried on reply lines
pub fn error_to_status_code(err: &StorageError) -> u16 {
    match err {
        StorageError::FileNotFound(_) => NOT_FOUND,
        StorageError::InvalidPath(_) | StorageError::PathTraversal(_) => BAD_REQUEST,
        StorageError::FileAlreadyExists(_) => CONFLICT,
        StorageError::IndexCorrupt(_) | StorageError::IoError(_) => INTERNAL_ERROR,
    }
}
