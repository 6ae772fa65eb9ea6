//! Transfer module for the store server
//!
//! Handles the payload cipher and chunked streaming between sockets and storage.

pub mod cipher;
pub mod file_ops;

// Re-export key types and functions
pub use cipher::ByteCipher;
pub use file_ops::{read_with_timeout, receive_payload, send_payload};
