//! Server core functionality
//!
//! This module contains the listener, the accept loop, and shutdown signalling.

pub mod core;
pub mod shutdown;

pub use core::Server;
pub use shutdown::Shutdown;
