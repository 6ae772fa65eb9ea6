//! Client connection handling
//!
//! Handles per-connection state, shared session context, and the command lifecycle.

pub mod handler;
pub mod session;
pub mod state;

pub use handler::{handle_client, serve_connection};
pub use session::Session;
pub use state::ConnectionState;
