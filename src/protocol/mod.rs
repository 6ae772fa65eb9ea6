//! Store protocol implementation
//!
//! Handles header parsing, command dispatch, and reply formatting.

pub mod commands;
pub mod handlers;
pub mod parser;
pub mod responses;

pub use commands::{Command, parse_command};
pub use handlers::{handle_get, handle_ls, handle_rm, handle_write};
pub use parser::read_header;
