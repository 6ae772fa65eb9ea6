//! Store response handling
//!
//! Defines reply codes and the lines the server writes back.

/// Reply codes carried on RM replies
pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const NOT_FOUND: u16 = 404;
pub const CONFLICT: u16 = 409;
pub const INTERNAL_ERROR: u16 = 500;

/// Terminates an LS listing
pub const LIST_END: &str = "__END__";

/// Conventional bytes a client sends to start a GET stream
pub const READY: &str = "READY\n";

/// Format a coded reply line
pub fn format_response(code: u16, message: &str) -> String {
    format!("{} {}\n", code, message)
}

/// The size announcement that precedes a GET payload. 0 means not found.
pub fn size_line(size: u64) -> String {
    format!("SIZE {}\n", size)
}

/// Parses a `SIZE n` line as sent by [`size_line`]
pub fn parse_size_line(line: &str) -> Option<u64> {
    line.trim_end_matches(['\r', '\n'])
        .strip_prefix("SIZE ")?
        .trim()
        .parse()
        .ok()
}

pub fn delete_success() -> String {
    format_response(OK, "File deleted successfully.")
}

pub fn delete_failure(code: u16, reason: &str) -> String {
    format_response(code, &format!("Failed to delete file: {}", reason))
}

pub fn list_line(name: &str) -> String {
    format!("{}\n", name)
}
