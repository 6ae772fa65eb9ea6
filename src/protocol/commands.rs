//! Module `commands`
//!
//! Parses one header line into a [`Command`].

use crate::error::ProtocolError;

/// A command parsed from the client's header line.
///
/// Paths are carried as received; the storage layer validates them.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Upload `size` raw bytes following the header
    WRITE { path: String, size: u64 },
    /// Download a version, latest when `version` is `None`
    GET { path: String, version: Option<u32> },
    /// Delete one version, a stored name, or every version of a path
    RM { path: String, version: Option<u32> },
    /// List stored names, optionally only those containing the filter
    LS(Option<String>),
}

/// Parses a header line (with or without its line terminator).
///
/// Verbs are case-insensitive. Missing or surplus arguments are malformed.
pub fn parse_command(raw: &str) -> Result<Command, ProtocolError> {
    let line = raw.trim_end_matches(['\r', '\n']);
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err(ProtocolError::MalformedHeader("empty header".into()));
    };
    let args: Vec<&str> = parts.collect();

    match (verb.to_ascii_uppercase().as_str(), args.as_slice()) {
        ("WRITE", [path, size]) => Ok(Command::WRITE {
            path: path.to_string(),
            size: parse_size(size)?,
        }),
        ("GET", [target]) => {
            let (path, version) = split_version(target)?;
            Ok(Command::GET {
                path,
                // Zero or negative means latest
                version: version.filter(|v| *v > 0).map(|v| v as u32),
            })
        }
        ("RM", [target]) => {
            let (path, version) = split_version(target)?;
            match version {
                Some(v) if v <= 0 => Err(ProtocolError::MalformedHeader(format!(
                    "RM needs a positive version: {}",
                    line
                ))),
                v => Ok(Command::RM {
                    path,
                    version: v.map(|v| v as u32),
                }),
            }
        }
        ("LS", []) => Ok(Command::LS(None)),
        ("LS", [filter]) => Ok(Command::LS(Some(filter.to_string()))),
        ("WRITE" | "GET" | "RM" | "LS", _) => {
            Err(ProtocolError::MalformedHeader(line.to_string()))
        }
        _ => Err(ProtocolError::UnknownCommand(verb.to_string())),
    }
}

fn parse_size(raw: &str) -> Result<u64, ProtocolError> {
    match raw.parse::<u64>() {
        Ok(0) => Err(ProtocolError::InvalidSize("size must be positive".into())),
        Ok(size) => Ok(size),
        Err(_) => Err(ProtocolError::InvalidSize(raw.to_string())),
    }
}

/// Splits `path:version`. Without a `:` the version is `None`.
///
/// The returned version is still signed; callers decide what non-positive means.
fn split_version(target: &str) -> Result<(String, Option<i64>), ProtocolError> {
    let Some((path, version)) = target.rsplit_once(':') else {
        return Ok((target.to_string(), None));
    };
    if path.is_empty() {
        return Err(ProtocolError::MalformedHeader(format!(
            "missing path before version: {}",
            target
        )));
    }
    let version: i64 = version.parse().map_err(|_| {
        ProtocolError::MalformedHeader(format!("invalid version in {}", target))
    })?;
    if version > u32::MAX as i64 {
        return Err(ProtocolError::MalformedHeader(format!(
            "version out of range in {}",
            target
        )));
    }
    Ok((path.to_string(), Some(version)))
}
