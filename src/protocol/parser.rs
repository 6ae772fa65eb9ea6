//! Header line reader
//!
//! Reads the single command line that opens every connection, bounded by
//! the configured maximum length.

use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::{ProtocolError, ServerError, TransferError};

/// Reads one `\n`-terminated header line of at most `max_len` bytes.
///
/// Returns `Ok(None)` when the peer closes before sending anything. Bytes
/// after the newline stay buffered in `reader`.
pub async fn read_header<R>(
    reader: &mut R,
    max_len: usize,
    idle_timeout: Option<Duration>,
) -> Result<Option<String>, ServerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let mut bounded = (&mut *reader).take(max_len as u64 + 1);
    let read = bounded.read_until(b'\n', &mut line);

    let n = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, read)
            .await
            .map_err(|_| TransferError::Timeout)?,
        None => read.await,
    }
    .map_err(TransferError::from)?;

    if n == 0 {
        return Ok(None);
    }
    if line.len() > max_len {
        return Err(ProtocolError::HeaderTooLong(max_len).into());
    }
    if line.last() != Some(&b'\n') {
        return Err(ProtocolError::MalformedHeader("unterminated header line".into()).into());
    }

    String::from_utf8(line)
        .map(Some)
        .map_err(|_| ProtocolError::NotUtf8.into())
}
