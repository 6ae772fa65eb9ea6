//! Module `file_ops`
//!
//! Moves payload bytes between a network stream and the storage engine.
//! Chunks are read from the peer with no storage lock held; each chunk is
//! then handed to the storage engine, which takes the stem lock only for
//! the duration of that single write or read.

use log::{info, warn};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{ServerError, TransferError};
use crate::storage::{Download, Storage, Upload};

/// Reads once from `reader`, giving up after `idle_timeout` if one is set.
pub async fn read_with_timeout<R>(
    reader: &mut R,
    buf: &mut [u8],
    idle_timeout: Option<Duration>,
) -> Result<usize, TransferError>
where
    R: AsyncRead + Unpin,
{
    match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, reader.read(buf)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransferError::Timeout),
        },
        None => Ok(reader.read(buf).await?),
    }
}

/// Receives exactly the declared number of upload bytes from `reader`.
///
/// Bytes the reader already buffered past the header line are returned by
/// its first reads and count toward the declared size. Anything the peer
/// sends beyond the declared size is never read.
pub async fn receive_payload<R>(
    reader: &mut R,
    storage: &Storage,
    upload: &mut Upload,
    buffer_size: usize,
    idle_timeout: Option<Duration>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];

    while upload.remaining() > 0 {
        let want = upload.remaining().min(buffer.len() as u64) as usize;
        let n = read_with_timeout(reader, &mut buffer[..want], idle_timeout).await?;
        if n == 0 {
            return Err(TransferError::ShortTransfer {
                expected: upload.declared_size(),
                received: upload.written(),
            }
            .into());
        }
        storage.write_chunk(upload, &mut buffer[..n]).await?;
    }

    Ok(())
}

/// Streams an opened entry to `writer` in `buffer_size` chunks.
///
/// Returns the number of bytes sent.
pub async fn send_payload<W>(
    writer: &mut W,
    storage: &Storage,
    download: &mut Download,
    buffer_size: usize,
) -> Result<u64, ServerError>
where
    W: AsyncWrite + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let n = storage.read_chunk(download, &mut buffer).await?;
        if n == 0 {
            break;
        }
        writer
            .write_all(&buffer[..n])
            .await
            .map_err(TransferError::from)?;
    }
    writer.flush().await.map_err(TransferError::from)?;

    if download.sent() != download.size() {
        warn!(
            "{} changed size during transfer: announced {} bytes, sent {}",
            download.entry().storage_name(),
            download.size(),
            download.sent()
        );
    }

    info!(
        "File download completed successfully: {} ({} bytes)",
        download.entry().storage_name(),
        download.sent()
    );

    Ok(download.sent())
}
