//! Command handlers module for the store server.
//!
//! One handler per verb. Each runs to completion for a single connection;
//! the caller closes the connection afterwards.

use log::{info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::client::Session;
use crate::error::handlers::error_to_status_code;
use crate::error::{ProtocolError, ServerError, TransferError};
use crate::protocol::responses;
use crate::server::Shutdown;
use crate::transfer::{read_with_timeout, receive_payload, send_payload};

/// Receives an upload and commits it as the next version of `path`.
///
/// Nothing is written back to the client in any outcome. An upload cut
/// short by EOF, timeout or shutdown is abandoned, keeping its `.part` file.
pub async fn handle_write<R>(
    reader: &mut R,
    session: &Session,
    shutdown: &mut Shutdown,
    path: &str,
    size: u64,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
{
    let limit = session.max_file_size().await;
    if size > limit {
        return Err(ProtocolError::PayloadTooLarge {
            declared: size,
            limit,
        }
        .into());
    }

    let storage = &session.storage;
    let logical = storage.parse_path(path)?;
    let mut upload = storage.begin_upload(&logical, size).await?;

    let received = shutdown
        .run_until(receive_payload(
            reader,
            storage,
            &mut upload,
            session.buffer_size,
            session.idle_timeout,
        ))
        .await;

    match received {
        Ok(()) => {
            let entry = storage.commit_upload(upload).await?;
            info!(
                "File upload completed successfully: {} ({} bytes)",
                entry.storage_name(),
                size
            );
            Ok(())
        }
        Err(e) => {
            storage.abandon_upload(upload).await;
            Err(e)
        }
    }
}

/// Announces the entry's size, waits for the client's ready signal, then streams it.
///
/// Anything that prevents the download is reported as `SIZE 0`.
pub async fn handle_get<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &Session,
    path: &str,
    version: Option<u32>,
) -> Result<(), ServerError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let storage = &session.storage;
    let opened = match storage.parse_path(path) {
        Ok(logical) => storage.open_for_read(&logical, version).await,
        Err(e) => Err(e),
    };

    let mut download = match opened {
        Ok(download) if download.size() > 0 => download,
        Ok(download) => {
            warn!("{} is empty on disk", download.entry().storage_name());
            send_line(writer, &responses::size_line(0)).await?;
            return Ok(());
        }
        Err(e) => {
            send_line(writer, &responses::size_line(0)).await?;
            return Err(e.into());
        }
    };

    send_line(writer, &responses::size_line(download.size())).await?;

    let mut ready = [0u8; 64];
    let n = read_with_timeout(reader, &mut ready, session.idle_timeout).await?;
    if n == 0 {
        return Err(TransferError::ConnectionClosed.into());
    }

    send_payload(writer, storage, &mut download, session.buffer_size).await?;
    Ok(())
}

/// Deletes the addressed entries and replies with one status line.
pub async fn handle_rm<W>(
    writer: &mut W,
    session: &Session,
    path: &str,
    version: Option<u32>,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    match session.storage.delete(path, version).await {
        Ok(removed) => {
            info!("RM {} removed {} entries", path, removed.len());
            send_line(writer, &responses::delete_success()).await
        }
        Err(e) => {
            let reply = responses::delete_failure(error_to_status_code(&e), &e.to_string());
            send_line(writer, &reply).await?;
            Err(e.into())
        }
    }
}

/// Streams matching stored names, then the end marker.
pub async fn handle_ls<W>(
    writer: &mut W,
    session: &Session,
    filter: Option<&str>,
) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0usize;
    for name in session.storage.list(filter).await {
        writer
            .write_all(responses::list_line(&name).as_bytes())
            .await
            .map_err(TransferError::from)?;
        count += 1;
    }
    send_line(writer, &responses::list_line(responses::LIST_END)).await?;

    info!("Listed {} entries", count);
    Ok(())
}

async fn send_line<W>(writer: &mut W, line: &str) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(TransferError::from)?;
    writer.flush().await.map_err(TransferError::from)?;
    Ok(())
}
