use log::{debug, info};
use std::net::SocketAddr;
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tokio::net::TcpStream;

use crate::client::{ConnectionState, Session};
use crate::error::handlers::handle_error;
use crate::error::{ServerError, TransferError};
use crate::protocol::{handle_get, handle_ls, handle_rm, handle_write, parse_command, read_header};
use crate::server::Shutdown;

/// Handles one store client connection.
///
/// - Uses BufReader to read the header line; buffered body bytes carry over to WRITE.
/// - Runs exactly one command, then closes.
/// - Drops the connection as soon as the server shuts down.
pub async fn handle_client(
    stream: TcpStream,
    client_addr: SocketAddr,
    session: Session,
    mut shutdown: Shutdown,
) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    match serve_connection(&mut reader, &mut write_half, &session, &mut shutdown, client_addr).await
    {
        Ok(()) => {}
        Err(ServerError::Transfer(TransferError::Cancelled)) => {
            info!("Dropping connection {} for shutdown", client_addr);
        }
        Err(e) => handle_error(&e),
    }

    info!("Client {} disconnected", client_addr);
}

/// Drives a connection from `AwaitCommand` to `Closed`.
///
/// Every state stops with `Cancelled` once shutdown fires. WRITE watches the
/// signal itself so the interrupted upload is abandoned cleanly.
pub async fn serve_connection<R, W>(
    reader: &mut R,
    writer: &mut W,
    session: &Session,
    shutdown: &mut Shutdown,
    client_addr: SocketAddr,
) -> Result<(), ServerError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut state = ConnectionState::AwaitCommand;

    loop {
        debug!("{} in state {:?}", client_addr, state);

        state = match state {
            ConnectionState::AwaitCommand => {
                let line = shutdown
                    .run_until(read_header(
                        reader,
                        session.max_command_length,
                        session.idle_timeout,
                    ))
                    .await?;
                match line {
                    Some(line) => {
                        let command = parse_command(&line)?;
                        info!("Received from {}: {:?}", client_addr, command);
                        ConnectionState::from(command)
                    }
                    None => {
                        info!("Connection closed by client {}", client_addr);
                        ConnectionState::Closed
                    }
                }
            }
            ConnectionState::WriteBody { path, size } => {
                handle_write(reader, session, shutdown, &path, size).await?;
                ConnectionState::Closed
            }
            ConnectionState::GetAwaitReady { path, version } => {
                shutdown
                    .run_until(handle_get(reader, writer, session, &path, version))
                    .await?;
                ConnectionState::Closed
            }
            ConnectionState::RmDone { path, version } => {
                shutdown
                    .run_until(handle_rm(writer, session, &path, version))
                    .await?;
                ConnectionState::Closed
            }
            ConnectionState::LsStreaming { filter } => {
                shutdown
                    .run_until(handle_ls(writer, session, filter.as_deref()))
                    .await?;
                ConnectionState::Closed
            }
            ConnectionState::Closed => return Ok(()),
        };
    }
}
