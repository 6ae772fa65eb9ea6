use log::{error, info, warn};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::client::{Session, handle_client};
use crate::config::{ServerConfig, StartupConfig};
use crate::error::ServerError;
use crate::server::shutdown;
use crate::storage::Storage;
use crate::transfer::ByteCipher;

pub struct Server {
    listener: TcpListener,
    session: Session,
    connection_slots: Arc<Semaphore>,
    max_clients: usize,
}

impl Server {
    /// Opens the storage root and binds the listener.
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let (startup, runtime) = config.split();

        let storage = open_storage(&startup).await?;

        let socket = startup.listen_socket();
        let listener = match TcpListener::bind(&socket).await {
            Ok(listener) => {
                info!("Server bound to {}", socket);
                listener
            }
            Err(e) => {
                error!("Failed to bind to {}: {}", socket, e);
                return Err(e.into());
            }
        };

        let max_clients = runtime.read().await.max_clients;
        let session = Session::new(Arc::new(storage), &startup, runtime);

        Ok(Self {
            listener,
            session,
            connection_slots: Arc::new(Semaphore::new(max_clients)),
            max_clients,
        })
    }

    /// The bound address. Useful when the configured port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections until `shutdown_signal` resolves.
    ///
    /// Each connection runs in its own task. When the signal fires the
    /// listener is dropped and in-flight connections are told to stop.
    pub async fn run<F>(self, shutdown_signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Starting RAX store server on {} (max {} clients)",
            self.local_addr()?,
            self.max_clients
        );

        let (trigger, shutdown) = shutdown::channel();
        tokio::pin!(shutdown_signal);

        loop {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutdown requested, no longer accepting connections");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, addr)) => {
                        let permit = match Arc::clone(&self.connection_slots).try_acquire_owned() {
                            Ok(permit) => permit,
                            Err(_) => {
                                warn!("Connection limit reached, rejecting {}", addr);
                                continue;
                            }
                        };

                        info!("New client connected: {}", addr);
                        let session = self.session.clone();
                        let shutdown = shutdown.clone();

                        // Spawn a task for each client so accept loop doesn't block
                        tokio::spawn(async move {
                            handle_client(stream, addr, session, shutdown).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                    }
                }
            }
        }

        trigger.trigger();
        drop(self.listener);
        info!("Server stopped");
        Ok(())
    }
}

async fn open_storage(startup: &StartupConfig) -> Result<Storage, ServerError> {
    let cipher = ByteCipher::new(startup.cipher_key.as_bytes().to_vec());
    let storage = Storage::open(
        startup.server_root_path(),
        cipher,
        startup.max_path_length,
    )
    .await?;
    Ok(storage)
}
