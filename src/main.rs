//! RAX Store Server - Entry Point
//!
//! Loads configuration, opens the storage root, and serves until Ctrl-C.

use log::{error, info};
use std::process;

use rax_store_server::error::handlers::handle_error;
use rax_store_server::server::shutdown;
use rax_store_server::utils::logging::setup_logging;
use rax_store_server::{Server, ServerConfig};

#[tokio::main]
async fn main() {
    setup_logging();

    info!("Launching store server...");

    let config = match ServerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            handle_error(&e);
            process::exit(1);
        }
    };

    if let Err(e) = server.run(shutdown::signal()).await {
        handle_error(&e);
        process::exit(1);
    }
}
