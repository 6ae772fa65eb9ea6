//! Shutdown signalling
//!
//! The accept loop holds a [`ShutdownTrigger`]; every connection task holds a
//! [`Shutdown`] and stops when the trigger fires or is dropped.

use log::error;
use std::future::Future;
use tokio::sync::watch;

use crate::error::{ServerError, TransferError};

pub struct ShutdownTrigger {
    sender: watch::Sender<bool>,
}

#[derive(Clone)]
pub struct Shutdown {
    receiver: watch::Receiver<bool>,
}

/// Creates a linked trigger and listener pair
pub fn channel() -> (ShutdownTrigger, Shutdown) {
    let (sender, receiver) = watch::channel(false);
    (ShutdownTrigger { sender }, Shutdown { receiver })
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left is fine
        let _ = self.sender.send(true);
    }
}

impl Shutdown {
    /// Resolves once shutdown has been triggered or the trigger is gone
    pub async fn recv(&mut self) {
        while !*self.receiver.borrow_and_update() {
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }

    /// Runs `work` unless shutdown fires first, which yields `Cancelled`.
    ///
    /// `work` is dropped when cancelled, so it must not own anything that
    /// needs cleanup.
    pub async fn run_until<F, T>(&mut self, work: F) -> Result<T, ServerError>
    where
        F: Future<Output = Result<T, ServerError>>,
    {
        tokio::select! {
            result = work => result,
            _ = self.recv() => Err(TransferError::Cancelled.into()),
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on unix
pub async fn signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
