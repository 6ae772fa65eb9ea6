//! Client session context
//!
//! The state every connection task shares with the server.

use std::sync::Arc;
use std::time::Duration;

use crate::config::{SharedRuntimeConfig, StartupConfig};
use crate::storage::Storage;

/// Per-connection view of server state. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    pub storage: Arc<Storage>,
    pub runtime: SharedRuntimeConfig,
    pub buffer_size: usize,
    pub max_command_length: usize,
    pub idle_timeout: Option<Duration>,
}

impl Session {
    pub fn new(storage: Arc<Storage>, startup: &StartupConfig, runtime: SharedRuntimeConfig) -> Self {
        Self {
            storage,
            runtime,
            buffer_size: startup.buffer_size,
            max_command_length: startup.max_command_length,
            idle_timeout: startup.idle_timeout(),
        }
    }

    /// Current upload limit, read from the runtime config
    pub async fn max_file_size(&self) -> u64 {
        self.runtime.read().await.max_file_size_bytes()
    }
}
