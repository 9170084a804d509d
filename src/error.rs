//! Errors surfaced by webhook server construction and queries.

use std::path::PathBuf;

use thiserror::Error;

use crate::capture::StoreError;
use crate::config::ConfigError;
use crate::resilience::LoopTimeout;

/// Errors that can occur while running a webhook server.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Every port of the configured range answered a connect probe.
    #[error("no unused port between {min} and {max}")]
    NoFreePort { min: u16, max: u16 },

    /// The listener never answered its health probe.
    #[error("listener at {url} did not become healthy within {seconds} seconds")]
    ListenerStartupTimeout { url: String, seconds: u64 },

    /// The listener process terminated before becoming healthy, typically
    /// because another process grabbed the port first.
    #[error("listener for port {port} exited during startup: {status}")]
    ListenerExited { port: u16, status: String },

    /// No listener executable could be located.
    #[error("listener executable not found (searched: {searched:?})")]
    ListenerNotFound { searched: Vec<PathBuf> },

    #[error("failed to spawn listener {program}: {source}")]
    ListenerSpawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to create capture directory {path}: {source}")]
    DirectoryCreateFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    LoopTimeout(#[from] LoopTimeout),
}
