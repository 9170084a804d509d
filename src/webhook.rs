//! The webhook server: one listener process, one port, one capture directory.
//!
//! # Lifecycle
//! ```text
//! with_config
//!     → validate config
//!     → reserve unused port
//!     → create {tmp_root_dir}/{port}/ and clear stale captures
//!     → write {tmp_root_dir}/{port}.toml descriptor
//!     → spawn listener process
//!     → poll /{health_path} until it answers (bounded)
//!
//! shutdown / drop
//!     → close listener stdin, wait, kill if needed
//!     → remove capture directory and descriptor
//!     → release port reservation
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::capture::{CaptureStore, StoreError};
use crate::config::{validate_config, write_descriptor, ConfigError, ServerConfig};
use crate::error::WebhookError;
use crate::health::HealthProbe;
use crate::lifecycle::{locate_listener, ListenerProcess, SpawnOptions};
use crate::net::{probe_host, reserve_unused_port, PortReservation};
use crate::query::Query;
use crate::resilience::{TimedLoop, TimedLoopError};

/// Per-request timeout of the startup health probe.
const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// A disposable HTTP receiver that records every request it gets.
///
/// Dropping the server stops the listener and deletes its captures.
#[derive(Debug)]
pub struct WebhookServer {
    config: ServerConfig,
    port: u16,
    store: CaptureStore,
    descriptor_path: PathBuf,
    process: Option<ListenerProcess>,
    reservation: Option<PortReservation>,
    torn_down: bool,
}

impl WebhookServer {
    /// Start a server with the default configuration.
    pub async fn start() -> Result<Self, WebhookError> {
        Self::with_config(ServerConfig::default()).await
    }

    /// Start a server and wait until its listener is ready.
    pub async fn with_config(config: ServerConfig) -> Result<Self, WebhookError> {
        validate_config(&config).map_err(|errors| WebhookError::Config(ConfigError::Validation(errors)))?;
        let program = locate_listener(config.listener_program.as_deref())?;

        let reservation = reserve_unused_port(&config.listen_host, config.port_range).await?;
        let port = reservation.port();

        let store = CaptureStore::create(config.capture_dir(port))
            .await
            .map_err(|e| match e {
                StoreError::Io { path, source } => WebhookError::DirectoryCreateFailed { path, source },
                other => WebhookError::Store(other),
            })?;

        // From here on, dropping `server` undoes everything.
        let mut server = Self {
            descriptor_path: config.descriptor_path(port),
            config,
            port,
            store,
            process: None,
            reservation: Some(reservation),
            torn_down: false,
        };

        let stale = server.clean().await?;
        if stale > 0 {
            tracing::debug!(port, stale, "Removed stale captures");
        }

        write_descriptor(&server.descriptor_path, &server.config.descriptor(port))?;

        tracing::info!(port, program = %program.display(), "Starting listener");
        server.process = Some(ListenerProcess::spawn(SpawnOptions {
            program: &program,
            descriptor: &server.descriptor_path,
            inherit_output: server.config.listener_output,
            log_filter: &server.config.log_filter,
        })?);

        server.wait_until_healthy().await?;
        tracing::info!(port, url = %server.url(), "Webhook server ready");
        Ok(server)
    }

    async fn wait_until_healthy(&mut self) -> Result<(), WebhookError> {
        let host = probe_host(&self.config.listen_host);
        let url = self.url_for(&self.config.health_path, &host);
        tracing::debug!(url = %url, "Waiting for listener health check");

        let probe = HealthProbe::new(url.clone(), HEALTH_REQUEST_TIMEOUT);
        let probe = &probe;
        let port = self.port;
        let seconds = self.config.startup_timeout_secs;
        let poll = TimedLoop::new()
            .for_maximum_seconds(seconds)
            .retry_after_micros(self.config.retry_interval_micros);

        let Some(process) = self.process.as_mut() else {
            return Err(WebhookError::ListenerExited {
                port,
                status: "not started".to_string(),
            });
        };

        let outcome = poll
            .try_run(None, || {
                let exited = process.try_exit_status();
                async move {
                    if let Some(status) = exited {
                        return Err(WebhookError::ListenerExited {
                            port,
                            status: status.to_string(),
                        });
                    }
                    Ok(probe.check().await)
                }
            })
            .await;

        match outcome {
            Ok(_) => Ok(()),
            Err(TimedLoopError::Timeout(_)) => Err(WebhookError::ListenerStartupTimeout { url, seconds }),
            Err(TimedLoopError::Check(e)) => Err(e),
        }
    }

    /// The port the listener is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// URL of the webhook endpoint on `localhost`.
    pub fn url(&self) -> String {
        self.url_for(&self.config.webhook_path, "localhost")
    }

    /// URL of `path` on this server, as reachable through `host`. Use a
    /// different host when the caller lives in another container.
    pub fn url_for(&self, path: &str, host: &str) -> String {
        let host = if host.contains(':') && !host.starts_with('[') {
            format!("[{host}]")
        } else {
            host.to_string()
        };
        format!("http://{}:{}/{}", host, self.port, path.trim_start_matches('/'))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn capture_dir(&self) -> &Path {
        self.store.dir()
    }

    pub fn store(&self) -> &CaptureStore {
        &self.store
    }

    /// Start a fresh query over this server's captures.
    pub fn query(&self) -> Query {
        Query::new(self.store.clone())
            .with_poll(TimedLoop::new().retry_after_micros(self.config.retry_interval_micros))
    }

    /// Delete every capture, including records that no longer parse.
    /// Returns how many were removed.
    pub async fn clean(&self) -> Result<usize, WebhookError> {
        tracing::debug!(port = self.port, "Cleaning all captures");
        Ok(self.store.clear().await?)
    }

    /// Whether the listener process is still alive.
    pub fn is_running(&mut self) -> bool {
        match self.process.as_mut() {
            Some(process) => process.try_exit_status().is_none(),
            None => false,
        }
    }

    /// Stop the listener and remove this instance's files. Calling it again
    /// does nothing.
    pub fn shutdown(&mut self) -> Result<(), WebhookError> {
        if self.torn_down {
            return Ok(());
        }
        self.torn_down = true;

        if let Some(mut process) = self.process.take() {
            tracing::debug!(port = self.port, pid = process.id(), "Stopping listener");
            process.stop(Duration::from_millis(self.config.shutdown_grace_ms));
        }

        let dir_result = remove_ignoring_missing(std::fs::remove_dir_all(self.store.dir()), self.store.dir());
        let descriptor_result =
            remove_ignoring_missing(std::fs::remove_file(&self.descriptor_path), &self.descriptor_path);
        self.reservation = None;

        tracing::info!(port = self.port, "Webhook server stopped");
        dir_result.and(descriptor_result)
    }
}

fn remove_ignoring_missing(result: std::io::Result<()>, path: &Path) -> Result<(), WebhookError> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(WebhookError::Store(StoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })),
    }
}

impl Drop for WebhookServer {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(port = self.port, error = %e, "Webhook server teardown incomplete");
        }
    }
}
