//! Configuration schema definitions.
//!
//! This module defines the configuration of a webhook server instance and the
//! descriptor handed to the listener process.
//! All types derive Serde traits for (de)serialization from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration for a webhook server instance.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host the listener binds to (e.g., "0.0.0.0").
    pub listen_host: String,

    /// Range scanned for an unused port.
    pub port_range: PortRange,

    /// Directory whose files are returned as response bodies for matching paths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,

    /// Path of the webhook endpoint, relative to the server root.
    pub webhook_path: String,

    /// Path of the readiness probe, relative to the server root.
    pub health_path: String,

    /// Parent directory for the per-instance capture directories.
    pub tmp_root_dir: PathBuf,

    /// Maximum time to wait for the listener to answer the health probe.
    pub startup_timeout_secs: u64,

    /// Sleep between two polls of a timed loop, in microseconds.
    pub retry_interval_micros: u64,

    /// Time granted to the listener to exit after being asked to, in milliseconds.
    pub shutdown_grace_ms: u64,

    /// Largest request body the listener will capture.
    pub max_body_bytes: usize,

    /// Request timeout enforced by the listener, in seconds.
    pub request_timeout_secs: u64,

    /// Explicit path of the listener executable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listener_program: Option<PathBuf>,

    /// Let the listener write its logs to the inherited stderr.
    pub listener_output: bool,

    /// `RUST_LOG` filter passed to the listener when `listener_output` is set.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_host: "0.0.0.0".to_string(),
            port_range: PortRange::default(),
            public_dir: None,
            webhook_path: "webhook".to_string(),
            health_path: "health".to_string(),
            tmp_root_dir: default_tmp_root_dir(),
            startup_timeout_secs: 10,
            retry_interval_micros: 50_000,
            shutdown_grace_ms: 2_000,
            max_body_bytes: 16 * 1024 * 1024,
            request_timeout_secs: 30,
            listener_program: None,
            listener_output: false,
            log_filter: "test_webhook=debug,tower_http=debug".to_string(),
        }
    }
}

impl ServerConfig {
    /// Capture directory of the instance listening on `port`.
    pub fn capture_dir(&self, port: u16) -> PathBuf {
        self.tmp_root_dir.join(port.to_string())
    }

    /// Descriptor file of the instance listening on `port`.
    pub fn descriptor_path(&self, port: u16) -> PathBuf {
        self.tmp_root_dir.join(format!("{port}.toml"))
    }

    /// Build the descriptor for the listener bound to `port`.
    pub fn descriptor(&self, port: u16) -> ListenerDescriptor {
        ListenerDescriptor {
            host: self.listen_host.clone(),
            port,
            capture_dir: self.capture_dir(port),
            public_dir: self.public_dir.clone(),
            webhook_path: normalize_path(&self.webhook_path),
            health_path: normalize_path(&self.health_path),
            max_body_bytes: self.max_body_bytes,
            request_timeout_secs: self.request_timeout_secs,
        }
    }
}

/// Inclusive range of candidate ports.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PortRange {
    pub min: u16,
    pub max: u16,
}

impl PortRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }
}

impl Default for PortRange {
    /// The IANA ephemeral range.
    fn default() -> Self {
        Self {
            min: 49152,
            max: 65535,
        }
    }
}

/// Everything the listener process needs to serve one instance.
///
/// Written next to the capture directory when the server starts and loaded
/// by the listener, which shares no memory with the server.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ListenerDescriptor {
    pub host: String,
    pub port: u16,
    pub capture_dir: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_dir: Option<PathBuf>,
    pub webhook_path: String,
    pub health_path: String,
    pub max_body_bytes: usize,
    pub request_timeout_secs: u64,
}

impl ListenerDescriptor {
    pub fn capture_dir(&self) -> &Path {
        &self.capture_dir
    }
}

fn default_tmp_root_dir() -> PathBuf {
    std::env::temp_dir().join("test-webhook").join("requests")
}

/// Strip surrounding slashes so paths can be joined as `/{path}`.
pub fn normalize_path(path: &str) -> String {
    path.trim_matches('/').to_string()
}
