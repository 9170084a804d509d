//! The listener child process.
//!
//! # Responsibilities
//! - Locate the listener executable
//! - Spawn it with the descriptor path, output discarded unless requested
//! - Stop it: close stdin, wait out the grace period, then kill
//!
//! # Design Decisions
//! - Stopping is synchronous so it can run from `Drop`
//! - Stopping twice is a no-op

use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::error::WebhookError;

/// Name of the listener binary.
pub const LISTENER_BIN: &str = "test-webhook";

/// Environment variable naming the listener executable.
pub const LISTENER_ENV: &str = "TEST_WEBHOOK_LISTENER";

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Resolve the listener executable: explicit path, then `TEST_WEBHOOK_LISTENER`,
/// then next to the current executable or one directory up (where Cargo
/// puts binaries relative to test executables).
pub fn locate_listener(explicit: Option<&Path>) -> Result<PathBuf, WebhookError> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(path) = std::env::var_os(LISTENER_ENV) {
        return Ok(PathBuf::from(path));
    }

    let file_name = format!("{LISTENER_BIN}{}", std::env::consts::EXE_SUFFIX);
    let mut searched = Vec::new();
    if let Ok(exe) = std::env::current_exe() {
        for dir in exe.ancestors().skip(1).take(2) {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                return Ok(candidate);
            }
            searched.push(candidate);
        }
    }

    Err(WebhookError::ListenerNotFound { searched })
}

/// Options for spawning a listener.
#[derive(Debug, Clone)]
pub struct SpawnOptions<'a> {
    pub program: &'a Path,
    pub descriptor: &'a Path,
    pub inherit_output: bool,
    pub log_filter: &'a str,
}

/// A running listener process.
#[derive(Debug)]
pub struct ListenerProcess {
    child: Child,
    stdin: Option<ChildStdin>,
    exit_status: Option<ExitStatus>,
}

impl ListenerProcess {
    /// Start the listener. Its stdin stays open until [`ListenerProcess::stop`].
    pub fn spawn(options: SpawnOptions<'_>) -> Result<Self, WebhookError> {
        let mut command = Command::new(options.program);
        command
            .arg("--descriptor")
            .arg(options.descriptor)
            .stdin(Stdio::piped())
            .stdout(Stdio::null());

        if options.inherit_output {
            command.stderr(Stdio::inherit()).env("RUST_LOG", options.log_filter);
        } else {
            command.stderr(Stdio::null());
        }

        let mut child = command.spawn().map_err(|e| WebhookError::ListenerSpawn {
            program: options.program.to_path_buf(),
            source: e,
        })?;
        let stdin = child.stdin.take();

        tracing::debug!(pid = child.id(), program = %options.program.display(), "Listener spawned");
        Ok(Self {
            child,
            stdin,
            exit_status: None,
        })
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Exit status, if the process has terminated.
    pub fn try_exit_status(&mut self) -> Option<ExitStatus> {
        if self.exit_status.is_none() {
            self.exit_status = self.child.try_wait().ok().flatten();
        }
        self.exit_status
    }

    /// Ask the listener to shut down and wait up to `grace` before killing it.
    pub fn stop(&mut self, grace: Duration) {
        if self.try_exit_status().is_some() {
            self.stdin = None;
            return;
        }

        // Closing stdin is the shutdown request.
        self.stdin = None;

        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if let Some(status) = self.try_exit_status() {
                tracing::debug!(pid = self.child.id(), %status, "Listener exited");
                return;
            }
            std::thread::sleep(STOP_POLL_INTERVAL);
        }

        tracing::warn!(pid = self.child.id(), "Listener ignored shutdown request, killing it");
        if let Err(e) = self.child.kill() {
            tracing::warn!(pid = self.child.id(), error = %e, "Failed to kill listener");
        }
        self.exit_status = self.child.wait().ok();
    }
}

impl Drop for ListenerProcess {
    fn drop(&mut self) {
        if self.exit_status.is_none() {
            self.stop(Duration::ZERO);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_program_wins() {
        let path = Path::new("/opt/listener");
        assert_eq!(locate_listener(Some(path)).unwrap(), PathBuf::from("/opt/listener"));
    }
}
