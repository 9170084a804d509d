//! Shutdown triggers for the listener process.
//!
//! # Responsibilities
//! - Ctrl+C (SIGINT) → graceful shutdown
//! - EOF on stdin → graceful shutdown; the server holds the write end and
//!   closes it on teardown, and the OS closes it if the server dies
//!
//! # Design Decisions
//! - stdin is read on a plain thread: a blocking read cannot be cancelled,
//!   and a detached thread never delays process exit

use std::io::Read;

use crate::lifecycle::{Shutdown, ShutdownReason};

/// Trigger `shutdown` on Ctrl+C.
pub fn shutdown_on_ctrl_c(shutdown: Shutdown) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl+C received"),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
                return;
            }
        }
        shutdown.trigger(ShutdownReason::CtrlC);
    });
}

/// Trigger `shutdown` once stdin reaches end of file.
pub fn shutdown_on_stdin_eof(shutdown: Shutdown) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("stdin-watch".to_string())
        .spawn(move || {
            let mut stdin = std::io::stdin().lock();
            let mut buf = [0u8; 256];
            loop {
                match stdin.read(&mut buf) {
                    Ok(0) => break,
                    Ok(_) => continue,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin watch failed");
                        break;
                    }
                }
            }
            tracing::info!("stdin closed by parent");
            shutdown.trigger(ShutdownReason::StdinClosed);
        })
        .map(|_| ())
}
