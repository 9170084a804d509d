//! Webhook listener process.
//!
//! Started by `WebhookServer` with the path of an instance descriptor. Binds
//! the descriptor's host and port, stores every request in the descriptor's
//! capture directory and exits when stdin closes or on Ctrl+C.
//!
//! ```text
//!   WebhookServer (test process)            test-webhook (this process)
//!   ────────────────────────────            ───────────────────────────
//!   write {port}.toml ───────────────────▶  load descriptor
//!   spawn, keep stdin ───────────────────▶  bind host:port
//!   GET /health (poll) ──────────────────▶  "ok"
//!                                           POST /webhook → {port}/request-*.json
//!   query() reads {port}/ ◀──────────────── (shared directory only)
//!   drop stdin ──────────────────────────▶  graceful shutdown
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use test_webhook::config::load_descriptor;
use test_webhook::http::CaptureListener;
use test_webhook::lifecycle::{signals, Shutdown};
use test_webhook::observability::init_logging;

#[derive(Parser)]
#[command(name = "test-webhook")]
#[command(about = "Listener process of a disposable webhook receiver", long_about = None)]
struct Cli {
    /// Instance descriptor written by the webhook server.
    #[arg(short, long)]
    descriptor: PathBuf,

    /// Keep running when stdin closes (for running the listener by hand).
    #[arg(long)]
    ignore_stdin: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging("test_webhook=info,tower_http=info");

    let descriptor = load_descriptor(&cli.descriptor)?;
    tracing::info!(
        host = %descriptor.host,
        port = descriptor.port,
        capture_dir = %descriptor.capture_dir.display(),
        "Descriptor loaded"
    );

    // Fails if someone else took the port after it was probed; the server
    // notices the early exit.
    let listener = TcpListener::bind((descriptor.host.as_str(), descriptor.port)).await?;

    let shutdown = Shutdown::new();
    let shutdown_rx = shutdown.subscribe();
    signals::shutdown_on_ctrl_c(shutdown.clone());
    if !cli.ignore_stdin {
        signals::shutdown_on_stdin_eof(shutdown.clone())?;
    }

    CaptureListener::new(descriptor)
        .run(listener, shutdown_rx)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
