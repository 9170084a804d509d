use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use test_webhook::{Capture, CaptureStore, Query, ServerConfig, TimedLoop};

#[derive(Parser)]
#[command(name = "webhook-cli")]
#[command(about = "Inspect the captures of a running test webhook", long_about = None)]
struct Cli {
    /// Port of the webhook instance.
    #[arg(short, long)]
    port: u16,

    /// Parent directory of the per-instance capture directories.
    #[arg(short, long)]
    tmp_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Number of stored captures
    Count,
    /// Print captures as JSON, oldest first
    List {
        /// Only the last N captures
        #[arg(short, long)]
        last: Option<usize>,
    },
    /// Delete all captures
    Clear,
    /// Block until at least N captures exist
    Wait {
        #[arg(short, long, default_value_t = 1)]
        amount: usize,
        #[arg(short, long, default_value_t = 10)]
        max_seconds: u64,
    },
    /// POST a payload to the instance's webhook path
    Send {
        /// Request body
        data: String,
        #[arg(long, default_value = "webhook")]
        path: String,
        #[arg(long, default_value = "localhost")]
        host: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = ServerConfig::default();
    if let Some(root) = cli.tmp_root {
        config.tmp_root_dir = root;
    }
    let query = Query::new(CaptureStore::new(config.capture_dir(cli.port)))
        .with_poll(TimedLoop::new().retry_after_micros(config.retry_interval_micros));

    match cli.command {
        Commands::Count => {
            println!("{}", query.count().await?);
        }
        Commands::List { last } => {
            let query = match last {
                Some(n) => query.sort().last(n),
                None => query.sort(),
            };
            let captures: Vec<Value> = query.get().await?.iter().map(describe).collect();
            println!("{}", serde_json::to_string_pretty(&captures)?);
        }
        Commands::Clear => {
            println!("deleted {}", query.delete().await?);
        }
        Commands::Wait { amount, max_seconds } => {
            query.wait_for_matching_requests(amount, max_seconds).await?;
            println!("{}", query.count().await?);
        }
        Commands::Send { data, path, host } => {
            let url = format!("http://{}:{}/{}", host, cli.port, path.trim_start_matches('/'));
            let res = reqwest::Client::new().post(&url).body(data).send().await?;
            let status = res.status();
            let id = res
                .headers()
                .get("x-capture-id")
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-")
                .to_string();
            if !status.is_success() {
                eprintln!("Error: webhook returned status {}", status);
            }
            println!("{} {}", status.as_u16(), id);
        }
    }

    Ok(())
}

fn describe(capture: &Capture) -> Value {
    let headers: Vec<Value> = capture
        .header_entries()
        .iter()
        .map(|h| json!([h.name, String::from_utf8_lossy(&h.value)]))
        .collect();

    json!({
        "id": capture.id(),
        "received_at": capture.received_at_seconds(),
        "method": capture.method(),
        "uri": capture.uri(),
        "remote_addr": capture.remote_addr(),
        "headers": headers,
        "body": capture.body_text(),
    })
}
