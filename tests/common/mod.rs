//! Shared utilities for integration tests.

use std::path::PathBuf;

use test_webhook::{ServerConfig, WebhookServer};

/// Default configuration pointing at the freshly built listener binary.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener_program = Some(PathBuf::from(env!("CARGO_BIN_EXE_test-webhook")));
    config.tmp_root_dir = std::env::temp_dir().join("test-webhook-it");
    config.retry_interval_micros = 20_000;
    config
}

pub async fn start_server() -> WebhookServer {
    WebhookServer::with_config(test_config())
        .await
        .expect("webhook server should start")
}

/// HTTP client without connection pooling or system proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// POST `content` to the server's webhook URL and wait for the response.
pub async fn post_to_server(server: &WebhookServer, content: &str) {
    let res = client()
        .post(server.url())
        .body(content.to_string())
        .send()
        .await
        .expect("webhook unreachable");
    assert!(res.status().is_success(), "webhook returned {}", res.status());
}

#[allow(dead_code)]
pub fn bodies(captures: &[test_webhook::Capture]) -> Vec<String> {
    captures.iter().map(|c| c.body_text().into_owned()).collect()
}

/// A port below the default range that can currently be bound on `host`.
///
/// Instances started with the default range never scan it, so a test that
/// pins `port_range` to it does not race them. Give each test its own `from`.
#[allow(dead_code)]
pub fn bindable_port(host: &str, from: u16) -> u16 {
    (from..from + 1000)
        .find(|&port| std::net::TcpListener::bind((host, port)).is_ok())
        .expect("no bindable port below the default range")
}

/// Write an executable shell script to stand in for the listener.
#[cfg(unix)]
#[allow(dead_code)]
pub fn listener_script(dir: &std::path::Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-listener.sh");
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}
