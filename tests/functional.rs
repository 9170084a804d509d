//! End-to-end tests against a real listener process.

use std::time::Duration;

use test_webhook::net::is_port_in_use;
use test_webhook::{Capture, WebhookError};

mod common;

const DATA1: &str = r#"{"some": "data"}"#;
const DATA2: &str = r#"{"other": "data"}"#;
const DATA3: &str = r#"{"more": "data"}"#;

#[tokio::test]
async fn test_capture_and_query_lifecycle() {
    let server = common::start_server().await;
    assert_eq!(server.query().count().await.unwrap(), 0);

    common::post_to_server(&server, DATA1).await;
    assert_eq!(server.query().count().await.unwrap(), 1);

    common::post_to_server(&server, DATA2).await;
    common::post_to_server(&server, DATA3).await;
    assert_eq!(server.query().count().await.unwrap(), 3);

    let sorted = server.query().sort().get().await.unwrap();
    assert_eq!(common::bodies(&sorted), vec![DATA1, DATA2, DATA3]);

    let first = server.query().first_one().get().await.unwrap();
    assert_eq!(first[0].body_str(), Some(DATA1));

    let last = server.query().last_one().get().await.unwrap();
    assert_eq!(last[0].body_str(), Some(DATA3));

    let with_m = server
        .query()
        .filter(|c: &Capture| c.body_text().contains('m'));
    assert_eq!(with_m.count().await.unwrap(), 2);

    assert_eq!(server.query().first_one().delete().await.unwrap(), 1);
    assert_eq!(server.query().count().await.unwrap(), 2);
    assert_eq!(
        common::bodies(&server.query().sort().get().await.unwrap()),
        vec![DATA2, DATA3]
    );

    server.query().delete().await.unwrap();
    assert_eq!(server.query().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_request_metadata_is_captured() {
    let server = common::start_server().await;

    let res = common::client()
        .put(format!("{}?delivery=42&kind=push", server.url()))
        .header("x-hub-signature", "sha256=abc")
        .json(&serde_json::json!({ "ref": "main" }))
        .send()
        .await
        .unwrap();
    assert!(res.status().is_success());
    let id = res.headers()["x-capture-id"].to_str().unwrap().to_string();

    let captures = server.query().get().await.unwrap();
    assert_eq!(captures.len(), 1);
    let capture = &captures[0];
    assert_eq!(capture.id(), id);
    assert_eq!(capture.method(), "PUT");
    assert_eq!(capture.path(), "/webhook");
    assert_eq!(capture.query_param("delivery"), Some("42"));
    assert_eq!(capture.header("X-Hub-Signature"), Some("sha256=abc"));
    assert_eq!(capture.header("content-type"), Some("application/json"));
    assert!(capture.remote_addr().is_some());
    assert_eq!(capture.json::<serde_json::Value>().unwrap()["ref"], "main");

    assert_eq!(server.query().method("put").header("x-hub-signature", "sha256=abc").count().await.unwrap(), 1);
    assert_eq!(server.query().method("POST").count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_health_probe_is_not_captured() {
    let server = common::start_server().await;

    let body = common::client()
        .get(server.url_for("health", "127.0.0.1"))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(!body.is_empty());

    let other = common::client()
        .get(server.url_for("/somewhere/else", "127.0.0.1"))
        .send()
        .await
        .unwrap();
    assert!(other.status().is_success());

    let captures = server.query().get().await.unwrap();
    assert_eq!(captures.len(), 1);
    assert_eq!(captures[0].path(), "/somewhere/else");
}

#[tokio::test]
async fn test_overlapping_deliveries_are_all_stored() {
    let server = common::start_server().await;
    let url = server.url();

    let mut handles = Vec::new();
    for i in 0..20 {
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            common::client()
                .post(url)
                .body(format!("payload-{i}"))
                .send()
                .await
                .map(|r| r.status().is_success())
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().unwrap());
    }

    assert_eq!(server.query().count().await.unwrap(), 20);
    assert_eq!(server.query().body_contains("payload-7").count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_wait_for_matching_requests() {
    let server = common::start_server().await;
    let url = server.url();

    tokio::spawn(async move {
        for body in ["a", "b", "c"] {
            tokio::time::sleep(Duration::from_millis(200)).await;
            let _ = common::client().post(&url).body(body).send().await;
        }
    });

    let query = server.query();
    query.wait_for_matching_requests(3, 5).await.unwrap();
    assert_eq!(query.count().await.unwrap(), 3);

    let err = query.wait_for_matching_requests(4, 1).await.unwrap_err();
    assert!(matches!(err, WebhookError::LoopTimeout(_)));
}

#[tokio::test]
async fn test_url_building() {
    let server = common::start_server().await;
    let port = server.port();

    assert_eq!(server.url(), format!("http://localhost:{port}/webhook"));
    assert_eq!(server.url_for("health", "webhook.test"), format!("http://webhook.test:{port}/health"));
    assert_eq!(server.url_for("/a/b", "::1"), format!("http://[::1]:{port}/a/b"));
}

#[tokio::test]
async fn test_shutdown_is_idempotent_and_cleans_up() {
    let mut server = common::start_server().await;
    let port = server.port();
    let dir = server.capture_dir().to_path_buf();
    common::post_to_server(&server, DATA1).await;
    assert!(dir.exists());
    assert!(server.is_running());

    server.shutdown().unwrap();
    assert!(!dir.exists());
    assert!(!server.is_running());
    assert!(!is_port_in_use("127.0.0.1", port).await);

    server.shutdown().unwrap();
}

#[tokio::test]
async fn test_drop_stops_listener() {
    let server = common::start_server().await;
    let port = server.port();
    let dir = server.capture_dir().to_path_buf();
    let descriptor = server.config().descriptor_path(port);
    assert!(descriptor.exists());

    drop(server);

    assert!(!dir.exists());
    assert!(!descriptor.exists());
    assert!(!is_port_in_use("127.0.0.1", port).await);
}

#[tokio::test]
async fn test_public_dir_provides_responses() {
    let public = tempfile::tempdir().unwrap();
    std::fs::write(public.path().join("webhook"), r#"{"accepted":true}"#).unwrap();

    let mut config = common::test_config();
    config.public_dir = Some(public.path().to_path_buf());
    let server = test_webhook::WebhookServer::with_config(config).await.unwrap();

    let body = common::client()
        .post(server.url())
        .body("ping")
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, r#"{"accepted":true}"#);
    assert_eq!(server.query().count().await.unwrap(), 1);
}
