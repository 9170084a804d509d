//! Readiness probing of a listener.
//!
//! # Responsibilities
//! - Issue a single GET against the health URL
//! - Report the body when the listener answered successfully with content

use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::time;

/// Largest health body worth reading.
const MAX_HEALTH_BODY: usize = 64 * 1024;

pub struct HealthProbe {
    url: String,
    timeout: Duration,
    client: Client<HttpConnector, Body>,
}

impl HealthProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .build(HttpConnector::new());

        Self {
            url: url.into(),
            timeout,
            client,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Probe once. `None` until the listener returns a non-empty success body.
    pub async fn check(&self) -> Option<String> {
        let request = match Request::builder()
            .method("GET")
            .uri(&self.url)
            .header("user-agent", "test-webhook-health-check")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build health check request: {}", e);
                return None;
            }
        };

        let response = match time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::trace!(url = %self.url, error = %e, "Health check failed: connection error");
                return None;
            }
            Err(_) => {
                tracing::trace!(url = %self.url, "Health check failed: timeout");
                return None;
            }
        };

        if !response.status().is_success() {
            tracing::debug!(url = %self.url, status = %response.status(), "Health check failed: non-success status");
            return None;
        }

        let body = Body::new(response.into_body());
        match time::timeout(self.timeout, axum::body::to_bytes(body, MAX_HEALTH_BODY)).await {
            Ok(Ok(bytes)) if !bytes.is_empty() => Some(String::from_utf8_lossy(&bytes).into_owned()),
            _ => None,
        }
    }
}
