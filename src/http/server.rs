//! HTTP listener setup.
//!
//! # Responsibilities
//! - Create the Axum router: health probe plus a capture-everything fallback
//! - Wire up middleware (tracing, timeout)
//! - Drain each request body once and persist it before responding
//! - Serve until the shutdown signal, then drain connections

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::capture::{Capture, CaptureStore};
use crate::config::ListenerDescriptor;
use crate::lifecycle::{self, ShutdownReason};

/// Response header carrying the id of the stored capture.
pub const X_CAPTURE_ID: &str = "x-capture-id";

/// Body returned by the health endpoint.
pub const HEALTH_BODY: &str = "ok";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: CaptureStore,
    pub public_dir: Option<Arc<PathBuf>>,
    pub webhook_path: Arc<str>,
    pub max_body_bytes: usize,
}

/// The HTTP endpoint of one webhook server instance.
pub struct CaptureListener {
    router: Router,
    descriptor: ListenerDescriptor,
}

impl CaptureListener {
    /// Create a listener serving the instance described by `descriptor`.
    pub fn new(descriptor: ListenerDescriptor) -> Self {
        let state = AppState {
            store: CaptureStore::new(descriptor.capture_dir.clone()),
            public_dir: descriptor.public_dir.clone().map(Arc::new),
            webhook_path: Arc::from(descriptor.webhook_path.as_str()),
            max_body_bytes: descriptor.max_body_bytes,
        };

        let router = Self::build_router(&descriptor, state);
        Self { router, descriptor }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(descriptor: &ListenerDescriptor, state: AppState) -> Router {
        let health = format!("/{}", descriptor.health_path);

        Router::new()
            .route(&health, any(health_handler))
            .fallback(capture_handler)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(descriptor.request_timeout_secs))),
            )
    }

    /// The router, for driving the listener without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the listener, accepting connections until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<ShutdownReason>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            capture_dir = %self.descriptor.capture_dir.display(),
            webhook_path = %self.descriptor.webhook_path,
            "Webhook listener starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let reason = lifecycle::requested(shutdown).await;
                tracing::info!(%reason, "Shutdown requested, draining connections");
            })
            .await?;

        tracing::info!("Webhook listener stopped");
        Ok(())
    }
}

async fn health_handler() -> &'static str {
    HEALTH_BODY
}

/// Stores every request that is not a health probe.
async fn capture_handler(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Response {
    let (parts, body) = request.into_parts();
    let remote = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %parts.uri.path(), error = %e, "Failed to read request body");
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body could not be read").into_response();
        }
    };

    let capture = Capture::from_request(&parts, body.to_vec(), remote);

    if let Err(e) = state.store.put(&capture).await {
        tracing::error!(id = %capture.id(), error = %e, "Failed to store capture");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Capture could not be stored").into_response();
    }

    tracing::info!(
        id = %capture.id(),
        method = %capture.method(),
        path = %capture.path(),
        bytes = capture.body().len(),
        "Received request"
    );

    let content = match public_file(state.public_dir.as_deref(), capture.path()).await {
        Some(content) => Body::from(content),
        None if capture.path().trim_matches('/') == &*state.webhook_path => Body::from("captured"),
        None => Body::from("captured (not the webhook path)"),
    };

    let mut response = (StatusCode::OK, content).into_response();
    if let Ok(value) = header::HeaderValue::from_str(capture.id()) {
        response.headers_mut().insert(X_CAPTURE_ID, value);
    }
    response
}

/// Contents of the file under `public_dir` named by `request_path`, if any.
/// Paths that try to leave the directory are ignored.
async fn public_file(public_dir: Option<&PathBuf>, request_path: &str) -> Option<Vec<u8>> {
    let root = public_dir?;
    let relative = Path::new(request_path.trim_start_matches('/'));
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    let path = root.join(relative);
    if !tokio::fs::metadata(&path).await.ok()?.is_file() {
        return None;
    }
    tokio::fs::read(&path).await.ok()
}
