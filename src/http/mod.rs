//! HTTP protocol handling subsystem (runs inside the listener process).
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, trace + timeout layers)
//!     → GET /{health_path}: "ok", nothing stored
//!     → anything else: body drained → Capture → CaptureStore::put → 200
//! ```

pub mod server;

pub use server::{CaptureListener, HEALTH_BODY, X_CAPTURE_ID};
