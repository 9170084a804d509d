//! Listener readiness.
//!
//! # Data Flow
//! ```text
//! WebhookServer startup
//!     → timed loop
//!     → probe.rs (GET /{health_path})
//!     → non-empty body: listener is ready
//! ```

pub mod probe;

pub use probe::HealthProbe;
