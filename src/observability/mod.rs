//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Server, store, query, listener
//!     → tracing events (port search, clean, capture stored, teardown)
//!     → logging.rs subscriber (stderr; discarded for listeners unless
//!       `listener_output` is set)
//! ```

pub mod logging;

pub use logging::init_logging;
