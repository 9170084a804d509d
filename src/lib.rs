//! Disposable HTTP receivers for testing webhook senders.
//!
//! A [`WebhookServer`] picks an unused port, starts a listener process on
//! it and records every request the listener receives. Tests then inspect
//! the recorded requests through a [`Query`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), test_webhook::WebhookError> {
//! use test_webhook::WebhookServer;
//!
//! let server = WebhookServer::start().await?;
//! // ... make the code under test call server.url() ...
//! let query = server.query().method("POST");
//! query.wait_for_matching_requests(1, 5).await?;
//! let first = query.sort().first_one().get().await?;
//! assert_eq!(first[0].body_str(), Some("{\"some\": \"data\"}"));
//! # Ok(())
//! # }
//! ```

// Core subsystems
pub mod capture;
pub mod config;
pub mod http;
pub mod net;
pub mod query;

// Cross-cutting concerns
pub mod error;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

mod webhook;

pub use capture::{Capture, CaptureStore, StoreError};
pub use config::{PortRange, ServerConfig};
pub use error::WebhookError;
pub use net::find_unused_port;
pub use query::{Query, Slice, SortOrder};
pub use resilience::{timed_loop, LoopTimeout, TimedLoop};
pub use webhook::WebhookServer;
