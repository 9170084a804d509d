//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Server side (process.rs):
//!     Locate listener binary → Spawn with descriptor → ... → Close stdin → Wait/kill
//!
//! Listener side (signals.rs, shutdown.rs):
//!     stdin EOF / Ctrl+C → Shutdown::trigger → Stop accepting → Drain → Exit
//! ```
//!
//! # Design Decisions
//! - Shutdown has a deadline: the server kills a listener that outlives it
//! - A crashed server still stops its listener, because stdin closes

pub mod process;
pub mod shutdown;
pub mod signals;

pub use process::{locate_listener, ListenerProcess, SpawnOptions};
pub use shutdown::{requested, Shutdown, ShutdownReason};
