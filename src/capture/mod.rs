//! Request capture subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (listener process)
//!     → body drained once into a byte buffer
//!     → model.rs (Capture with fresh id + receipt time)
//!     → store.rs (one JSON record per id in the instance directory)
//!
//! Test side (caller process)
//!     → store.rs list_all / delete / clear
//!     → query layer
//! ```
//!
//! # Design Decisions
//! - The directory is the only state shared between listener and caller
//! - Records are immutable; only deletion removes them
//! - I/O and decode errors propagate; a silently dropped capture would make
//!   a test assertion lie

pub mod model;
pub mod store;

pub use model::{Capture, HeaderEntry};
pub use store::{CaptureStore, StoreError};
