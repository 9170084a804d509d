//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Startup health probe / Query::wait_for_matching_requests
//!     → timed_loop.rs (poll, sleep, retry until a deadline)
//!     → value returned, or LoopTimeout
//! ```
//!
//! # Design Decisions
//! - Waiting is always bounded; expiry is the only cancellation mechanism
//! - Every retry sleeps, so a waiting caller never busy-spins
//! - Timeout errors are distinct from other errors

pub mod timed_loop;

pub use timed_loop::{timed_loop, LoopTimeout, TimedLoop, TimedLoopError};
