//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! WebhookServer construction
//!     → port.rs (scan range, connect probe, in-process reservation)
//!     → port handed to the listener process, which binds it
//! ```
//!
//! # Design Decisions
//! - Linear scan from the bottom of the range keeps port choice predictable
//! - Reservations only cover this process; other processes are detected by
//!   the connect probe or, at worst, by the listener failing to bind

pub mod port;

pub use port::{find_unused_port, is_port_in_use, probe_host, reserve_unused_port, PortReservation};
