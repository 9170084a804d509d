//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! ServerConfig (defaults or TOML file)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WebhookServer allocates a port
//!     → ListenerDescriptor written to {tmp_root_dir}/{port}.toml
//!     → listener process loads the descriptor fresh
//! ```
//!
//! # Design Decisions
//! - Config is immutable once a server is constructed
//! - All fields have defaults to allow minimal configs
//! - The listener never sees ServerConfig, only the descriptor, because it
//!   runs in its own address space

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_descriptor, write_descriptor, ConfigError};
pub use schema::{ListenerDescriptor, PortRange, ServerConfig};
pub use validation::{validate_config, ValidationError};
