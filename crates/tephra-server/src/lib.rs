//! Tephra server
//!
//! Tokio runtime for the sans-IO sessions in `tephra-core`: a WebSocket accept
//! loop, one task per connection, and the shared continuity registry that
//! lets a reconnecting client pick up where it left off.
//!
//! # Components
//!
//! - [`authority`]: continuity registry plus the per-connection session driver
//! - [`websocket`]: WebSocket framing and the upgrade handshake
//! - [`server`]: TCP accept loop
//! - [`config`]: command-line arguments and runtime configuration
//! - [`mod@env`]: production [`tephra_core::Environment`]
//! - [`demo`]: the counter component the binary serves
//! - [`error`]: error types

pub mod authority;
pub mod config;
pub mod demo;
pub mod env;
pub mod error;
pub mod server;
pub mod websocket;

pub use authority::{Authority, Ending, Handshake};
pub use config::{Args, ServerConfig};
pub use env::SystemEnv;
pub use error::ServerError;
pub use server::run;
