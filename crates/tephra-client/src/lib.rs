//! Tephra client
//!
//! Action-based replay engine for the client side of the Tephra protocol.
//! The [`Client`] applies mutation frames to an in-memory [`Document`],
//! forwards native events through the listeners the authority installed, and
//! returns every side effect as a [`ClientAction`]. No I/O happens here; a
//! browser shim, a native frontend or the simulation harness drives it.
//!
//! # Components
//!
//! - [`client`]: the replay engine and its actions
//! - [`dom`]: minimal document model (elements, text, attributes, focus)
//! - [`registry`]: protocol id to document node map and listener table
//! - [`debounce`]: holds authority value writes while the user is typing
//! - [`latency`]: ping/pong round-trip estimate
//! - [`head`], [`history`]: head elements and the navigation stack
//! - [`style`]: inline style values
//! - [`error`]: fatal replay errors

pub mod client;
pub mod debounce;
pub mod dom;
pub mod error;
pub mod head;
pub mod history;
pub mod latency;
pub mod registry;
pub mod style;

pub use client::{Client, ClientAction, ClientConfig};
pub use dom::{Document, DomId, DomNodeKind, Element};
pub use error::ClientError;
pub use head::{Head, HeadElement};
pub use history::History;
pub use registry::NodeRegistry;
