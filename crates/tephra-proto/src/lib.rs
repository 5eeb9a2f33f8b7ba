//! Wire format for the Tephra protocol.
//!
//! Two binary formats share one set of primitives:
//!
//! - **Mutation frames** (authority to client) carry one or more
//!   [`Mutation`] records. Every record is self-delimiting so a flushed batch
//!   is just the concatenation of its records.
//! - **Event frames** (client to authority) carry exactly one
//!   [`ClientEvent`]. The leading varint selects the event decoder.
//!
//! ```text
//! mutation frame:  ┌─────┬─────┬──────┐┌─────┬─────┬──────┐
//!                  │ tag │ len │ body ││ tag │ len │ body │ ...
//!                  └─────┴─────┴──────┘└─────┴─────┴──────┘
//!
//! event frame:     ┌─────┬──────────────┐
//!                  │ tag │ body         │
//!                  └─────┴──────────────┘
//! ```
//!
//! Tags, lengths and ids are unsigned LEB128 varints. Attribute values are
//! encoded as a kind byte followed by a kind-specific payload (see
//! [`AttrValue`]) so that heterogeneous values survive the round trip without
//! string coercion.
//!
//! # Security
//!
//! Frames come from the network and are never trusted. Decoding rejects
//! unknown tags, truncated or overrunning bodies, invalid UTF-8, frames over
//! [`MAX_FRAME_SIZE`] and attribute values nested deeper than
//! [`MAX_VALUE_DEPTH`]. There is no partial recovery: a decode error means the
//! peers disagree about the protocol and the connection must be dropped.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
pub mod event;
pub mod ids;
pub mod mutation;
pub mod value;
mod wire;

pub use errors::{ProtocolError, Result};
pub use event::{
    ClientEvent, DomEvent, DomInputEvent, DomKeyEvent, EventKind, HistoryAction, KeyDetails,
    KeyModifiers, Propagation, decode_event, encode_event,
};
pub use ids::{HeadElementId, NodeId};
pub use mutation::{
    HistoryMethod, Mutation, MutationKind, RemovedAttrs, ScrollAlignment, ScrollBehavior,
    ScrollOptions, decode_mutations, encode_mutations,
};
pub use value::{AttrValue, Attrs};

/// Largest frame either decoder accepts (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Deepest nesting of list/map attribute values either side will encode or
/// decode.
pub const MAX_VALUE_DEPTH: usize = 32;

/// Cookie carrying the resume token on (re)connect.
pub const SESSION_TOKEN_COOKIE: &str = "tephra-session-token";

/// Attribute the client stamps on every element it creates so native events
/// can be mapped back to a [`NodeId`].
pub const NODE_ID_ATTR: &str = "data-tephra-node";
