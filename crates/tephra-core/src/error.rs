//! Error types for the authority side.

use tephra_proto::{HeadElementId, NodeId, ProtocolError};
use thiserror::Error;

/// Misuse of the host tree by the rendering collaborator.
///
/// Returned before any mutation is queued, so a failed operation never leaves
/// a half-applied change on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Node was never created, or has been removed
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// The root container cannot be the subject of this operation
    #[error("root node cannot be used for {operation}")]
    RootNotAllowed {
        /// Operation attempted
        operation: &'static str,
    },

    /// Operation needs an element but got a text node
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// Operation needs a text node but got an element
    #[error("node {0} is not a text node")]
    NotText(NodeId),

    /// `child` is not currently a child of `parent`
    #[error("node {child} is not a child of {parent}")]
    NotAChild {
        /// Expected parent
        parent: NodeId,
        /// Node that was not found under it
        child: NodeId,
    },

    /// Attaching `child` under `parent` would make a node its own ancestor
    #[error("attaching {child} under {parent} would create a cycle")]
    Cycle {
        /// Requested parent
        parent: NodeId,
        /// Requested child
        child: NodeId,
    },

    /// A handler was supplied for a prop that does not name an event
    #[error("callback provided for non-event prop {prop} on {node}")]
    HandlerOnNonEventProp {
        /// Element
        node: NodeId,
        /// Prop name
        prop: String,
    },

    /// `submit` on something other than a `form`
    #[error("node {0} is not a form")]
    NotAForm(NodeId),

    /// Head element was never appended, or has been removed
    #[error("unknown head element {0}")]
    UnknownHeadElement(HeadElementId),

    /// Session has already closed
    #[error("session is closed")]
    SessionClosed,
}

/// Reasons a client event was dropped at the dispatch boundary.
///
/// None of these tear the session down; they are logged and the event is
/// discarded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    /// Event targets a node the authority does not know
    #[error("event {event} targets unknown node {node}")]
    UnknownNode {
        /// Event name
        event: String,
        /// Offending id
        node: NodeId,
    },

    /// Node exists but has no binding for the event
    #[error("no {event} callback bound on {node}")]
    MissingCallback {
        /// Event name
        event: String,
        /// Node without the binding
        node: NodeId,
    },

    /// Input event on something that is not a form control
    #[error("input event on non-input node {0}")]
    NotAnInput(NodeId),
}

/// Failure to capture or restore resumable state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// A slot could not be serialized
    #[error("failed to encode state slot: {0}")]
    Encode(String),

    /// Snapshot bytes are not a valid slot list
    #[error("failed to decode state snapshot: {0}")]
    Decode(String),
}

/// Fatal errors for a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Client sent a frame that does not decode
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Rendering collaborator misused the tree
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),

    /// Resumable state could not be handled
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// Operation not valid in the current lifecycle state
    #[error("invalid state {state:?} for operation {operation}")]
    InvalidState {
        /// Current state
        state: crate::session::SessionState,
        /// Attempted operation
        operation: &'static str,
    },
}
