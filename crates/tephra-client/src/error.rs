//! Client error types.

use tephra_proto::{NodeId, ProtocolError};
use thiserror::Error;

/// Fatal replay errors.
///
/// Every variant means the client and the authority no longer agree about the
/// tree or the protocol. The connection is dropped and a reconnect rebuilds
/// the view from scratch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Frame failed to decode
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Mutation referenced an id the client does not hold
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// Create mutation reused a live id
    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    /// Operation needs an element
    #[error("node {0} is not an element")]
    NotAnElement(NodeId),

    /// Operation needs a text node
    #[error("node {0} is not a text node")]
    NotText(NodeId),

    /// Tree edit the document rejected (wrong parent, cycle)
    #[error("invalid tree edit {operation} on {node}")]
    InvalidTreeEdit {
        /// Mutation name
        operation: &'static str,
        /// Node being moved or removed
        node: NodeId,
    },

    /// Listener for this event is already installed on the node
    #[error("{event} listener already registered on {node}")]
    ListenerAlreadyRegistered {
        /// Node
        node: NodeId,
        /// Requested event name
        event: String,
    },

    /// No listener to remove
    #[error("no {event} listener registered on {node}")]
    ListenerMissing {
        /// Node
        node: NodeId,
        /// Requested event name
        event: String,
    },

    /// `DispatchEvent` named something other than click, focus, blur, submit
    #[error("invalid default dispatch {event} on {node}")]
    InvalidDefaultDispatch {
        /// Target
        node: NodeId,
        /// Requested event
        event: String,
    },

    /// `submit` dispatched on something that is not a form
    #[error("submit dispatched on non-form node {0}")]
    SubmitOnNonForm(NodeId),

    /// A native event reached a listener from a target without a node id
    #[error("event {event} from untracked target")]
    UntrackedTarget {
        /// Native event name
        event: String,
    },

    /// Operation needs a live connection
    #[error("not connected")]
    NotConnected,
}
