//! Node and head-element identifiers.
//!
//! Both id spaces are allocated by the authority, per session, from
//! monotonically increasing counters. Ids are never recycled, so a stale id in
//! a late event can never alias a newer node.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a node in the synchronized tree.
///
/// [`NodeId::ROOT`] names the implicit container on the client. It is never
/// created, removed or allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl NodeId {
    /// The implicit document root.
    pub const ROOT: Self = Self(0);

    /// Whether this is the reserved root id.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier of an element in the document head.
///
/// Independent of [`NodeId`]; the first head element of a session is `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HeadElementId(pub u64);

impl fmt::Display for HeadElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "head#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_zero() {
        assert!(NodeId(0).is_root());
        assert!(!NodeId(1).is_root());
        assert_eq!(NodeId::ROOT.to_string(), "#0");
    }
}
