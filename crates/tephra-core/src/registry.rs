//! Authority-side node registry.
//!
//! Tracks the shape of the tree the client currently holds so that tree
//! operations can be validated before any mutation is queued. Ids come from a
//! per-session counter that starts at 1 and is never rewound; [`NodeId::ROOT`]
//! is implicit and never stored.
//!
//! Removing a child drops its entire subtree. A removed id can never be
//! referenced again, which is what keeps late client events from reaching a
//! node that no longer exists.

use std::collections::HashMap;

use tephra_proto::NodeId;

use crate::{error::TreeError, handler::InputState};

/// Tags whose value and checked state the authority tracks.
pub const INPUT_TAGS: [&str; 3] = ["input", "textarea", "select"];

/// What a registered node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// Element with a tag
    Element {
        /// Tag name
        tag: String,
        /// Last known control state, for [`INPUT_TAGS`] elements
        input: Option<InputState>,
    },
    /// Text node
    Text,
}

/// One registered node.
#[derive(Debug, Clone)]
pub struct NodeEntry {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl NodeEntry {
    /// Node kind.
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Tag name, for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text => None,
        }
    }

    /// Current parent, if attached.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Node registry for one session.
#[derive(Debug)]
pub struct NodeRegistry {
    nodes: HashMap<NodeId, NodeEntry>,
    root_children: Vec<NodeId>,
    next_id: u64,
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeRegistry {
    /// Empty registry; the first allocated id is 1.
    pub fn new() -> Self {
        Self { nodes: HashMap::new(), root_children: Vec::new(), next_id: 1 }
    }

    fn allocate(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Register a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.allocate();
        let input = INPUT_TAGS.contains(&tag).then(InputState::default);
        self.nodes.insert(
            id,
            NodeEntry {
                kind: NodeKind::Element { tag: tag.to_owned(), input },
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    /// Register a detached text node.
    pub fn create_text(&mut self) -> NodeId {
        let id = self.allocate();
        self.nodes.insert(id, NodeEntry { kind: NodeKind::Text, parent: None, children: Vec::new() });
        id
    }

    /// Look up a node.
    pub fn get(&self, id: NodeId) -> Result<&NodeEntry, TreeError> {
        if id.is_root() {
            return Err(TreeError::RootNotAllowed { operation: "lookup" });
        }
        self.nodes.get(&id).ok_or(TreeError::UnknownNode(id))
    }

    /// Whether `id` is a live node (the root counts).
    pub fn contains(&self, id: NodeId) -> bool {
        id.is_root() || self.nodes.contains_key(&id)
    }

    /// Ensure `id` is a live element.
    pub fn expect_element(&self, id: NodeId) -> Result<&NodeEntry, TreeError> {
        let entry = self.get(id)?;
        match entry.kind {
            NodeKind::Element { .. } => Ok(entry),
            NodeKind::Text => Err(TreeError::NotAnElement(id)),
        }
    }

    /// Ensure `id` is a live text node.
    pub fn expect_text(&self, id: NodeId) -> Result<&NodeEntry, TreeError> {
        let entry = self.get(id)?;
        match entry.kind {
            NodeKind::Text => Ok(entry),
            NodeKind::Element { .. } => Err(TreeError::NotText(id)),
        }
    }

    /// Children of `parent`; the root is allowed.
    pub fn children(&self, parent: NodeId) -> Result<&[NodeId], TreeError> {
        if parent.is_root() {
            return Ok(&self.root_children);
        }
        Ok(&self.get(parent)?.children)
    }

    /// Control state of an input element.
    pub fn input_state(&self, id: NodeId) -> Option<&InputState> {
        match &self.nodes.get(&id)?.kind {
            NodeKind::Element { input, .. } => input.as_ref(),
            NodeKind::Text => None,
        }
    }

    /// Mutable control state of an input element.
    pub fn input_state_mut(&mut self, id: NodeId) -> Option<&mut InputState> {
        match &mut self.nodes.get_mut(&id)?.kind {
            NodeKind::Element { input, .. } => input.as_mut(),
            NodeKind::Text => None,
        }
    }

    /// Attach `child` under `parent`, before `before` or at the end.
    ///
    /// A child that is already attached elsewhere is moved. Everything is
    /// validated before the tree changes.
    pub fn attach(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: Option<NodeId>,
    ) -> Result<(), TreeError> {
        if child.is_root() {
            return Err(TreeError::RootNotAllowed { operation: "attach" });
        }
        if !parent.is_root() {
            self.expect_element(parent)?;
        }
        self.get(child)?;
        if let Some(before) = before
            && (before == child || !self.children(parent)?.contains(&before))
        {
            return Err(TreeError::NotAChild { parent, child: before });
        }
        if self.is_ancestor_or_self(child, parent) {
            return Err(TreeError::Cycle { parent, child });
        }

        self.unlink(child);
        let siblings = self.children_mut(parent)?;
        let index = before
            .and_then(|b| siblings.iter().position(|&n| n == b))
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        if let Some(entry) = self.nodes.get_mut(&child) {
            entry.parent = Some(parent);
        }
        Ok(())
    }

    /// Detach `child` from `parent` and drop its whole subtree.
    ///
    /// Returns the removed ids, `child` first.
    pub fn remove(&mut self, parent: NodeId, child: NodeId) -> Result<Vec<NodeId>, TreeError> {
        if child.is_root() {
            return Err(TreeError::RootNotAllowed { operation: "remove" });
        }
        if !self.children(parent)?.contains(&child) {
            return Err(TreeError::NotAChild { parent, child });
        }

        self.unlink(child);
        let mut removed = Vec::new();
        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.nodes.remove(&id) {
                stack.extend(entry.children.iter().rev());
                removed.push(id);
            }
        }
        Ok(removed)
    }

    /// Drop every node. The id counter keeps going.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root_children.clear();
    }

    /// Number of live nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn children_mut(&mut self, parent: NodeId) -> Result<&mut Vec<NodeId>, TreeError> {
        if parent.is_root() {
            return Ok(&mut self.root_children);
        }
        self.nodes
            .get_mut(&parent)
            .map(|entry| &mut entry.children)
            .ok_or(TreeError::UnknownNode(parent))
    }

    fn unlink(&mut self, child: NodeId) {
        let Some(old_parent) = self.nodes.get_mut(&child).and_then(|e| e.parent.take()) else {
            return;
        };
        if let Ok(siblings) = self.children_mut(old_parent) {
            siblings.retain(|&n| n != child);
        }
    }

    fn is_ancestor_or_self(&self, candidate: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(NodeEntry::parent);
        }
        false
    }
}
