//! Client-side node registry.
//!
//! Maps protocol ids to document nodes for the current connection and keeps
//! the listener table. A miss on any non-root id is a desync with the
//! authority and therefore fatal.
//!
//! Listeners are keyed by the *normalized* event name, the one the platform
//! actually fires: a `change` listener on a text-like control is installed as
//! `input`. The requested name is kept alongside because it is what gets
//! reported back to the authority.

use std::collections::{BTreeMap, HashMap};

use tephra_proto::NodeId;
use tracing::debug;

use crate::{
    dom::{DomId, Element},
    error::ClientError,
};

/// Platform event name a listener for `name` is installed under.
pub fn normalized_event_name<'a>(element: &Element, name: &'a str) -> &'a str {
    if element.is_text_like() && name == "change" { "input" } else { name }
}

/// Node and listener registry for one connection.
#[derive(Debug)]
pub struct NodeRegistry {
    root: DomId,
    nodes: HashMap<NodeId, DomId>,
    by_dom: HashMap<DomId, NodeId>,
    listeners: HashMap<NodeId, BTreeMap<String, String>>,
}

impl NodeRegistry {
    /// Empty registry over the document's root container.
    pub fn new(root: DomId) -> Self {
        Self { root, nodes: HashMap::new(), by_dom: HashMap::new(), listeners: HashMap::new() }
    }

    /// Track a created node.
    ///
    /// # Errors
    ///
    /// `DuplicateNode` if `id` is the root or already tracked.
    pub fn insert(&mut self, id: NodeId, dom: DomId) -> Result<(), ClientError> {
        if id.is_root() || self.nodes.contains_key(&id) {
            return Err(ClientError::DuplicateNode(id));
        }
        self.nodes.insert(id, dom);
        self.by_dom.insert(dom, id);
        Ok(())
    }

    /// Document node for `id`; the root never touches the map.
    ///
    /// # Errors
    ///
    /// `UnknownNode` for an id that is not tracked.
    pub fn get(&self, id: NodeId) -> Result<DomId, ClientError> {
        if id.is_root() {
            return Ok(self.root);
        }
        self.nodes.get(&id).copied().ok_or(ClientError::UnknownNode(id))
    }

    /// Protocol id of a tracked document node. The root has none.
    pub fn node_of(&self, dom: DomId) -> Option<NodeId> {
        self.by_dom.get(&dom).copied()
    }

    /// Whether `id` is tracked (the root always is).
    pub fn contains(&self, id: NodeId) -> bool {
        id.is_root() || self.nodes.contains_key(&id)
    }

    /// Stop tracking `id` and drop its listeners.
    pub fn remove(&mut self, id: NodeId) -> Option<DomId> {
        self.listeners.remove(&id);
        let dom = self.nodes.remove(&id)?;
        self.by_dom.remove(&dom);
        Some(dom)
    }

    /// Number of tracked nodes, excluding the root.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.by_dom.clear();
        self.listeners.clear();
    }

    /// Install a listener for `requested`, keyed by `normalized`.
    ///
    /// A different requested name already holding the same normalized slot
    /// is replaced.
    ///
    /// # Errors
    ///
    /// `ListenerAlreadyRegistered` if `requested` is already installed.
    pub fn add_listener(
        &mut self,
        node: NodeId,
        requested: &str,
        normalized: &str,
    ) -> Result<(), ClientError> {
        let table = self.listeners.entry(node).or_default();
        match table.get(normalized) {
            Some(existing) if existing == requested => {
                return Err(ClientError::ListenerAlreadyRegistered {
                    node,
                    event: requested.to_owned(),
                });
            },
            Some(existing) => {
                debug!(%node, replaced = %existing, with = requested, "listener slot replaced");
            },
            None => {},
        }
        table.insert(normalized.to_owned(), requested.to_owned());
        Ok(())
    }

    /// Uninstall the listener for `requested`.
    ///
    /// Removing a requested name whose slot was since taken by another name
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// `ListenerMissing` if nothing is installed under `normalized`.
    pub fn remove_listener(
        &mut self,
        node: NodeId,
        requested: &str,
        normalized: &str,
    ) -> Result<(), ClientError> {
        let missing = || ClientError::ListenerMissing { node, event: requested.to_owned() };
        let table = self.listeners.get_mut(&node).ok_or_else(missing)?;
        match table.get(normalized) {
            None => return Err(missing()),
            Some(existing) if existing != requested => {
                debug!(%node, requested, holder = %existing, "listener already superseded");
                return Ok(());
            },
            Some(_) => {},
        }
        table.remove(normalized);
        if table.is_empty() {
            self.listeners.remove(&node);
        }
        Ok(())
    }

    /// Requested event name of the listener installed under `normalized`.
    pub fn listener(&self, node: NodeId, normalized: &str) -> Option<&str> {
        self.listeners.get(&node)?.get(normalized).map(String::as_str)
    }

    /// Number of listeners on `node`.
    pub fn listener_count(&self, node: NodeId) -> usize {
        self.listeners.get(&node).map_or(0, BTreeMap::len)
    }
}
