//! Per-node callback bindings.
//!
//! The client only ever learns that a node listens for an event; the handler
//! stays here. Rebinding an event to a different handler therefore never
//! touches the wire, while the first binding and the final unbinding each need
//! exactly one attribute change to install or uninstall the client listener.

use std::collections::HashMap;

use tephra_proto::NodeId;

use crate::handler::Handler;

/// Result of [`CallbackRegistry::bind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// First handler for this event on this node; the client needs a listener
    Installed,
    /// An existing binding now points at a new handler; nothing to send
    Replaced,
}

/// Callback bindings for one session.
#[derive(Debug, Default)]
pub struct CallbackRegistry {
    bindings: HashMap<NodeId, Vec<(String, Handler)>>,
}

impl CallbackRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `event` on `node`.
    pub fn bind(&mut self, node: NodeId, event: &str, handler: Handler) -> Binding {
        let list = self.bindings.entry(node).or_default();
        if let Some((_, existing)) = list.iter_mut().find(|(name, _)| name == event) {
            *existing = handler;
            return Binding::Replaced;
        }
        list.push((event.to_owned(), handler));
        Binding::Installed
    }

    /// Remove the binding for `event` on `node`. Returns whether one existed.
    pub fn unbind(&mut self, node: NodeId, event: &str) -> bool {
        let Some(list) = self.bindings.get_mut(&node) else {
            return false;
        };
        let before = list.len();
        list.retain(|(name, _)| name != event);
        let removed = list.len() != before;
        if list.is_empty() {
            self.bindings.remove(&node);
        }
        removed
    }

    /// Handler bound to `event` on `node`.
    pub fn get(&self, node: NodeId, event: &str) -> Option<&Handler> {
        self.bindings
            .get(&node)?
            .iter()
            .find_map(|(name, handler)| (name == event).then_some(handler))
    }

    /// Whether `node` has any binding for `event`.
    pub fn contains(&self, node: NodeId, event: &str) -> bool {
        self.get(node, event).is_some()
    }

    /// Event names bound on `node`, in binding order.
    pub fn events(&self, node: NodeId) -> impl Iterator<Item = &str> {
        self.bindings.get(&node).into_iter().flatten().map(|(name, _)| name.as_str())
    }

    /// Drop every binding of a removed node.
    pub fn remove_node(&mut self, node: NodeId) {
        self.bindings.remove(&node);
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.bindings.clear();
    }

    /// Number of nodes with at least one binding.
    pub fn node_count(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_bind_installs_then_replaces() {
        let mut reg = CallbackRegistry::new();
        let a = Handler::new(|_| {});
        let b = Handler::new(|_| {});

        assert_eq!(reg.bind(NodeId(1), "click", a), Binding::Installed);
        assert_eq!(reg.bind(NodeId(1), "click", b.clone()), Binding::Replaced);
        assert!(reg.get(NodeId(1), "click").is_some_and(|h| h.same(&b)));
        assert_eq!(reg.events(NodeId(1)).collect::<Vec<_>>(), vec!["click"]);
    }

    #[test]
    fn unbind_drops_empty_nodes() {
        let mut reg = CallbackRegistry::new();
        reg.bind(NodeId(1), "click", Handler::new(|_| {}));
        reg.bind(NodeId(1), "focus", Handler::new(|_| {}));

        assert!(reg.unbind(NodeId(1), "click"));
        assert!(!reg.unbind(NodeId(1), "click"));
        assert_eq!(reg.node_count(), 1);
        assert!(reg.unbind(NodeId(1), "focus"));
        assert_eq!(reg.node_count(), 0);
    }

    #[test]
    fn remove_node_clears_bindings() {
        let mut reg = CallbackRegistry::new();
        reg.bind(NodeId(3), "submit", Handler::new(|_| {}));
        reg.remove_node(NodeId(3));
        assert!(!reg.contains(NodeId(3), "submit"));
    }
}
