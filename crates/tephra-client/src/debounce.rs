//! Debounced value sync for text-like controls.
//!
//! An authority `value` write races whatever the user is typing. Applying it
//! right away would clobber keystrokes the authority has not seen yet, so the
//! write is held until `margin` has passed since the last local interaction
//! on that node. A keystroke while a write is pending pushes it back a full
//! margin; a newer write replaces the pending one.
//!
//! ```text
//!  keystroke ──► rebounce(node, now) ──► last_interaction[node] = now
//!                                        pending[node].due = now + margin
//!
//!  UpdateAttrs{value} ──► schedule(node, value, now)
//!        no interaction / already past margin ──► apply now
//!        otherwise ──► pending[node] = (last_interaction + margin, value)
//! ```
//!
//! Deadlines are plain [`Instant`]s; the embedder calls
//! [`Debouncer::take_due`] from its timer.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tephra_proto::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pending {
    due: Instant,
    value: String,
}

/// Pending value writes, per node.
#[derive(Debug, Default)]
pub struct Debouncer {
    last_interaction: HashMap<NodeId, Instant>,
    pending: HashMap<NodeId, Pending>,
}

impl Debouncer {
    /// Nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a value write. Returns the value back if it should be applied
    /// immediately.
    pub fn schedule(
        &mut self,
        node: NodeId,
        value: String,
        now: Instant,
        margin: Duration,
    ) -> Option<String> {
        let Some(last) = self.last_interaction.get(&node) else {
            self.pending.remove(&node);
            return Some(value);
        };
        let due = *last + margin;
        if due <= now {
            self.pending.remove(&node);
            return Some(value);
        }
        self.pending.insert(node, Pending { due, value });
        None
    }

    /// Record a local interaction, pushing back any pending write.
    pub fn rebounce(&mut self, node: NodeId, now: Instant, margin: Duration) {
        self.last_interaction.insert(node, now);
        if let Some(pending) = self.pending.get_mut(&node) {
            pending.due = now + margin;
        }
    }

    /// Remove and return the writes due at `now`, earliest first.
    pub fn take_due(&mut self, now: Instant) -> Vec<(NodeId, String)> {
        let mut due: Vec<(Instant, NodeId)> = self
            .pending
            .iter()
            .filter(|(_, p)| p.due <= now)
            .map(|(node, p)| (p.due, *node))
            .collect();
        due.sort();
        due.into_iter()
            .filter_map(|(_, node)| self.pending.remove(&node).map(|p| (node, p.value)))
            .collect()
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|p| p.due).min()
    }

    /// Pending value for `node`.
    pub fn pending(&self, node: NodeId) -> Option<&str> {
        self.pending.get(&node).map(|p| p.value.as_str())
    }

    /// Forget a removed node.
    pub fn forget(&mut self, node: NodeId) {
        self.last_interaction.remove(&node);
        self.pending.remove(&node);
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        self.last_interaction.clear();
        self.pending.clear();
    }
}
