//! Authority-side event handlers and the event object they receive.

use std::{fmt, sync::Arc};

use tephra_proto::{KeyDetails, NodeId};

/// Opaque callback bound to an element's event prop.
///
/// Handlers compare by identity: two clones of the same handler are equal, two
/// separately constructed closures never are, even with identical code.
#[derive(Clone)]
pub struct Handler(Arc<dyn Fn(&mut SyntheticEvent) + Send + Sync>);

impl Handler {
    /// Wrap a closure.
    pub fn new(f: impl Fn(&mut SyntheticEvent) + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Invoke the handler.
    pub fn call(&self, event: &mut SyntheticEvent) {
        (self.0)(event);
    }

    /// Identity comparison.
    pub fn same(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Handler(..)")
    }
}

/// State of a form control as last reported by the client.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InputState {
    /// Current value
    pub value: String,
    /// Checked state
    pub checked: bool,
}

/// Event object passed to handlers.
///
/// Mirrors the subset of DOM event behavior the protocol can honor remotely:
/// cancellation of the deferred default action and stopping propagation along
/// the composed path.
#[derive(Debug, Clone)]
pub struct SyntheticEvent {
    name: String,
    target: NodeId,
    current_target: NodeId,
    bubbles: bool,
    cancelable: bool,
    default_prevented: bool,
    propagation_stopped: bool,
    input: Option<InputState>,
    key: Option<KeyDetails>,
}

impl SyntheticEvent {
    pub(crate) fn new(name: String, target: NodeId, bubbles: bool, cancelable: bool) -> Self {
        Self {
            name,
            target,
            current_target: target,
            bubbles,
            cancelable,
            default_prevented: false,
            propagation_stopped: false,
            input: None,
            key: None,
        }
    }

    pub(crate) fn with_input(mut self, input: InputState) -> Self {
        self.input = Some(input);
        self
    }

    pub(crate) fn with_key(mut self, key: KeyDetails) -> Self {
        self.key = Some(key);
        self
    }

    pub(crate) fn set_current_target(&mut self, node: NodeId) {
        self.current_target = node;
    }

    /// Event name, e.g. `click`.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Innermost element the event fired on.
    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Element whose handler is running.
    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    /// Whether the event bubbles.
    pub fn bubbles(&self) -> bool {
        self.bubbles
    }

    /// Whether the default action is waiting on this handler pass.
    pub fn cancelable(&self) -> bool {
        self.cancelable
    }

    /// Cancel the deferred default action. Ignored for non-cancelable events.
    pub fn prevent_default(&mut self) {
        if self.cancelable {
            self.default_prevented = true;
        }
    }

    /// Whether a handler cancelled the default action.
    pub fn default_prevented(&self) -> bool {
        self.default_prevented
    }

    /// Stop invoking handlers further along the composed path.
    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    /// Whether propagation was stopped.
    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }

    /// Control value, for input events.
    pub fn value(&self) -> Option<&str> {
        self.input.as_ref().map(|i| i.value.as_str())
    }

    /// Checked state, for input events.
    pub fn checked(&self) -> Option<bool> {
        self.input.as_ref().map(|i| i.checked)
    }

    /// Key description, for key events.
    pub fn key(&self) -> Option<&KeyDetails> {
        self.key.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_comparison() {
        let a = Handler::new(|_| {});
        let b = Handler::new(|_| {});
        assert!(a.same(&a.clone()));
        assert!(!a.same(&b));
    }

    #[test]
    fn prevent_default_needs_cancelable() {
        let mut e = SyntheticEvent::new("input".into(), NodeId(1), true, false);
        e.prevent_default();
        assert!(!e.default_prevented());

        let mut e = SyntheticEvent::new("click".into(), NodeId(1), false, true);
        e.prevent_default();
        assert!(e.default_prevented());
    }
}
