//! Authority-side session state machine.
//!
//! A [`Session`] owns everything the authority knows about one connected
//! client: the node and callback registries, head elements, the reported
//! location and the outgoing [`Dispatcher`]. It is the host the rendering
//! collaborator drives, and the place client events are routed to callbacks.
//!
//! # Architecture: Action-Based State Machine
//!
//! Like the rest of this crate the session performs no I/O. Methods take the
//! current time where they need it, and everything that must leave the
//! process is collected as [`SessionAction`]s for the driver to execute.
//!
//! # Units of work
//!
//! Every synchronous unit of work runs with the flush lock held, so all of its
//! mutations reach the client as one frame:
//!
//! ```text
//! start:   lock ─► SetSessionToken ─► Renderer::mount ─► unlock ─► flush
//! event:   lock ─► handlers along path ─► Renderer::update ─► unlock
//!               ─► [DispatchEvent(perform_default)] ─► flush
//! render:  lock ─► Renderer::update ─► unlock ─► flush
//! ```
//!
//! The lock is released on every exit path, including failures.
//!
//! # Lifecycle
//!
//! ```text
//! ┌──────┐  idle timeout / protocol error / close()  ┌────────┐
//! │ Open │──────────────────────────────────────────►│ Closed │
//! └──────┘                                           └────────┘
//! ```

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use bytes::Bytes;
use tephra_proto::{
    AttrValue, Attrs, ClientEvent, DomEvent, HeadElementId, HistoryMethod, KeyDetails, Mutation,
    NodeId, Propagation, RemovedAttrs, ScrollOptions, decode_event,
};
use tracing::{debug, error, info, warn};

use crate::{
    callbacks::{Binding, CallbackRegistry},
    continuity::SessionToken,
    dispatcher::{Delivery, Dispatcher},
    error::{EventError, SessionError, StateError, TreeError},
    handler::{Handler, InputState, SyntheticEvent},
    head::HeadRegistry,
    history::SessionHistory,
    props::{PropValue, Props, changed_props, event_name, style_diff},
    registry::{NodeKind, NodeRegistry},
    render::Renderer,
    state::{StateSlots, StateSnapshot},
};

/// Actions returned by the session for the driver to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Send this encoded mutation frame to the client
    SendFrame(Bytes),

    /// Close the connection
    Close {
        /// Reason for closing the connection
        reason: String,
    },
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connected and serving
    Open,
    /// No longer accepts events or host operations
    Closed,
}

/// Session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Close the session after this long without client traffic. Must stay
    /// well above the client's ping interval.
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { idle_timeout: Duration::from_secs(30) }
    }
}

/// One client's view of the tree, on the authority.
#[derive(Debug)]
pub struct Session {
    token: SessionToken,
    state: SessionState,
    config: SessionConfig,
    last_activity: Instant,
    dispatcher: Dispatcher,
    nodes: NodeRegistry,
    callbacks: CallbackRegistry,
    props: HashMap<NodeId, Props>,
    head: HeadRegistry,
    history: SessionHistory,
    close_action: Option<SessionAction>,
}

impl Session {
    /// New open session at `location`.
    pub fn new(
        token: SessionToken,
        location: impl Into<String>,
        config: SessionConfig,
        now: Instant,
    ) -> Self {
        Self {
            token,
            state: SessionState::Open,
            config,
            last_activity: now,
            dispatcher: Dispatcher::new(),
            nodes: NodeRegistry::new(),
            callbacks: CallbackRegistry::new(),
            props: HashMap::new(),
            head: HeadRegistry::new(),
            history: SessionHistory::new(location),
            close_action: None,
        }
    }

    /// Session token.
    pub fn token(&self) -> &SessionToken {
        &self.token
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether the session still accepts work.
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Node registry.
    pub fn nodes(&self) -> &NodeRegistry {
        &self.nodes
    }

    /// Callback registry.
    pub fn callbacks(&self) -> &CallbackRegistry {
        &self.callbacks
    }

    /// Head elements.
    pub fn head(&self) -> &HeadRegistry {
        &self.head
    }

    /// Props last applied to `node`.
    pub fn props(&self, node: NodeId) -> Option<&Props> {
        self.props.get(&node)
    }

    /// Mutations queued for the next flush.
    pub fn queued(&self) -> &[Mutation] {
        self.dispatcher.queued()
    }

    /// Path the client last reported.
    pub fn location(&self) -> &str {
        self.history.path()
    }

    /// Run the initial render.
    ///
    /// `restored` is the state saved by a previous connection under this
    /// token, if any. A snapshot that no longer decodes degrades to a cold
    /// start.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the session is closed, `Tree` if the renderer misused
    /// the tree (the session is closed).
    pub fn start<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        restored: Option<&StateSnapshot>,
    ) -> Result<(), SessionError> {
        self.expect_open("start")?;

        let mut slots = match restored.map(StateSlots::from_snapshot).transpose() {
            Ok(slots) => slots.unwrap_or_default(),
            Err(error) => {
                warn!(session = %self.token, %error, "discarding unreadable snapshot");
                StateSlots::new()
            },
        };
        info!(session = %self.token, resumed = restored.is_some(), "session start");

        self.dispatcher.lock_flush();
        self.dispatcher.dispatch(
            Mutation::SetSessionToken { token: self.token.as_str().to_owned() },
            Delivery::Queued,
        );
        let result = renderer.mount(self, &mut slots);
        self.dispatcher.unlock_flush();
        self.check_render(result)?;

        self.dispatcher.request_flush();
        Ok(())
    }

    /// Re-render outside of event handling, e.g. after application state
    /// changed on a timer.
    ///
    /// # Errors
    ///
    /// As for [`Session::start`].
    pub fn render<R: Renderer + ?Sized>(&mut self, renderer: &mut R) -> Result<(), SessionError> {
        self.expect_open("render")?;
        self.dispatcher.lock_flush();
        let result = renderer.update(self);
        self.dispatcher.unlock_flush();
        self.check_render(result)?;
        self.dispatcher.request_flush();
        Ok(())
    }

    /// Handle one frame from the client.
    ///
    /// # Errors
    ///
    /// `Protocol` if the frame does not decode; the session is closed and the
    /// connection must be dropped. Otherwise as for
    /// [`Session::handle_event`].
    pub fn handle_frame<R: Renderer + ?Sized>(
        &mut self,
        frame: &[u8],
        renderer: &mut R,
        now: Instant,
    ) -> Result<(), SessionError> {
        self.expect_open("handle_frame")?;
        self.last_activity = now;

        let event = match decode_event(frame) {
            Ok(event) => event,
            Err(err) => {
                error!(session = %self.token, error = %err, len = frame.len(), "malformed event frame");
                self.close("protocol error");
                return Err(err.into());
            },
        };
        debug!(session = %self.token, kind = %event.kind(), "event frame");
        self.handle_event(event, renderer)
    }

    /// Route a decoded client event.
    ///
    /// Events that reference unknown nodes or missing bindings are logged and
    /// dropped; they never close the session.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the session is closed, `Tree` if the re-render
    /// misused the tree (the session is closed).
    pub fn handle_event<R: Renderer + ?Sized>(
        &mut self,
        event: ClientEvent,
        renderer: &mut R,
    ) -> Result<(), SessionError> {
        self.expect_open("handle_event")?;

        match event {
            ClientEvent::Ping { nonce } => {
                self.dispatcher.dispatch(Mutation::Pong { nonce }, Delivery::Immediate);
                Ok(())
            },
            ClientEvent::History { action, path } => {
                if self.history.observe(action, &path) {
                    self.render(renderer)?;
                }
                Ok(())
            },
            ClientEvent::Dom(event) => self.dispatch_dom(event, None, None, renderer),
            ClientEvent::DomInput(input) => {
                let observed = InputState { value: input.value, checked: input.checked };
                if let Err(err) = self.record_input(input.event.target, &observed) {
                    warn!(session = %self.token, error = %err, "dropping input event");
                    return Ok(());
                }
                self.dispatch_dom(input.event, Some(observed), None, renderer)
            },
            ClientEvent::DomKey(key) => self.dispatch_dom(key.event, None, Some(key.key), renderer),
        }
    }

    /// Close the session after `idle_timeout` without client traffic.
    pub fn tick(&mut self, now: Instant) {
        if self.is_open()
            && now.saturating_duration_since(self.last_activity) >= self.config.idle_timeout
        {
            self.close("idle timeout");
        }
    }

    /// Flush the queue unless locked. Returns whether a frame was produced.
    pub fn request_flush(&mut self) -> bool {
        self.dispatcher.request_flush()
    }

    /// Drain the actions the driver must execute, in order.
    pub fn take_actions(&mut self) -> Vec<SessionAction> {
        let mut actions: Vec<SessionAction> =
            self.dispatcher.take_frames().into_iter().map(SessionAction::SendFrame).collect();
        actions.extend(self.close_action.take());
        actions
    }

    /// Close the session. Frames already flushed are still handed out by
    /// [`Session::take_actions`], followed by the close.
    pub fn close(&mut self, reason: &str) {
        if !self.is_open() {
            return;
        }
        info!(session = %self.token, reason, "session closed");
        self.state = SessionState::Closed;
        self.close_action = Some(SessionAction::Close { reason: reason.to_owned() });
    }

    /// Capture the renderer's resumable state.
    ///
    /// # Errors
    ///
    /// `StateError::Encode` if a slot does not serialize.
    pub fn snapshot<R: Renderer + ?Sized>(
        &self,
        renderer: &R,
    ) -> Result<StateSnapshot, StateError> {
        let mut slots = StateSlots::new();
        renderer.snapshot(&mut slots)?;
        slots.to_snapshot()
    }

    /// Release everything after the connection is gone: unmount, drop unsent
    /// mutations and clear the registries. Id counters are not rewound.
    pub fn teardown<R: Renderer + ?Sized>(&mut self, renderer: &mut R) {
        if self.is_open() {
            self.dispatcher.lock_flush();
            renderer.unmount(self);
        }
        self.state = SessionState::Closed;
        self.dispatcher.discard();
        self.nodes.clear();
        self.callbacks.clear();
        self.props.clear();
        debug!(session = %self.token, "session torn down");
    }

    /// Force-retire the session because a newer connection took over its
    /// token. Returns the state to carry over; the session is closed and torn
    /// down.
    ///
    /// # Errors
    ///
    /// `StateError::Encode` if the state does not serialize. The session is
    /// retired regardless.
    pub fn retire<R: Renderer + ?Sized>(
        &mut self,
        renderer: &mut R,
    ) -> Result<StateSnapshot, StateError> {
        let snapshot = self.snapshot(renderer);
        self.close("superseded by a newer connection");
        self.teardown(renderer);
        snapshot
    }

    // Tree operations

    /// Create a detached element.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session is closed.
    pub fn create_element(&mut self, tag: &str) -> Result<NodeId, TreeError> {
        self.ensure_open()?;
        let node = self.nodes.create_element(tag);
        self.dispatcher
            .dispatch(Mutation::CreateElement { node, tag: tag.to_owned() }, Delivery::Queued);
        Ok(node)
    }

    /// Create a detached text node.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session is closed.
    pub fn create_text(&mut self, text: &str) -> Result<NodeId, TreeError> {
        self.ensure_open()?;
        let node = self.nodes.create_text();
        self.dispatcher
            .dispatch(Mutation::CreateText { node, text: text.to_owned() }, Delivery::Queued);
        Ok(node)
    }

    /// Replace a text node's content.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotText` if `node` is not a live text node.
    pub fn update_text(&mut self, node: NodeId, text: &str) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_text(node)?;
        self.dispatcher
            .dispatch(Mutation::UpdateText { node, text: text.to_owned() }, Delivery::Queued);
        Ok(())
    }

    /// Append `child` as the last child of `parent` (the root is allowed).
    ///
    /// # Errors
    ///
    /// Unknown nodes, a text parent, or a cycle.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.attach(parent, child, None)?;
        self.dispatcher.dispatch(Mutation::AppendChild { parent, child }, Delivery::Queued);
        Ok(())
    }

    /// Insert `child` under `parent` right before `before`.
    ///
    /// # Errors
    ///
    /// As for [`Session::append_child`], plus `NotAChild` if `before` is not
    /// a child of `parent`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        before: NodeId,
    ) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.attach(parent, child, Some(before))?;
        self.dispatcher
            .dispatch(Mutation::InsertBefore { parent, child, before }, Delivery::Queued);
        Ok(())
    }

    /// Remove `child` and its whole subtree. Their ids are never valid again.
    ///
    /// # Errors
    ///
    /// `NotAChild` if `child` is not currently under `parent`.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.ensure_open()?;
        let removed = self.nodes.remove(parent, child)?;
        for node in &removed {
            self.callbacks.remove_node(*node);
            self.props.remove(node);
        }
        debug!(session = %self.token, node = %child, subtree = removed.len(), "removed subtree");
        self.dispatcher.dispatch(Mutation::RemoveChild { parent, child }, Delivery::Queued);
        Ok(())
    }

    /// Apply the first set of props to a freshly created element.
    ///
    /// Handlers on event props are bound and sent as callback markers under
    /// the event name. `children` is skipped, as are null values.
    ///
    /// # Errors
    ///
    /// `HandlerOnNonEventProp` if a handler sits on a prop that does not name
    /// an event. Nothing is bound or sent in that case.
    pub fn set_initial_props(&mut self, node: NodeId, props: Props) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_element(node)?;

        let mut attrs = Attrs::new();
        let mut bindings = Vec::new();
        for (name, value) in &props {
            if name == "children" {
                continue;
            }
            match value {
                PropValue::Handler(handler) => {
                    let event = event_name(name).ok_or_else(|| {
                        TreeError::HandlerOnNonEventProp { node, prop: name.clone() }
                    })?;
                    attrs.insert(event.clone(), AttrValue::Callback);
                    bindings.push((event, handler.clone()));
                },
                PropValue::Value(AttrValue::Null) => {},
                PropValue::Value(_) if event_name(name).is_some() => {},
                PropValue::Value(value) => {
                    attrs.insert(name.clone(), value.clone());
                },
            }
        }

        self.callbacks.remove_node(node);
        for (event, handler) in bindings {
            self.callbacks.bind(node, &event, handler);
        }
        if let Some(state) = self.nodes.input_state_mut(node) {
            if let Some(value) = attrs.get("value") {
                state.value = value.to_string();
            }
            if let Some(checked) = attrs.get("checked").and_then(AttrValue::as_bool) {
                state.checked = checked;
            }
        }

        self.dispatcher.dispatch(Mutation::SetInitialAttrs { node, attrs }, Delivery::Queued);
        self.props.insert(node, props);
        Ok(())
    }

    /// Replace an element's props, sending only the difference.
    ///
    /// - A handler newly bound to an event installs a client listener; one
    ///   that merely changes identity is rebound silently.
    /// - A removed handler uninstalls the listener (`remove[event] = true`).
    /// - A removed plain value is sent as `remove[prop] = false`.
    /// - `style` is diffed per property.
    /// - On inputs, `value` and `checked` equal to what the client last
    ///   reported are dropped so the user's own edit is not echoed back.
    ///
    /// # Errors
    ///
    /// `HandlerOnNonEventProp` as for [`Session::set_initial_props`]. Nothing
    /// changes in that case.
    pub fn update_props(&mut self, node: NodeId, props: Props) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_element(node)?;

        let old = self.props.remove(&node).unwrap_or_default();
        let changed: Vec<String> =
            changed_props(&old, &props).into_iter().map(str::to_owned).collect();

        if let Some(prop) = changed.iter().find(|name| {
            name.as_str() != "children"
                && event_name(name).is_none()
                && props.get(name.as_str()).and_then(PropValue::as_handler).is_some()
        }) {
            let prop = prop.clone();
            self.props.insert(node, old);
            return Err(TreeError::HandlerOnNonEventProp { node, prop });
        }

        let mut update = Attrs::new();
        let mut remove = RemovedAttrs::new();
        for name in &changed {
            let name = name.as_str();
            if name == "children" {
                continue;
            }
            if name == "style" {
                let before = old.get(name).and_then(PropValue::as_value);
                let after = props.get(name).and_then(PropValue::as_value);
                if let Some(diff) = style_diff(before, after) {
                    update.insert(name.to_owned(), AttrValue::Map(diff));
                }
                continue;
            }
            if let Some(event) = event_name(name) {
                self.diff_handler(node, name, &event, &old, &props, &mut update, &mut remove);
                continue;
            }
            match props.get(name).and_then(PropValue::as_value) {
                Some(value) => {
                    update.insert(name.to_owned(), value.clone());
                },
                None => {
                    if old.get(name).and_then(PropValue::as_value).is_some() {
                        remove.insert(name.to_owned(), false);
                    }
                },
            }
        }

        if let Some(state) = self.nodes.input_state_mut(node) {
            suppress_echo(state, &mut update, &remove);
        }

        self.props.insert(node, props);
        if update.is_empty() && remove.is_empty() {
            return Ok(());
        }
        self.dispatcher.dispatch(Mutation::UpdateAttrs { node, update, remove }, Delivery::Queued);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn diff_handler(
        &mut self,
        node: NodeId,
        prop: &str,
        event: &str,
        old: &Props,
        new: &Props,
        update: &mut Attrs,
        remove: &mut RemovedAttrs,
    ) {
        match new.get(prop).and_then(PropValue::as_handler) {
            Some(handler) => {
                if self.callbacks.bind(node, event, handler.clone()) == Binding::Installed {
                    update.insert(event.to_owned(), AttrValue::Callback);
                }
            },
            None => {
                let had_handler = old.get(prop).and_then(PropValue::as_handler).is_some();
                if had_handler && self.callbacks.unbind(node, event) {
                    remove.insert(event.to_owned(), true);
                }
            },
        }
    }

    // Element commands

    /// Fire `click` on an element through the client's listeners.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotAnElement`.
    pub fn click(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.command(node, "click")
    }

    /// Move focus to an element.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotAnElement`.
    pub fn focus(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.command(node, "focus")
    }

    /// Remove focus from an element.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotAnElement`.
    pub fn blur(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.command(node, "blur")
    }

    /// Submit a form through its listeners.
    ///
    /// # Errors
    ///
    /// `NotAForm` if `node` is not a `form` element.
    pub fn submit(&mut self, node: NodeId) -> Result<(), TreeError> {
        self.ensure_open()?;
        if self.nodes.expect_element(node)?.tag() != Some("form") {
            return Err(TreeError::NotAForm(node));
        }
        self.command(node, "submit")
    }

    /// Scroll an element into view. Accepts [`ScrollOptions`] or the boolean
    /// align-to-top shorthand.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotAnElement`.
    pub fn scroll_into_view(
        &mut self,
        target: NodeId,
        options: impl Into<ScrollOptions>,
    ) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_element(target)?;
        self.dispatcher.dispatch(
            Mutation::ScrollIntoView { target, options: options.into() },
            Delivery::Queued,
        );
        self.dispatcher.request_flush();
        Ok(())
    }

    /// Fire a synthetic keyboard event (`keydown`, `keyup`, `keypress`).
    ///
    /// # Errors
    ///
    /// `UnknownNode` or `NotAnElement`.
    pub fn dispatch_key_event(
        &mut self,
        target: NodeId,
        name: &str,
        key: KeyDetails,
    ) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_element(target)?;
        self.dispatcher.dispatch(
            Mutation::DispatchKeyEvent { target, name: name.to_owned(), key },
            Delivery::Queued,
        );
        self.dispatcher.request_flush();
        Ok(())
    }

    fn command(&mut self, target: NodeId, name: &str) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.nodes.expect_element(target)?;
        self.dispatcher.dispatch(
            Mutation::DispatchEvent { target, name: name.to_owned(), perform_default: false },
            Delivery::Queued,
        );
        self.dispatcher.request_flush();
        Ok(())
    }

    // Head

    /// Add an element to the document head.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session is closed.
    pub fn append_head(&mut self, tag: &str, attrs: Attrs) -> Result<HeadElementId, TreeError> {
        self.ensure_open()?;
        let (element, mutation) = self.head.append(tag, attrs);
        self.dispatcher.dispatch(mutation, Delivery::Queued);
        self.dispatcher.request_flush();
        Ok(element)
    }

    /// Replace a head element. Nothing is sent if tag and attrs are unchanged.
    ///
    /// # Errors
    ///
    /// `UnknownHeadElement` if `element` is not live.
    pub fn update_head(
        &mut self,
        element: HeadElementId,
        tag: &str,
        attrs: Attrs,
    ) -> Result<(), TreeError> {
        self.ensure_open()?;
        if let Some(mutation) = self.head.update(element, tag, attrs)? {
            self.dispatcher.dispatch(mutation, Delivery::Queued);
            self.dispatcher.request_flush();
        }
        Ok(())
    }

    /// Remove a head element.
    ///
    /// # Errors
    ///
    /// `UnknownHeadElement` if `element` is not live.
    pub fn remove_head(&mut self, element: HeadElementId) -> Result<(), TreeError> {
        self.ensure_open()?;
        let mutation = self.head.remove(element)?;
        self.dispatcher.dispatch(mutation, Delivery::Queued);
        self.dispatcher.request_flush();
        Ok(())
    }

    // History

    /// Ask the client to navigate. The location changes once the client
    /// reports the move back.
    ///
    /// # Errors
    ///
    /// `SessionClosed` if the session is closed.
    pub fn navigate(&mut self, method: HistoryMethod) -> Result<(), TreeError> {
        self.ensure_open()?;
        self.dispatcher.dispatch(Mutation::History(method), Delivery::Queued);
        self.dispatcher.request_flush();
        Ok(())
    }

    // Event routing

    fn dispatch_dom<R: Renderer + ?Sized>(
        &mut self,
        event: DomEvent,
        input: Option<InputState>,
        key: Option<KeyDetails>,
        renderer: &mut R,
    ) -> Result<(), SessionError> {
        let handlers = match self.collect_handlers(&event) {
            Ok(handlers) => handlers,
            Err(err) => {
                warn!(session = %self.token, error = %err, "dropping event");
                return Ok(());
            },
        };

        let mut synthetic = SyntheticEvent::new(
            event.name.clone(),
            event.target,
            event.propagation.bubbles(),
            event.cancelable,
        );
        if let Some(input) = input {
            synthetic = synthetic.with_input(input);
        }
        if let Some(key) = key {
            synthetic = synthetic.with_key(key);
        }

        self.dispatcher.lock_flush();
        for (node, handler) in &handlers {
            synthetic.set_current_target(*node);
            handler.call(&mut synthetic);
            if synthetic.propagation_stopped() {
                debug!(session = %self.token, node = %node, event = %event.name, "propagation stopped");
                break;
            }
        }
        let result = renderer.update(self);
        self.dispatcher.unlock_flush();
        self.check_render(result)?;

        if event.cancelable && !synthetic.default_prevented() {
            if self.nodes.contains(event.target) {
                self.dispatcher.dispatch(
                    Mutation::DispatchEvent {
                        target: event.target,
                        name: event.name,
                        perform_default: true,
                    },
                    Delivery::Queued,
                );
            } else {
                debug!(session = %self.token, node = %event.target, "target removed, default skipped");
            }
        }
        self.dispatcher.request_flush();
        Ok(())
    }

    fn collect_handlers(&self, event: &DomEvent) -> Result<Vec<(NodeId, Handler)>, EventError> {
        let path = match &event.propagation {
            Propagation::Bubbling { composed_path } => composed_path.as_slice(),
            Propagation::NonBubbling => std::slice::from_ref(&event.target),
        };
        path.iter()
            .map(|&node| {
                if node.is_root() || !self.nodes.contains(node) {
                    return Err(EventError::UnknownNode { event: event.name.clone(), node });
                }
                self.callbacks
                    .get(node, &event.name)
                    .map(|handler| (node, handler.clone()))
                    .ok_or_else(|| EventError::MissingCallback { event: event.name.clone(), node })
            })
            .collect()
    }

    fn record_input(&mut self, node: NodeId, observed: &InputState) -> Result<(), EventError> {
        match self.nodes.get(node).map(|entry| entry.kind()) {
            Ok(NodeKind::Element { input: Some(_), .. }) => {},
            Ok(_) => return Err(EventError::NotAnInput(node)),
            Err(_) => {
                return Err(EventError::UnknownNode { event: "input".into(), node });
            },
        }
        if let Some(state) = self.nodes.input_state_mut(node) {
            state.clone_from(observed);
        }
        Ok(())
    }

    fn check_render(&mut self, result: Result<(), TreeError>) -> Result<(), SessionError> {
        result.map_err(|err| {
            error!(session = %self.token, error = %err, "render failed");
            self.close("render failed");
            SessionError::Tree(err)
        })
    }

    fn ensure_open(&self) -> Result<(), TreeError> {
        if self.is_open() { Ok(()) } else { Err(TreeError::SessionClosed) }
    }

    fn expect_open(&self, operation: &'static str) -> Result<(), SessionError> {
        if self.is_open() {
            Ok(())
        } else {
            Err(SessionError::InvalidState { state: self.state, operation })
        }
    }
}

/// Drop `value`/`checked` updates that match what the client reported, and
/// keep the tracked state in line with what is sent or removed.
fn suppress_echo(state: &mut InputState, update: &mut Attrs, remove: &RemovedAttrs) {
    match update.get("value").map(ToString::to_string) {
        Some(value) if value == state.value => {
            update.remove("value");
        },
        Some(value) => state.value = value,
        None if remove.contains_key("value") => state.value.clear(),
        None => {},
    }
    match update.get("checked").and_then(AttrValue::as_bool) {
        Some(checked) if checked == state.checked => {
            update.remove("checked");
        },
        Some(checked) => state.checked = checked,
        None if remove.contains_key("checked") => state.checked = false,
        None => {},
    }
}
