//! Client replay engine.
//!
//! The [`Client`] owns a [`Document`] and keeps it in lockstep with the
//! authority's tree by replaying mutation frames in order. It is a pure state
//! machine: frames and timer ticks go in, [`ClientAction`]s come out, and the
//! embedder owns the socket and the clock.
//!
//! ```text
//!   on_frame(bytes) ──► decode ──► apply each mutation ──► Document
//!                                        │
//!                                        ├─ Callback attr ──► install listener
//!                                        └─ DispatchEvent ──► native event
//!
//!   click/input/key ──► native event ──► listener? ──► forward ──► Send(event)
//!                                            │
//!                                            └─ defers default? prevent, wait
//!                                               for DispatchEvent from the
//!                                               authority
//! ```
//!
//! # Errors
//!
//! Any error while applying a frame means the two sides disagree about the
//! tree. The connection is dropped, [`ClientAction::Close`] is queued and a
//! later reconnect rebuilds the view from the authority's `SetSessionToken`.
//!
//! # Forwarding
//!
//! Every installed listener stops propagation and forwards the event with the
//! requested (not normalized) name. For `click`, `submit`, `focus` and `blur`
//! the native default is prevented and only performed when the authority
//! answers with `DispatchEvent { perform_default: true }`. That dispatch sets
//! a guard for `(target, name)` so the re-fired event is not forwarded a
//! second time.

use std::time::{Duration, Instant};

use bytes::Bytes;
use tephra_proto::{
    AttrValue, ClientEvent, DomEvent, DomInputEvent, DomKeyEvent, HistoryAction, HistoryMethod,
    KeyDetails, Mutation, NODE_ID_ATTR, NodeId, Propagation, ScrollOptions, decode_mutations,
    encode_event,
};
use tracing::{debug, error, info, trace};

use crate::{
    debounce::Debouncer,
    dom::{Document, DomId},
    error::ClientError,
    head::Head,
    history::History,
    latency::LatencyProbe,
    registry::{NodeRegistry, normalized_event_name},
    style::style_value,
};

/// Client timing configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Scheduling slack; the input debounce margin is latency plus twice this
    pub jitter: Duration,
    /// Interval between latency pings while the page is visible
    pub ping_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { jitter: Duration::from_millis(20), ping_interval: Duration::from_secs(5) }
    }
}

/// Effects produced by the client.
///
/// The embedder executes these; the client never touches I/O itself.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientAction {
    /// Send an encoded event frame
    Send(Bytes),
    /// Store the session token so the next connect can present it
    PersistToken(String),
    /// Open a new connection
    Reconnect,
    /// The connection is unusable and must be closed
    Close {
        /// Why the client gave up
        reason: String,
    },
    /// A native default action ran
    DefaultPerformed {
        /// Node the default ran on
        target: NodeId,
        /// Event name
        event: String,
    },
    /// A form was submitted natively
    SubmitForm {
        /// The form
        form: NodeId,
    },
    /// Scroll a node into view
    ScrollIntoView {
        /// Node to reveal
        target: NodeId,
        /// Scroll options
        options: ScrollOptions,
    },
}

/// Per-connection state, dropped on disconnect.
#[derive(Debug)]
struct Connection {
    registry: NodeRegistry,
    debounce: Debouncer,
    established: bool,
}

/// A native event travelling through the document.
#[derive(Debug, Clone)]
struct NativeEvent {
    name: String,
    key: Option<KeyDetails>,
}

impl NativeEvent {
    fn new(name: &str) -> Self {
        Self { name: name.to_owned(), key: None }
    }

    fn keyboard(name: &str, key: KeyDetails) -> Self {
        Self { name: name.to_owned(), key: Some(key) }
    }

    fn bubbles(&self) -> bool {
        !matches!(self.name.as_str(), "focus" | "blur")
    }
}

/// Events whose native default waits for the authority.
fn defers_default(name: &str) -> bool {
    matches!(name, "click" | "submit" | "focus" | "blur")
}

fn tree_edit(ok: bool, operation: &'static str, node: NodeId) -> Result<(), ClientError> {
    if ok { Ok(()) } else { Err(ClientError::InvalidTreeEdit { operation, node }) }
}

fn text_of(value: &AttrValue) -> String {
    match value {
        AttrValue::Null => String::new(),
        other => other.to_string(),
    }
}

/// Client replay engine.
#[derive(Debug)]
pub struct Client {
    config: ClientConfig,
    document: Document,
    head: Head,
    history: History,
    probe: LatencyProbe,
    visible: bool,
    token: Option<String>,
    connection: Option<Connection>,
    guard: Option<(DomId, String)>,
    actions: Vec<ClientAction>,
}

impl Client {
    /// Disconnected client showing `location`.
    pub fn new(config: ClientConfig, location: impl Into<String>) -> Self {
        let probe = LatencyProbe::new(config.ping_interval);
        Self {
            config,
            document: Document::new(),
            head: Head::new(),
            history: History::new(location),
            probe,
            visible: true,
            token: None,
            connection: None,
            guard: None,
            actions: Vec::new(),
        }
    }

    /// Last token received from the authority.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    /// The replayed document.
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Head elements.
    pub fn head(&self) -> &Head {
        &self.head
    }

    /// Navigation history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// Latest round-trip estimate.
    pub fn latency(&self) -> Duration {
        self.probe.latency()
    }

    /// Debounce margin for authority value writes.
    pub fn input_debounce(&self) -> Duration {
        self.probe.latency() + self.config.jitter * 2
    }

    /// Whether a connection is open.
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Whether the page is visible.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Registry of the current connection.
    pub fn registry(&self) -> Option<&NodeRegistry> {
        self.connection.as_ref().map(|c| &c.registry)
    }

    /// Document node for a protocol id.
    pub fn dom(&self, node: NodeId) -> Option<DomId> {
        self.registry()?.get(node).ok()
    }

    /// Authority value write waiting out the debounce.
    pub fn pending_value(&self, node: NodeId) -> Option<&str> {
        self.connection.as_ref()?.debounce.pending(node)
    }

    /// A transport connection opened.
    pub fn on_connected(&mut self) {
        info!(resume = self.token.is_some(), "connected");
        self.connection = Some(Connection {
            registry: NodeRegistry::new(self.document.root()),
            debounce: Debouncer::new(),
            established: false,
        });
    }

    /// Replay one mutation frame.
    ///
    /// # Errors
    ///
    /// `NotConnected` without a connection. Any other error is fatal: the
    /// connection has already been dropped and `Close` queued.
    pub fn on_frame(&mut self, frame: &[u8], now: Instant) -> Result<(), ClientError> {
        if self.connection.is_none() {
            return Err(ClientError::NotConnected);
        }
        let batch = match decode_mutations(frame) {
            Ok(batch) => batch,
            Err(e) => return Err(self.fail(e.into())),
        };
        trace!(mutations = batch.len(), "replaying frame");
        for mutation in batch {
            if let Err(e) = self.apply(mutation, now) {
                return Err(self.fail(e));
            }
        }
        Ok(())
    }

    /// The transport connection closed.
    pub fn on_disconnected(&mut self) {
        if self.connection.take().is_some() {
            info!("disconnected");
        }
        self.probe.reset();
        self.guard = None;
    }

    /// Page visibility changed.
    ///
    /// Becoming visible while disconnected requests a reconnect; otherwise
    /// visibility only starts and stops the latency pings.
    pub fn set_visible(&mut self, visible: bool, now: Instant) {
        let was_visible = std::mem::replace(&mut self.visible, visible);
        if !visible {
            self.probe.pause();
            return;
        }
        if was_visible {
            return;
        }
        match self.connection.as_ref().map(|c| c.established) {
            None => {
                debug!("visible while disconnected, reconnecting");
                self.actions.push(ClientAction::Reconnect);
            },
            Some(true) => {
                self.probe.start(now);
                self.poll_ping(now);
            },
            Some(false) => {},
        }
    }

    /// Drive timers: due debounced writes and latency pings.
    pub fn tick(&mut self, now: Instant) {
        let Some(conn) = self.connection.as_mut() else { return };
        for (node, value) in conn.debounce.take_due(now) {
            match conn.registry.get(node) {
                Ok(dom) => {
                    self.document.set_value(dom, &value);
                },
                Err(_) => debug!(%node, "debounced write for removed node"),
            }
        }
        self.poll_ping(now);
    }

    /// Earliest instant [`Client::tick`] has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let debounce = self.connection.as_ref().and_then(|c| c.debounce.next_deadline());
        [debounce, self.probe.next_deadline()].into_iter().flatten().min()
    }

    /// Drain queued actions.
    pub fn take_actions(&mut self) -> Vec<ClientAction> {
        std::mem::take(&mut self.actions)
    }

    /// User clicks `node`.
    ///
    /// # Errors
    ///
    /// Lookup errors for `node`, or `NotConnected`.
    pub fn click(&mut self, node: NodeId, now: Instant) -> Result<(), ClientError> {
        let dom = self.resolve_element(node)?;
        self.dispatch_native(dom, NativeEvent::new("click"), now)
    }

    /// User edits a control to `value`.
    ///
    /// Fires `input`, and `change` for a `select`.
    ///
    /// # Errors
    ///
    /// Lookup errors for `node`, or `NotConnected`.
    pub fn input(&mut self, node: NodeId, value: &str, now: Instant) -> Result<(), ClientError> {
        let dom = self.resolve_element(node)?;
        self.document.set_value(dom, value);
        self.dispatch_native(dom, NativeEvent::new("input"), now)?;
        if self.document.element(dom).is_some_and(|e| e.tag() == "select") {
            self.dispatch_native(dom, NativeEvent::new("change"), now)?;
        }
        Ok(())
    }

    /// User presses a key on `node`.
    ///
    /// # Errors
    ///
    /// Lookup errors for `node`, or `NotConnected`.
    pub fn key(
        &mut self,
        node: NodeId,
        name: &str,
        key: KeyDetails,
        now: Instant,
    ) -> Result<(), ClientError> {
        let dom = self.resolve_element(node)?;
        self.dispatch_native(dom, NativeEvent::keyboard(name, key), now)
    }

    /// User focuses `node`.
    ///
    /// # Errors
    ///
    /// Lookup errors for `node`, or `NotConnected`.
    pub fn focus(&mut self, node: NodeId, now: Instant) -> Result<(), ClientError> {
        let dom = self.resolve_element(node)?;
        self.dispatch_native(dom, NativeEvent::new("focus"), now)
    }

    /// User moves focus away from `node`.
    ///
    /// # Errors
    ///
    /// Lookup errors for `node`, or `NotConnected`.
    pub fn blur(&mut self, node: NodeId, now: Instant) -> Result<(), ClientError> {
        let dom = self.resolve_element(node)?;
        self.dispatch_native(dom, NativeEvent::new("blur"), now)
    }

    /// User submits `form`, e.g. by pressing enter in one of its fields.
    ///
    /// # Errors
    ///
    /// `SubmitOnNonForm` if `form` is not a form, lookup errors, or
    /// `NotConnected`.
    pub fn submit(&mut self, form: NodeId, now: Instant) -> Result<(), ClientError> {
        let dom = self.resolve_element(form)?;
        if !self.document.element(dom).is_some_and(|e| e.tag() == "form") {
            return Err(ClientError::SubmitOnNonForm(form));
        }
        self.dispatch_native(dom, NativeEvent::new("submit"), now)
    }

    /// Browser back button. Returns whether the history moved.
    pub fn back(&mut self) -> bool {
        self.go(-1)
    }

    /// Browser forward button. Returns whether the history moved.
    pub fn forward(&mut self) -> bool {
        self.go(1)
    }

    fn go(&mut self, delta: i64) -> bool {
        match self.history.go(delta) {
            Some(action) => {
                self.report_history(action);
                true
            },
            None => false,
        }
    }

    fn fail(&mut self, err: ClientError) -> ClientError {
        error!(error = %err, "replay failed, dropping connection");
        self.connection = None;
        self.probe.reset();
        self.guard = None;
        self.actions.push(ClientAction::Close { reason: err.to_string() });
        err
    }

    fn conn(&mut self) -> Result<&mut Connection, ClientError> {
        self.connection.as_mut().ok_or(ClientError::NotConnected)
    }

    fn resolve(&self, node: NodeId) -> Result<DomId, ClientError> {
        self.connection.as_ref().ok_or(ClientError::NotConnected)?.registry.get(node)
    }

    fn resolve_element(&self, node: NodeId) -> Result<DomId, ClientError> {
        let dom = self.resolve(node)?;
        if self.document.element(dom).is_none() {
            return Err(ClientError::NotAnElement(node));
        }
        Ok(dom)
    }

    fn tracked(&self, dom: DomId) -> Option<NodeId> {
        self.connection.as_ref()?.registry.node_of(dom)
    }

    fn send(&mut self, event: &ClientEvent) {
        if self.connection.is_some() {
            self.actions.push(ClientAction::Send(encode_event(event)));
        }
    }

    fn poll_ping(&mut self, now: Instant) {
        if let Some(nonce) = self.probe.poll(now) {
            self.send(&ClientEvent::Ping { nonce });
        }
    }

    fn report_history(&mut self, action: HistoryAction) {
        let path = self.history.current().to_owned();
        debug!(?action, %path, "history moved");
        self.send(&ClientEvent::History { action, path });
    }

    fn apply(&mut self, mutation: Mutation, now: Instant) -> Result<(), ClientError> {
        trace!(kind = %mutation.kind(), "apply");
        match mutation {
            Mutation::SetSessionToken { token } => self.establish(token, now),
            Mutation::CreateElement { node, tag } => {
                self.ensure_fresh(node)?;
                let dom = self.document.create_element(&tag);
                self.document.set_attribute(dom, NODE_ID_ATTR, &node.0.to_string());
                self.conn()?.registry.insert(node, dom)
            },
            Mutation::CreateText { node, text } => {
                self.ensure_fresh(node)?;
                let dom = self.document.create_text(&text);
                self.conn()?.registry.insert(node, dom)
            },
            Mutation::UpdateText { node, text } => {
                let dom = self.resolve(node)?;
                if self.document.set_text(dom, &text) {
                    Ok(())
                } else {
                    Err(ClientError::NotText(node))
                }
            },
            Mutation::AppendChild { parent, child } => {
                let parent = self.resolve_element(parent)?;
                let dom = self.resolve(child)?;
                tree_edit(self.document.append_child(parent, dom), "append_child", child)
            },
            Mutation::InsertBefore { parent, child, before } => {
                let parent_dom = self.resolve_element(parent)?;
                let dom = self.resolve(child)?;
                let before_dom = self.resolve(before)?;
                if self.document.parent(before_dom) != Some(parent_dom) {
                    return Err(ClientError::InvalidTreeEdit {
                        operation: "insert_before",
                        node: before,
                    });
                }
                tree_edit(
                    self.document.insert_before(parent_dom, dom, before_dom),
                    "insert_before",
                    child,
                )
            },
            Mutation::RemoveChild { parent, child } => self.remove_child(parent, child),
            Mutation::SetInitialAttrs { node, attrs } => {
                let dom = self.resolve_element(node)?;
                for (name, value) in &attrs {
                    self.set_attr(node, dom, name, value, true, now)?;
                }
                Ok(())
            },
            Mutation::UpdateAttrs { node, update, remove } => {
                let dom = self.resolve_element(node)?;
                for (name, value) in &update {
                    self.set_attr(node, dom, name, value, false, now)?;
                }
                for (name, was_callback) in &remove {
                    self.remove_attr(node, dom, name, *was_callback)?;
                }
                Ok(())
            },
            Mutation::ScrollIntoView { target, options } => {
                self.resolve_element(target)?;
                self.actions.push(ClientAction::ScrollIntoView { target, options });
                Ok(())
            },
            Mutation::DispatchEvent { target, name, perform_default } => {
                self.authority_dispatch(target, &name, perform_default, now)
            },
            Mutation::DispatchKeyEvent { target, name, key } => {
                let dom = self.resolve_element(target)?;
                self.dispatch_native(dom, NativeEvent::keyboard(&name, key), now)
            },
            Mutation::Pong { nonce } => {
                self.probe.on_pong(nonce, now);
                Ok(())
            },
            Mutation::AppendOrUpdateHead { element, tag, attrs } => {
                self.head.append_or_update(element, &tag, &attrs);
                Ok(())
            },
            Mutation::DeleteHead { element } => {
                self.head.delete(element);
                Ok(())
            },
            Mutation::History(method) => {
                let action = match method {
                    HistoryMethod::Push(path) => Some(self.history.push(&path)),
                    HistoryMethod::Replace(path) => Some(self.history.replace(&path)),
                    HistoryMethod::Go(delta) => self.history.go(delta),
                };
                match action {
                    Some(action) => self.report_history(action),
                    None => debug!("history move out of range"),
                }
                Ok(())
            },
        }
    }

    fn establish(&mut self, token: String, now: Instant) -> Result<(), ClientError> {
        self.document.clear_root();
        self.head.clear();
        self.guard = None;
        let conn = self.conn()?;
        conn.registry.clear();
        conn.debounce.clear();
        conn.established = true;
        info!("session established");
        self.token = Some(token.clone());
        self.actions.push(ClientAction::PersistToken(token));
        if self.visible {
            self.probe.start(now);
            self.poll_ping(now);
        }
        Ok(())
    }

    fn ensure_fresh(&mut self, node: NodeId) -> Result<(), ClientError> {
        if self.conn()?.registry.contains(node) {
            return Err(ClientError::DuplicateNode(node));
        }
        Ok(())
    }

    fn remove_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), ClientError> {
        let parent_dom = self.resolve_element(parent)?;
        let dom = self.resolve(child)?;
        if self.document.parent(dom) != Some(parent_dom) {
            return Err(ClientError::InvalidTreeEdit { operation: "remove_child", node: child });
        }
        let removed = self.document.remove_subtree(dom);
        let conn = self.conn()?;
        for dom in removed {
            if let Some(node) = conn.registry.node_of(dom) {
                conn.registry.remove(node);
                conn.debounce.forget(node);
            }
        }
        Ok(())
    }

    fn set_attr(
        &mut self,
        node: NodeId,
        dom: DomId,
        name: &str,
        value: &AttrValue,
        initial: bool,
        now: Instant,
    ) -> Result<(), ClientError> {
        let element = self.document.element(dom).ok_or(ClientError::NotAnElement(node))?;
        let form_control = element.is_form_control();
        let is_select = element.tag() == "select";
        let is_input = element.tag() == "input";
        let slot = normalized_event_name(element, name);

        match name {
            _ if value.is_callback() => {
                self.conn()?.registry.add_listener(node, name, slot)?;
            },
            "style" => match value.as_map() {
                Some(styles) => {
                    for (property, v) in styles {
                        let css = style_value(property, v).unwrap_or_default();
                        self.document.set_style(dom, property, &css);
                    }
                },
                None => {
                    self.document.set_attribute(dom, "style", &text_of(value));
                },
            },
            "className" => {
                self.document.set_attribute(dom, "class", &text_of(value));
            },
            "value" if form_control => {
                let text = text_of(value);
                if initial || is_select {
                    self.document.set_value(dom, &text);
                } else {
                    let margin = self.input_debounce();
                    if let Some(text) = self.conn()?.debounce.schedule(node, text, now, margin) {
                        self.document.set_value(dom, &text);
                    }
                }
            },
            "checked" if is_input => {
                self.document.set_checked(dom, value.as_bool().unwrap_or(false));
            },
            _ => {
                self.document.set_attribute(dom, name, &text_of(value));
            },
        }
        Ok(())
    }

    fn remove_attr(
        &mut self,
        node: NodeId,
        dom: DomId,
        name: &str,
        was_callback: bool,
    ) -> Result<(), ClientError> {
        let element = self.document.element(dom).ok_or(ClientError::NotAnElement(node))?;
        let form_control = element.is_form_control();
        let slot = normalized_event_name(element, name);

        match name {
            _ if was_callback => {
                self.conn()?.registry.remove_listener(node, name, slot)?;
            },
            "style" => {
                self.document.clear_style(dom);
                self.document.remove_attribute(dom, "style");
            },
            "className" => {
                self.document.remove_attribute(dom, "class");
            },
            "value" if form_control => {
                self.document.set_value(dom, "");
            },
            "checked" => {
                self.document.set_checked(dom, false);
            },
            _ => {
                self.document.remove_attribute(dom, name);
            },
        }
        Ok(())
    }

    fn authority_dispatch(
        &mut self,
        target: NodeId,
        name: &str,
        perform_default: bool,
        now: Instant,
    ) -> Result<(), ClientError> {
        let dom = self.resolve_element(target)?;
        if !defers_default(name) {
            return Err(ClientError::InvalidDefaultDispatch {
                node: target,
                event: name.to_owned(),
            });
        }
        if name == "submit" && !self.document.element(dom).is_some_and(|e| e.tag() == "form") {
            return Err(ClientError::SubmitOnNonForm(target));
        }
        debug!(%target, event = name, perform_default, "authority dispatch");

        if !perform_default {
            return self.dispatch_native(dom, NativeEvent::new(name), now);
        }
        if name == "submit" {
            // listeners already saw the original submit
            return self.perform_default(dom, name, now);
        }
        let previous = self.guard.replace((dom, name.to_owned()));
        let result = self.dispatch_native(dom, NativeEvent::new(name), now);
        self.guard = previous;
        result
    }

    fn dispatch_native(
        &mut self,
        target: DomId,
        event: NativeEvent,
        now: Instant,
    ) -> Result<(), ClientError> {
        if self.fire(target, &event, now)? {
            self.perform_default(target, &event.name, now)?;
        }
        Ok(())
    }

    /// Walk the propagation path and forward to the first listener. Returns
    /// whether the native default may run.
    fn fire(
        &mut self,
        target: DomId,
        event: &NativeEvent,
        now: Instant,
    ) -> Result<bool, ClientError> {
        let path =
            if event.bubbles() { self.document.ancestors(target) } else { vec![target] };
        for current in path {
            let Some(node) = self.tracked(current) else { continue };
            let Some(requested) = self
                .connection
                .as_ref()
                .and_then(|c| c.registry.listener(node, &event.name))
                .map(str::to_owned)
            else {
                continue;
            };
            if self.guard.as_ref().is_some_and(|(dom, name)| *dom == target && *name == event.name)
            {
                trace!(%node, event = %event.name, "authority dispatch not forwarded");
                return Ok(true);
            }
            self.forward_event(node, current, target, &requested, event, now)?;
            return Ok(!defers_default(&requested));
        }
        Ok(true)
    }

    fn forward_event(
        &mut self,
        node: NodeId,
        listener: DomId,
        target: DomId,
        requested: &str,
        event: &NativeEvent,
        now: Instant,
    ) -> Result<(), ClientError> {
        let target_id = self
            .document
            .node_id(target)
            .ok_or_else(|| ClientError::UntrackedTarget { event: event.name.clone() })?;
        let propagation = if event.bubbles() {
            self.propagation(listener, target_id, requested)
        } else {
            Propagation::NonBubbling
        };
        let dom_event = DomEvent {
            target: target_id,
            name: requested.to_owned(),
            cancelable: defers_default(requested),
            propagation,
        };
        let control = self
            .document
            .element(target)
            .filter(|e| e.is_form_control())
            .map(|e| (e.value().to_owned(), e.tag() == "input" && e.checked()));

        let forwarded = if let Some(key) = &event.key {
            ClientEvent::DomKey(DomKeyEvent { event: dom_event, key: key.clone() })
        } else if let Some((value, checked)) = control {
            if event.name == "input" {
                let margin = self.input_debounce();
                self.conn()?.debounce.rebounce(target_id, now, margin);
            }
            ClientEvent::DomInput(DomInputEvent { event: dom_event, value, checked })
        } else {
            ClientEvent::Dom(dom_event)
        };
        debug!(%node, target = %target_id, event = requested, "forwarding event");
        self.send(&forwarded);
        Ok(())
    }

    /// Tracked ancestors of the listener (inclusive) that listen for the same
    /// event. A path of just the target is reported as non-bubbling.
    fn propagation(&self, listener: DomId, target: NodeId, requested: &str) -> Propagation {
        let Some(conn) = self.connection.as_ref() else { return Propagation::NonBubbling };
        let root = self.document.root();
        let path: Vec<NodeId> = self
            .document
            .ancestors(listener)
            .into_iter()
            .take_while(|dom| *dom != root)
            .filter_map(|dom| {
                let node = conn.registry.node_of(dom)?;
                let element = self.document.element(dom)?;
                conn.registry.listener(node, normalized_event_name(element, requested)).map(|_| node)
            })
            .collect();
        if path == [target] {
            Propagation::NonBubbling
        } else {
            Propagation::Bubbling { composed_path: path }
        }
    }

    fn perform_default(
        &mut self,
        target: DomId,
        name: &str,
        now: Instant,
    ) -> Result<(), ClientError> {
        let Some(node) = self.tracked(target) else { return Ok(()) };
        let Some(element) = self.document.element(target) else { return Ok(()) };
        let checkable = element.is_checkable();
        let radio = element.attribute("type") == Some("radio");
        let was_checked = element.checked();
        let submit_control = element.is_submit_control();

        match name {
            "click" => {
                self.performed(node, name);
                if checkable {
                    self.document.set_checked(target, radio || !was_checked);
                    self.dispatch_native(target, NativeEvent::new("input"), now)?;
                    self.dispatch_native(target, NativeEvent::new("change"), now)?;
                }
                let form =
                    if submit_control { self.document.enclosing_form(target) } else { None };
                if let Some(form) = form {
                    self.dispatch_native(form, NativeEvent::new("submit"), now)?;
                }
            },
            "submit" => {
                self.performed(node, name);
                self.actions.push(ClientAction::SubmitForm { form: node });
            },
            "focus" => {
                self.document.focus(target);
                self.performed(node, name);
            },
            "blur" => {
                self.document.blur(target);
                self.performed(node, name);
            },
            _ => {},
        }
        Ok(())
    }

    fn performed(&mut self, target: NodeId, event: &str) {
        trace!(%target, event, "default performed");
        self.actions.push(ClientAction::DefaultPerformed { target, event: event.to_owned() });
    }
}
