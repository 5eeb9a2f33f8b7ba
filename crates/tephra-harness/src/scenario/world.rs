//! World state for scenario execution.
//!
//! A [`World`] wires one authority [`Session`] to one replaying [`Client`]
//! through an in-process loopback: frames are delivered synchronously, in
//! order, with no I/O. Every frame that crosses is decoded and recorded so
//! oracles can inspect the exact traffic, and the clock is the shared
//! [`SimEnv`] clock.
//!
//! ```text
//!   Renderer ─► Session ──frames──► Client ─► Document
//!                  ▲                   │
//!                  └──────events───────┘
//! ```
//!
//! Reconnects go through a [`SessionRegistry`], so continuity is exercised
//! the same way the server does it.

use std::time::Duration;

use tephra_client::{Client, ClientAction, ClientConfig};
use tephra_core::{
    Admission, Environment, Renderer, Session, SessionAction, SessionConfig, SessionRegistry,
    TreeError, registry::NodeKind,
};
use tephra_proto::{ClientEvent, KeyDetails, Mutation, NodeId, decode_event, decode_mutations};
use tracing::debug;

use crate::sim_env::SimEnv;

/// Builds the component tree for each new session.
pub type RendererFactory = Box<dyn Fn() -> Box<dyn Renderer>>;

/// Upper bound on delivery rounds before the world declares a livelock.
const MAX_ROUNDS: usize = 1_000;

struct Live {
    session: Session,
    renderer: Box<dyn Renderer>,
}

/// One authority, one client and the traffic between them.
pub struct World {
    env: SimEnv,
    session_config: SessionConfig,
    registry: SessionRegistry,
    make_renderer: RendererFactory,
    live: Option<Live>,
    client: Client,
    effects: Vec<ClientAction>,
    closes: Vec<String>,
    mutations: Vec<Mutation>,
    events: Vec<ClientEvent>,
    frames_to_client: usize,
    frames_to_authority: usize,
}

impl World {
    /// Disconnected world whose client starts at `location`.
    pub fn new(env: SimEnv, make_renderer: RendererFactory, location: &str) -> Self {
        Self {
            env,
            session_config: SessionConfig::default(),
            registry: SessionRegistry::default(),
            make_renderer,
            live: None,
            client: Client::new(ClientConfig::default(), location),
            effects: Vec::new(),
            closes: Vec::new(),
            mutations: Vec::new(),
            events: Vec::new(),
            frames_to_client: 0,
            frames_to_authority: 0,
        }
    }

    /// Use `config` for sessions started from now on.
    pub fn set_session_config(&mut self, config: SessionConfig) {
        self.session_config = config;
    }

    /// Open a connection, presenting the client's token if it has one, and
    /// run the initial render.
    pub fn connect(&mut self) -> Result<(), String> {
        let now = self.env.now();
        let resume = self.client.token().map(str::to_owned);
        let admission = self.registry.admit(resume.as_deref(), now, &self.env);

        let restored = match admission.clone() {
            Admission::Fresh { .. } => None,
            Admission::Resume { snapshot, .. } => Some(snapshot),
            Admission::Supersede { retired, .. } => {
                let snapshot = self.live.take().and_then(|mut live| {
                    let snapshot = live.session.retire(live.renderer.as_mut()).ok();
                    live.session.take_actions();
                    snapshot
                });
                self.registry.release(&retired);
                snapshot
            },
        };

        let location = self.client.history().current().to_owned();
        let mut session =
            Session::new(admission.token().clone(), location, self.session_config.clone(), now);
        let mut renderer = (self.make_renderer)();
        self.client.on_connected();
        session
            .start(renderer.as_mut(), restored.as_ref())
            .map_err(|e| format!("initial render failed: {e}"))?;
        self.live = Some(Live { session, renderer });
        self.deliver()
    }

    /// Drop the connection from the client side. The authority saves state.
    pub fn disconnect(&mut self) {
        self.end_session();
        self.client.on_disconnected();
    }

    /// Exchange frames until neither side has anything left to send.
    pub fn deliver(&mut self) -> Result<(), String> {
        for _ in 0..MAX_ROUNDS {
            let mut moved = false;
            let now = self.env.now();

            let actions = self.live.as_mut().map(|l| l.session.take_actions()).unwrap_or_default();
            for action in actions {
                moved = true;
                match action {
                    SessionAction::SendFrame(frame) => {
                        self.frames_to_client += 1;
                        self.mutations.extend(
                            decode_mutations(&frame).map_err(|e| format!("bad frame: {e}"))?,
                        );
                        self.client
                            .on_frame(&frame, now)
                            .map_err(|e| format!("client replay failed: {e}"))?;
                    },
                    SessionAction::Close { reason } => {
                        debug!(%reason, "authority closed the connection");
                        self.closes.push(reason);
                        self.disconnect();
                    },
                }
            }

            for action in self.client.take_actions() {
                moved = true;
                match action {
                    ClientAction::Send(frame) => {
                        if let Ok(event) = decode_event(&frame) {
                            self.events.push(event);
                        }
                        self.frames_to_authority += 1;
                        let Some(live) = self.live.as_mut() else { continue };
                        if let Err(err) =
                            live.session.handle_frame(&frame, live.renderer.as_mut(), now)
                        {
                            debug!(error = %err, "authority rejected frame");
                        }
                    },
                    ClientAction::Close { reason } => {
                        self.closes.push(reason);
                        self.end_session();
                    },
                    other => self.effects.push(other),
                }
            }

            if !moved {
                return Ok(());
            }
        }
        Err(format!("traffic still flowing after {MAX_ROUNDS} rounds"))
    }

    /// Run host operations on the live session outside of any render, flush
    /// them as one frame and deliver.
    pub fn host<T>(
        &mut self,
        op: impl FnOnce(&mut Session) -> Result<T, TreeError>,
    ) -> Result<T, String> {
        let live = self.live.as_mut().ok_or("no live session")?;
        let value = op(&mut live.session).map_err(|e| format!("host operation failed: {e}"))?;
        live.session.request_flush();
        self.deliver()?;
        Ok(value)
    }

    /// Move the clock, run both sides' timers, then deliver.
    pub fn advance(&mut self, by: Duration) -> Result<(), String> {
        self.env.advance(by);
        let now = self.env.now();
        self.client.tick(now);
        if let Some(live) = self.live.as_mut() {
            live.session.tick(now);
        }
        self.deliver()
    }

    /// User clicks `node`.
    pub fn click(&mut self, node: NodeId) -> Result<(), String> {
        let now = self.env.now();
        self.client.click(node, now).map_err(|e| format!("click {node}: {e}"))?;
        self.deliver()
    }

    /// User types `value` into `node`.
    pub fn input(&mut self, node: NodeId, value: &str) -> Result<(), String> {
        let now = self.env.now();
        self.client.input(node, value, now).map_err(|e| format!("input {node}: {e}"))?;
        self.deliver()
    }

    /// User presses `key` on `node`.
    pub fn key(&mut self, node: NodeId, key: &str) -> Result<(), String> {
        let now = self.env.now();
        let details = KeyDetails { key: key.to_owned(), ..KeyDetails::default() };
        self.client.key(node, "keydown", details, now).map_err(|e| format!("key {node}: {e}"))?;
        self.deliver()
    }

    /// Browser back button.
    pub fn back(&mut self) -> Result<(), String> {
        self.client.back();
        self.deliver()
    }

    /// The client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// The authority session of the current connection.
    pub fn session(&self) -> Option<&Session> {
        self.live.as_ref().map(|l| &l.session)
    }

    /// Continuity registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Shared environment.
    pub fn env(&self) -> &SimEnv {
        &self.env
    }

    /// Client effects other than sends, in order.
    pub fn effects(&self) -> &[ClientAction] {
        &self.effects
    }

    /// Close reasons from either side, in order.
    pub fn closes(&self) -> &[String] {
        &self.closes
    }

    /// Every mutation delivered to the client.
    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    /// Every event delivered to the authority.
    pub fn events(&self) -> &[ClientEvent] {
        &self.events
    }

    /// Frames sent authority to client.
    pub fn frames_to_client(&self) -> usize {
        self.frames_to_client
    }

    /// Frames sent client to authority.
    pub fn frames_to_authority(&self) -> usize {
        self.frames_to_authority
    }

    /// Text of a text node on the client.
    pub fn text(&self, node: NodeId) -> Option<String> {
        let dom = self.client.dom(node)?;
        self.client.document().text(dom).map(str::to_owned)
    }

    /// Check that the client's document has exactly the authority's tree
    /// shape: same ids, same kinds and tags, same child order.
    pub fn mirrors(&self) -> Result<(), String> {
        let session = self.session().ok_or("no live session")?;
        let registry = self.client.registry().ok_or("client not connected")?;
        let nodes = session.nodes();
        let document = self.client.document();

        let mut pending = vec![NodeId::ROOT];
        let mut seen = 0;
        while let Some(node) = pending.pop() {
            let dom = registry.get(node).map_err(|e| format!("client lost {node}: {e}"))?;
            if !node.is_root() {
                seen += 1;
                let entry = nodes.get(node).map_err(|e| e.to_string())?;
                let matches = match entry.kind() {
                    NodeKind::Element { tag, .. } => {
                        document.element(dom).is_some_and(|e| e.tag() == tag)
                    },
                    NodeKind::Text => document.text(dom).is_some(),
                };
                if !matches {
                    return Err(format!("{node} differs in kind"));
                }
            }

            let children = nodes.children(node).map_err(|e| e.to_string())?;
            let expected = children
                .iter()
                .map(|child| registry.get(*child))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|e| format!("children of {node}: {e}"))?;
            if document.children(dom) != expected.as_slice() {
                return Err(format!("children of {node} differ"));
            }
            pending.extend_from_slice(children);
        }

        if nodes.len() != registry.len() {
            return Err(format!(
                "client tracks {} nodes, the authority {} ({seen} attached)",
                registry.len(),
                nodes.len()
            ));
        }
        Ok(())
    }

    fn end_session(&mut self) {
        let Some(mut live) = self.live.take() else { return };
        let snapshot = live.session.snapshot(live.renderer.as_ref()).ok();
        live.session.teardown(live.renderer.as_mut());
        self.registry.on_disconnect(live.session.token(), snapshot, self.env.now());
    }
}
