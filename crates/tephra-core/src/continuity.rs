//! Session continuity across connections.
//!
//! Every connection presents an optional resume token. The registry decides
//! what the new connection becomes:
//!
//! ```text
//!                      ┌─────────────────────────┐
//!  token? ──none──────►│ Fresh: new token, cold  │
//!    │                 └─────────────────────────┘
//!    ├──unknown───────► Fresh (the presented token is not reused)
//!    │
//!    ├──live──────────► Supersede: retire the old connection, carry its
//!    │                  state over under a NEW token
//!    │
//!    └──saved─────────► Resume: same token, saved state
//! ```
//!
//! A saved snapshot is only kept for [`RegistryConfig::retention`]; expired
//! entries are pruned on the next admission. Handing out a new token on
//! supersede means two connections never share an identity, even briefly.
//!
//! The registry is sans-IO: the runtime performs the actual retirement of a
//! superseded connection and reports back through [`SessionRegistry::release`].

use std::{
    collections::{HashMap, HashSet},
    fmt,
    time::{Duration, Instant},
};

use tracing::{debug, info};

use crate::{env::Environment, state::StateSnapshot};

/// Opaque session identity, also the resume cookie value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(String);

impl SessionToken {
    /// Random bytes behind a generated token.
    pub const ENTROPY_BYTES: usize = 16;

    /// Draw a fresh token from the environment's RNG.
    pub fn generate<E: Environment>(env: &E) -> Self {
        let mut bytes = [0u8; Self::ENTROPY_BYTES];
        env.random_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Token text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionToken {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for SessionToken {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Continuity registry configuration.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// How long a disconnected session's state is kept
    pub retention: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { retention: Duration::from_secs(10 * 60) }
    }
}

/// What a new connection becomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Cold start under a new token
    Fresh {
        /// Issued token
        token: SessionToken,
    },
    /// Resume a cleanly closed session
    Resume {
        /// The presented token, reused
        token: SessionToken,
        /// State saved at disconnect
        snapshot: StateSnapshot,
    },
    /// The presented token is still live on another connection. The runtime
    /// retires that connection, hands its state to the new one and then calls
    /// [`SessionRegistry::release`] for `retired`.
    Supersede {
        /// Token of the connection to retire
        retired: SessionToken,
        /// Token issued to the new connection
        token: SessionToken,
    },
}

impl Admission {
    /// Token the new connection runs under.
    pub fn token(&self) -> &SessionToken {
        match self {
            Self::Fresh { token } | Self::Resume { token, .. } | Self::Supersede { token, .. } => {
                token
            },
        }
    }
}

#[derive(Debug, Clone)]
struct Saved {
    snapshot: StateSnapshot,
    saved_at: Instant,
}

/// Live tokens and saved snapshots for one authority.
#[derive(Debug)]
pub struct SessionRegistry {
    config: RegistryConfig,
    live: HashSet<SessionToken>,
    saved: HashMap<SessionToken, Saved>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new(config: RegistryConfig) -> Self {
        Self { config, live: HashSet::new(), saved: HashMap::new() }
    }

    /// Decide what a connection presenting `resume` becomes, and mark the
    /// resulting token live.
    pub fn admit<E: Environment>(
        &mut self,
        resume: Option<&str>,
        now: Instant,
        env: &E,
    ) -> Admission {
        self.prune(now);

        let Some(presented) = resume.map(SessionToken::from) else {
            let token = self.issue(env);
            info!(session = %token, "fresh session");
            return Admission::Fresh { token };
        };

        if self.live.contains(&presented) {
            let token = self.issue(env);
            info!(retired = %presented, session = %token, "superseding live session");
            return Admission::Supersede { retired: presented, token };
        }

        if let Some(saved) = self.saved.remove(&presented) {
            info!(session = %presented, state_bytes = saved.snapshot.len(), "resuming session");
            self.live.insert(presented.clone());
            return Admission::Resume { token: presented, snapshot: saved.snapshot };
        }

        let token = self.issue(env);
        debug!(presented = %presented, session = %token, "unknown resume token");
        Admission::Fresh { token }
    }

    /// A live session's connection ended. Its state, if any, is kept for the
    /// retention window.
    pub fn on_disconnect(
        &mut self,
        token: &SessionToken,
        snapshot: Option<StateSnapshot>,
        now: Instant,
    ) {
        if !self.live.remove(token) {
            debug!(session = %token, "disconnect for a token that is not live");
            return;
        }
        match snapshot {
            Some(snapshot) => {
                debug!(session = %token, state_bytes = snapshot.len(), "saved session state");
                self.saved.insert(token.clone(), Saved { snapshot, saved_at: now });
            },
            None => debug!(session = %token, "session closed without state"),
        }
    }

    /// Forget a retired token without saving anything under it.
    pub fn release(&mut self, token: &SessionToken) {
        self.live.remove(token);
    }

    /// Drop snapshots older than the retention window. Returns how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let retention = self.config.retention;
        let before = self.saved.len();
        self.saved.retain(|_, saved| now.saturating_duration_since(saved.saved_at) < retention);
        let pruned = before - self.saved.len();
        if pruned > 0 {
            debug!(pruned, "expired saved sessions");
        }
        pruned
    }

    /// Whether `token` belongs to a live connection.
    pub fn is_live(&self, token: &SessionToken) -> bool {
        self.live.contains(token)
    }

    /// Whether state is saved under `token`.
    pub fn has_saved(&self, token: &SessionToken) -> bool {
        self.saved.contains_key(token)
    }

    /// Number of live connections.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    fn issue<E: Environment>(&mut self, env: &E) -> SessionToken {
        let token = SessionToken::generate(env);
        self.live.insert(token.clone());
        token
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}
