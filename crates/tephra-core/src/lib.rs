//! Tephra authority core
//!
//! Sans-IO session logic for keeping a remote client's UI tree in sync with
//! the tree a rendering collaborator builds on the authority.
//!
//! # Architecture
//!
//! Everything in this crate is a deterministic state machine. Time is passed
//! in, randomness comes from an [`env::Environment`], and every effect on the
//! outside world is returned as a [`session::SessionAction`] for a runtime to
//! execute. The same code runs under the tokio server and under the
//! simulation harness.
//!
//! ```text
//!  Renderer ──host ops──► Session ──► Dispatcher ──frames──► transport
//!     ▲                      │
//!     └──── update ◄── handlers ◄── ClientEvent ◄──frames──── transport
//! ```
//!
//! # Components
//!
//! - [`session`]: per-connection state machine, host operations, event routing
//! - [`dispatcher`]: outgoing queue with the flush lock
//! - [`registry`]: authority-side node registry
//! - [`callbacks`]: per-node event handler bindings
//! - [`props`]: prop values and attribute diffing helpers
//! - [`head`], [`history`]: document head elements and session location
//! - [`continuity`]: token issuance, resume and supersede decisions
//! - [`state`]: resumable render state carried across connections
//! - [`render`]: the trait a rendering collaborator implements
//! - [`mod@env`]: environment abstraction (time, RNG)
//! - [`transport`]: frame transport abstraction
//! - [`error`]: error types

pub mod callbacks;
pub mod continuity;
pub mod dispatcher;
pub mod env;
pub mod error;
pub mod handler;
pub mod head;
pub mod history;
pub mod props;
pub mod registry;
pub mod render;
pub mod session;
pub mod state;
pub mod transport;

pub use continuity::{Admission, RegistryConfig, SessionRegistry, SessionToken};
pub use env::Environment;
pub use error::{EventError, SessionError, StateError, TreeError};
pub use handler::{Handler, SyntheticEvent};
pub use props::{PropValue, Props};
pub use render::Renderer;
pub use session::{Session, SessionAction, SessionConfig, SessionState};
pub use state::{StateSlots, StateSnapshot};
pub use transport::{FrameSink, FrameSource};
