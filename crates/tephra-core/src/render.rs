//! Seam to the rendering collaborator.
//!
//! Whatever decides what the tree should look like plugs in here. It drives
//! the host operations on [`Session`] and is called back by the session at
//! well-defined points, always with the flush lock held so that everything it
//! emits in one call leaves as one frame.

use crate::{
    error::{StateError, TreeError},
    session::Session,
    state::StateSlots,
};

/// A component tree bound to one session.
pub trait Renderer: Send {
    /// Initial render. `restored` holds the slots captured by
    /// [`Renderer::snapshot`] on a previous connection, or nothing on a cold
    /// start.
    ///
    /// # Errors
    ///
    /// Any [`TreeError`] from a host operation; the session is closed.
    fn mount(&mut self, tree: &mut Session, restored: &mut StateSlots) -> Result<(), TreeError>;

    /// Re-render after handlers ran or the location changed.
    ///
    /// # Errors
    ///
    /// Any [`TreeError`] from a host operation; the session is closed.
    fn update(&mut self, tree: &mut Session) -> Result<(), TreeError>;

    /// Write resumable state depth-first. Must not touch the tree.
    ///
    /// # Errors
    ///
    /// `StateError::Encode` if a slot cannot be serialized.
    fn snapshot(&self, slots: &mut StateSlots) -> Result<(), StateError>;

    /// Tear down. The default does nothing; the session's registries are
    /// cleared regardless.
    fn unmount(&mut self, tree: &mut Session) {
        let _ = tree;
    }
}
