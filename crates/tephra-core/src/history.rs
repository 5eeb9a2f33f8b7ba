//! Session location.
//!
//! The client owns the real navigation stack. The authority only knows the
//! path the client last reported: authority-driven navigation is sent as a
//! `History` mutation and takes effect once the client echoes the resulting
//! `HistoryEvent`.

use tephra_proto::HistoryAction;
use tracing::debug;

/// Location as last reported by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHistory {
    path: String,
}

impl SessionHistory {
    /// Start at `path`, normally the connection's request path.
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    /// Current path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Record a client history event. Returns whether the path changed.
    pub fn observe(&mut self, action: HistoryAction, path: &str) -> bool {
        if self.path == path {
            return false;
        }
        debug!(?action, from = %self.path, to = %path, "location changed");
        path.clone_into(&mut self.path);
        true
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observe_reports_changes_only() {
        let mut history = SessionHistory::new("/a");
        assert!(!history.observe(HistoryAction::Replace, "/a"));
        assert!(history.observe(HistoryAction::Push, "/b?x=1"));
        assert_eq!(history.path(), "/b?x=1");
    }
}
