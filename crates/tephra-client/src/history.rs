//! Client navigation history.
//!
//! A browser-style stack: pushing truncates forward entries, `go` moves the
//! cursor and is ignored when it would leave the stack. Every successful move
//! is reported to the authority as a `HistoryEvent`.

use tephra_proto::HistoryAction;

/// Navigation stack with a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct History {
    entries: Vec<String>,
    index: usize,
}

impl History {
    /// Stack holding only `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self { entries: vec![initial.into()], index: 0 }
    }

    /// Current path.
    pub fn current(&self) -> &str {
        self.entries.get(self.index).map_or("/", String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false; the stack holds at least its initial entry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Push `path`, dropping any forward entries.
    pub fn push(&mut self, path: &str) -> HistoryAction {
        self.entries.truncate(self.index + 1);
        self.entries.push(path.to_owned());
        self.index = self.entries.len() - 1;
        HistoryAction::Push
    }

    /// Replace the current entry.
    pub fn replace(&mut self, path: &str) -> HistoryAction {
        match self.entries.get_mut(self.index) {
            Some(entry) => path.clone_into(entry),
            None => self.entries.push(path.to_owned()),
        }
        HistoryAction::Replace
    }

    /// Move by `delta`. Returns `None` when the move is out of range or zero.
    pub fn go(&mut self, delta: i64) -> Option<HistoryAction> {
        if delta == 0 {
            return None;
        }
        let target = i64::try_from(self.index).ok()?.checked_add(delta)?;
        let target = usize::try_from(target).ok().filter(|t| *t < self.entries.len())?;
        self.index = target;
        Some(HistoryAction::Pop)
    }
}
