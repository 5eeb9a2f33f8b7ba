//! Outgoing mutation queue with a flush lock.
//!
//! Every mutation a session produces passes through its [`Dispatcher`]. While
//! a synchronous unit of work runs (initial render, one event-handling pass)
//! the dispatcher is locked and [`Dispatcher::request_flush`] does nothing, so
//! the work's mutations leave as one frame and the client never renders a
//! half-applied update.
//!
//! ```text
//!  dispatch(m, Queued) ──► queue ──(request_flush, unlocked)──► outbox ──► transport
//!  dispatch(m, Immediate) ─────────────────────────────────────► outbox
//! ```
//!
//! The queue is FIFO with a single producer and the transport is the single
//! consumer, so ordering within a session holds by construction. The lock is a
//! boolean rather than a counter: nested lock/unlock is not modelled.

use std::collections::VecDeque;

use bytes::Bytes;
use tephra_proto::{Mutation, encode_mutations};
use tracing::{debug, trace};

/// How a dispatched mutation reaches the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Append to the queue; sent on the next unlocked flush
    Queued,
    /// Encode as its own frame right away, ahead of anything still queued.
    /// Reserved for pong replies.
    Immediate,
}

/// Per-session outgoing queue.
#[derive(Debug, Default)]
pub struct Dispatcher {
    queue: Vec<Mutation>,
    locked: bool,
    outbox: VecDeque<Bytes>,
}

impl Dispatcher {
    /// Empty, unlocked dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand a mutation to the dispatcher.
    pub fn dispatch(&mut self, mutation: Mutation, delivery: Delivery) {
        trace!(kind = %mutation.kind(), ?delivery, "dispatch");
        match delivery {
            Delivery::Queued => self.queue.push(mutation),
            Delivery::Immediate => {
                self.outbox.push_back(encode_mutations(std::slice::from_ref(&mutation)));
            },
        }
    }

    /// Suppress flushing until [`Dispatcher::unlock_flush`].
    pub fn lock_flush(&mut self) {
        self.locked = true;
    }

    /// Allow flushing again. Does not flush by itself.
    pub fn unlock_flush(&mut self) {
        self.locked = false;
    }

    /// Whether flushing is currently suppressed.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Encode the whole queue as one frame, unless locked or empty.
    ///
    /// Returns whether a frame was produced.
    pub fn request_flush(&mut self) -> bool {
        if self.locked || self.queue.is_empty() {
            return false;
        }

        let batch = std::mem::take(&mut self.queue);
        debug!(mutations = batch.len(), "flush");
        self.outbox.push_back(encode_mutations(&batch));
        true
    }

    /// Mutations waiting for the next flush.
    pub fn queued(&self) -> &[Mutation] {
        &self.queue
    }

    /// Take every encoded frame that is ready for the transport, oldest first.
    pub fn take_frames(&mut self) -> Vec<Bytes> {
        self.outbox.drain(..).collect()
    }

    /// Drop everything not yet handed to the transport.
    ///
    /// Used when the connection is gone; a resumed session rebuilds the client
    /// view from a fresh render instead of replaying stale mutations.
    pub fn discard(&mut self) {
        if !self.queue.is_empty() || !self.outbox.is_empty() {
            debug!(
                queued = self.queue.len(),
                frames = self.outbox.len(),
                "discarding unsent mutations"
            );
        }
        self.queue.clear();
        self.outbox.clear();
        self.locked = false;
    }
}

#[cfg(test)]
mod tests {
    use tephra_proto::{NodeId, decode_mutations};

    use super::*;

    fn create(id: u64) -> Mutation {
        Mutation::CreateElement { node: NodeId(id), tag: "div".into() }
    }

    #[test]
    fn locked_flush_is_noop() {
        let mut d = Dispatcher::new();
        d.lock_flush();
        d.dispatch(create(1), Delivery::Queued);
        assert!(!d.request_flush());
        assert!(d.take_frames().is_empty());
        assert_eq!(d.queued().len(), 1);
    }

    #[test]
    fn unlock_then_flush_sends_one_frame() {
        let mut d = Dispatcher::new();
        d.lock_flush();
        d.dispatch(create(1), Delivery::Queued);
        d.dispatch(create(2), Delivery::Queued);
        d.unlock_flush();
        assert!(d.request_flush());

        let frames = d.take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(decode_mutations(&frames[0]).unwrap(), vec![create(1), create(2)]);
        assert!(d.queued().is_empty());
    }

    #[test]
    fn empty_queue_produces_no_frame() {
        let mut d = Dispatcher::new();
        assert!(!d.request_flush());
        assert!(d.take_frames().is_empty());
    }

    #[test]
    fn immediate_bypasses_lock() {
        let mut d = Dispatcher::new();
        d.lock_flush();
        d.dispatch(create(1), Delivery::Queued);
        d.dispatch(Mutation::Pong { nonce: 4 }, Delivery::Immediate);

        let frames = d.take_frames();
        assert_eq!(frames.len(), 1);
        assert_eq!(decode_mutations(&frames[0]).unwrap(), vec![Mutation::Pong { nonce: 4 }]);
        assert_eq!(d.queued(), &[create(1)]);
    }

    #[test]
    fn discard_drops_queue_and_outbox() {
        let mut d = Dispatcher::new();
        d.dispatch(create(1), Delivery::Queued);
        d.request_flush();
        d.dispatch(create(2), Delivery::Queued);
        d.lock_flush();
        d.discard();
        assert!(d.take_frames().is_empty());
        assert!(d.queued().is_empty());
        assert!(!d.is_locked());
    }
}
