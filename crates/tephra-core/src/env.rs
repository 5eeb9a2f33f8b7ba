//! Environment abstraction.
//!
//! Everything nondeterministic the authority needs (clock, sleeping, random
//! bytes for resume tokens) comes through this trait. Production wires it to
//! the OS; the simulation harness wires it to a virtual clock and a seeded
//! RNG so whole sessions replay bit-for-bit.

use std::{future::Future, time::Duration, time::Instant};

/// Source of time and randomness.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;

    /// Sleep for `duration`.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);
}
