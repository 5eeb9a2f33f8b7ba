//! Production environment.

use std::{future::Future, time::Duration, time::Instant};

use tephra_core::Environment;
use tracing::error;

/// Wall clock, tokio timers and OS randomness.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl Environment for SystemEnv {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        if let Err(err) = getrandom::fill(buffer) {
            // resume tokens need real entropy
            error!(error = %err, "OS random source failed");
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_bytes_fill_the_buffer() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        SystemEnv.random_bytes(&mut a);
        SystemEnv.random_bytes(&mut b);
        assert_ne!(a, b);
    }
}
