//! Round-trip latency probing.
//!
//! The client pings right after `SetSessionToken` and then every
//! `ping_interval` while visible. Each ping carries a fresh nonce; the pong
//! echoes it and the elapsed time becomes the latency estimate that sizes the
//! input debounce margin.

use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

/// Ping schedule and outstanding nonces.
#[derive(Debug)]
pub struct LatencyProbe {
    interval: Duration,
    next_nonce: u64,
    sent: HashMap<u64, Instant>,
    next_ping: Option<Instant>,
    latency: Duration,
}

impl LatencyProbe {
    /// Idle probe; latency starts at zero.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_nonce: 1,
            sent: HashMap::new(),
            next_ping: None,
            latency: Duration::ZERO,
        }
    }

    /// Last measured round trip.
    pub fn latency(&self) -> Duration {
        self.latency
    }

    /// Schedule a ping for `now`.
    pub fn start(&mut self, now: Instant) {
        self.next_ping = Some(now);
    }

    /// Stop scheduling pings. Outstanding nonces are kept.
    pub fn pause(&mut self) {
        self.next_ping = None;
    }

    /// Whether pings are scheduled.
    pub fn is_running(&self) -> bool {
        self.next_ping.is_some()
    }

    /// Next ping deadline.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_ping
    }

    /// Nonce to send if a ping is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Option<u64> {
        let due = self.next_ping?;
        if due > now {
            return None;
        }
        let nonce = self.next_nonce;
        self.next_nonce += 1;
        self.sent.insert(nonce, now);
        self.next_ping = Some(now + self.interval);
        Some(nonce)
    }

    /// Record a pong. Returns the measured round trip, or `None` for a nonce
    /// that was never sent or already answered.
    pub fn on_pong(&mut self, nonce: u64, now: Instant) -> Option<Duration> {
        let Some(sent) = self.sent.remove(&nonce) else {
            warn!(nonce, "pong for unknown ping nonce");
            return None;
        };
        self.latency = now.saturating_duration_since(sent);
        debug!(nonce, latency_ms = self.latency.as_millis(), "round trip");
        Some(self.latency)
    }

    /// Forget outstanding pings and stop scheduling. The latency estimate
    /// survives for the next connection.
    pub fn reset(&mut self) {
        self.sent.clear();
        self.next_ping = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_then_interval() {
        let mut probe = LatencyProbe::new(Duration::from_secs(5));
        let t0 = Instant::now();
        assert_eq!(probe.poll(t0), None);

        probe.start(t0);
        assert_eq!(probe.poll(t0), Some(1));
        assert_eq!(probe.poll(t0 + Duration::from_secs(4)), None);
        assert_eq!(probe.poll(t0 + Duration::from_secs(5)), Some(2));
    }

    #[test]
    fn pong_measures_round_trip() {
        let mut probe = LatencyProbe::new(Duration::from_secs(5));
        let t0 = Instant::now();
        probe.start(t0);
        let nonce = probe.poll(t0).unwrap();

        let rtt = probe.on_pong(nonce, t0 + Duration::from_millis(80));
        assert_eq!(rtt, Some(Duration::from_millis(80)));
        assert_eq!(probe.latency(), Duration::from_millis(80));
        assert_eq!(probe.on_pong(nonce, t0), None, "nonce answered twice");
    }

    #[test]
    fn reset_keeps_latency() {
        let mut probe = LatencyProbe::new(Duration::from_secs(5));
        let t0 = Instant::now();
        probe.start(t0);
        let nonce = probe.poll(t0).unwrap();
        probe.on_pong(nonce, t0 + Duration::from_millis(10));
        probe.start(t0);
        let pending = probe.poll(t0).unwrap();

        probe.reset();
        assert!(!probe.is_running());
        assert_eq!(probe.on_pong(pending, t0), None);
        assert_eq!(probe.latency(), Duration::from_millis(10));
    }
}
