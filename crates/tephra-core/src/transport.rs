//! Transport abstraction for framed duplex connections.
//!
//! A session only needs two things from the network: a way to push whole
//! frames out, and a way to pull whole frames in. The halves are separate so
//! a driver can wait for the next inbound frame while still sending (pong
//! replies, timer-driven flushes) from another branch of its event loop.
//!
//! Production uses WebSocket binary messages; tests use turmoil TCP with a
//! length prefix. Framing is the transport's job, so the codec never sees a
//! partial frame.

use std::io;

use async_trait::async_trait;
use bytes::Bytes;

/// Outbound half of a connection.
#[async_trait]
pub trait FrameSink: Send + 'static {
    /// Send one complete frame.
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()>;

    /// Close the connection, telling the peer why when the transport can.
    async fn close(&mut self, reason: &str) -> io::Result<()>;
}

/// Inbound half of a connection.
#[async_trait]
pub trait FrameSource: Send + 'static {
    /// Receive the next complete frame.
    ///
    /// Returns `Ok(None)` once the peer has closed the connection.
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>>;
}
