//! Turmoil TCP transport.
//!
//! Frames travel over a simulated TCP stream with a 4-byte big-endian length
//! prefix. A zero-length frame is never produced by the codec, so it is used
//! as the close marker; the reason is not carried.
//!
//! The first frame on a connection stands in for the WebSocket upgrade
//! request: the location, a newline, then the resume token (possibly empty).

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use tephra_core::{FrameSink, FrameSource};
use tephra_server::Handshake;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use turmoil::net::{
    TcpListener, TcpStream,
    tcp::{OwnedReadHalf, OwnedWriteHalf},
};

/// Largest frame either side will accept.
pub const MAX_FRAME: usize = 16 * 1024 * 1024;

/// Listening side of the simulated transport.
pub struct SimTransport {
    listener: TcpListener,
}

impl SimTransport {
    /// Bind a listener on a simulated host.
    pub async fn bind(addr: &str) -> io::Result<Self> {
        Ok(Self { listener: TcpListener::bind(addr).await? })
    }

    /// Accept the next connection and read its handshake.
    pub async fn accept(&self) -> io::Result<(SimSink, SimSource, Handshake)> {
        let (stream, _) = self.listener.accept().await?;
        let (sink, mut source) = split(stream);
        let preamble = source
            .recv_frame()
            .await?
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no handshake"))?;
        Ok((sink, source, parse_handshake(&preamble)?))
    }

    /// Connect to a simulated host, presenting `handshake`.
    pub async fn connect(addr: &str, handshake: &Handshake) -> io::Result<(SimSink, SimSource)> {
        let stream = TcpStream::connect(addr).await?;
        let (mut sink, source) = split(stream);
        let preamble = format!(
            "{}\n{}",
            handshake.location,
            handshake.resume.as_deref().unwrap_or_default()
        );
        sink.send_frame(Bytes::from(preamble)).await?;
        Ok((sink, source))
    }
}

fn parse_handshake(preamble: &[u8]) -> io::Result<Handshake> {
    let text = std::str::from_utf8(preamble)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let (location, token) = text
        .split_once('\n')
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "malformed handshake"))?;
    Ok(Handshake {
        resume: (!token.is_empty()).then(|| token.to_owned()),
        location: location.to_owned(),
    })
}

fn split(stream: TcpStream) -> (SimSink, SimSource) {
    let (read, write) = stream.into_split();
    (SimSink { inner: write }, SimSource { inner: read })
}

/// Outbound half.
pub struct SimSink {
    inner: OwnedWriteHalf,
}

/// Inbound half.
pub struct SimSource {
    inner: OwnedReadHalf,
}

#[async_trait]
impl FrameSink for SimSink {
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> {
        if frame.is_empty() || frame.len() > MAX_FRAME {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "frame size out of range"));
        }
        let len = u32::try_from(frame.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "frame too large"))?;
        self.inner.write_all(&len.to_be_bytes()).await?;
        self.inner.write_all(&frame).await?;
        self.inner.flush().await
    }

    async fn close(&mut self, _reason: &str) -> io::Result<()> {
        self.inner.write_all(&0u32.to_be_bytes()).await?;
        self.inner.shutdown().await
    }
}

#[async_trait]
impl FrameSource for SimSource {
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        let mut prefix = [0u8; 4];
        match self.inner.read_exact(&mut prefix).await {
            Ok(_) => {},
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(err) => return Err(err),
        }

        let len = u32::from_be_bytes(prefix) as usize;
        if len == 0 {
            return Ok(None);
        }
        if len > MAX_FRAME {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "frame too large"));
        }

        let mut frame = vec![0u8; len];
        self.inner.read_exact(&mut frame).await?;
        Ok(Some(Bytes::from(frame)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handshake_preamble_parses() {
        let handshake = parse_handshake(b"/inbox\nabc").unwrap();
        assert_eq!(handshake.location, "/inbox");
        assert_eq!(handshake.resume.as_deref(), Some("abc"));

        assert_eq!(parse_handshake(b"/\n").unwrap().resume, None);
        assert!(parse_handshake(b"no separator").is_err());
    }
}
