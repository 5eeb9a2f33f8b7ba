//! WebSocket transport.
//!
//! One binary message carries one frame. The upgrade request supplies the
//! resume token (the `tephra-session-token` cookie) and the initial location
//! (the request path).

use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tephra_core::{FrameSink, FrameSource};
use tephra_proto::SESSION_TOKEN_COOKIE;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async,
    tungstenite::{
        Message,
        handshake::server::{ErrorResponse, Request, Response},
        http::header::COOKIE,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::debug;

use crate::{authority::Handshake, error::ServerError};

/// Outbound half of a WebSocket connection.
pub struct WsSink<S> {
    inner: SplitSink<WebSocketStream<S>, Message>,
}

/// Inbound half of a WebSocket connection.
pub struct WsSource<S> {
    inner: SplitStream<WebSocketStream<S>>,
}

/// Complete the upgrade on `stream` and split the socket.
///
/// # Errors
///
/// `WebSocket` if the handshake fails.
pub async fn accept<S>(stream: S) -> Result<(WsSink<S>, WsSource<S>, Handshake), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut handshake = Handshake::default();
    let ws = accept_hdr_async(
        stream,
        |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
            handshake = handshake_from(request);
            Ok(response)
        },
    )
    .await?;
    debug!(location = %handshake.location, resume = handshake.resume.is_some(), "upgraded");

    let (sink, source) = ws.split();
    Ok((WsSink { inner: sink }, WsSource { inner: source }, handshake))
}

fn handshake_from(request: &Request) -> Handshake {
    let resume = request
        .headers()
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_TOKEN_COOKIE)
        .map(|(_, value)| value.to_owned())
        .filter(|value| !value.is_empty());
    Handshake { resume, location: request.uri().path().to_owned() }
}

#[async_trait]
impl<S> FrameSink for WsSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_frame(&mut self, frame: Bytes) -> io::Result<()> {
        self.inner.send(Message::Binary(frame)).await.map_err(io::Error::other)
    }

    async fn close(&mut self, reason: &str) -> io::Result<()> {
        let frame = CloseFrame { code: CloseCode::Normal, reason: reason.to_owned().into() };
        self.inner.send(Message::Close(Some(frame))).await.map_err(io::Error::other)
    }
}

#[async_trait]
impl<S> FrameSource for WsSource<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn recv_frame(&mut self) -> io::Result<Option<Bytes>> {
        while let Some(message) = self.inner.next().await {
            match message.map_err(io::Error::other)? {
                Message::Binary(data) => return Ok(Some(data)),
                Message::Close(_) => return Ok(None),
                Message::Text(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "text message on a binary protocol",
                    ));
                },
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {},
            }
        }
        Ok(None)
    }
}
