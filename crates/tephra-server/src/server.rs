//! TCP accept loop.

use std::{net::SocketAddr, sync::Arc};

use tephra_core::{Environment, Renderer};
use tokio::net::{TcpListener, TcpStream};
use tracing::{info, warn};

use crate::{authority::Authority, error::ServerError, websocket};

/// Accept connections on `listener` forever, one task per connection.
/// `make_renderer` builds the component tree for each new session.
///
/// # Errors
///
/// `Io` if accepting fails.
pub async fn run<E, R, F>(
    listener: TcpListener,
    authority: Arc<Authority<E>>,
    make_renderer: F,
) -> Result<(), ServerError>
where
    E: Environment,
    R: Renderer + 'static,
    F: Fn() -> R,
{
    info!(addr = %listener.local_addr()?, "listening");
    loop {
        let (stream, peer) = listener.accept().await?;
        let authority = Arc::clone(&authority);
        let renderer = make_renderer();
        tokio::spawn(async move {
            if let Err(err) = connection(stream, peer, &authority, renderer).await {
                warn!(%peer, error = %err, "connection failed");
            }
        });
    }
}

async fn connection<E: Environment, R: Renderer>(
    stream: TcpStream,
    peer: SocketAddr,
    authority: &Authority<E>,
    renderer: R,
) -> Result<(), ServerError> {
    stream.set_nodelay(true)?;
    let (sink, source, handshake) = websocket::accept(stream).await?;
    let ending = authority.serve(sink, source, handshake, renderer).await?;
    info!(%peer, ?ending, "connection closed");
    Ok(())
}
