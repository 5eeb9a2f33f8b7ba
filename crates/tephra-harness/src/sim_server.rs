//! Authority running inside a turmoil host.

use std::{io, sync::Arc};

use tephra_core::Renderer;
use tephra_server::Authority;
use tracing::{debug, warn};

use crate::{sim_env::SimEnv, sim_transport::SimTransport};

/// Authority shared by every connection on a simulated host.
pub type SimAuthority = Arc<Authority<SimEnv>>;

/// Accept connections on `addr` forever, serving each with a fresh renderer.
pub async fn serve<R, F>(addr: &str, authority: SimAuthority, make_renderer: F) -> io::Result<()>
where
    R: Renderer + 'static,
    F: Fn() -> R,
{
    let transport = SimTransport::bind(addr).await?;
    loop {
        let (sink, source, handshake) = transport.accept().await?;
        let authority = Arc::clone(&authority);
        let renderer = make_renderer();
        tokio::spawn(async move {
            match authority.serve(sink, source, handshake, renderer).await {
                Ok(ending) => debug!(?ending, "simulated connection ended"),
                Err(err) => warn!(error = %err, "simulated connection failed"),
            }
        });
    }
}
