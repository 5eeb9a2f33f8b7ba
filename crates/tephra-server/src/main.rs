//! Tephra server binary.

use std::{error::Error, sync::Arc};

use clap::Parser;
use tephra_server::{Args, Authority, ServerConfig, SystemEnv, demo::Counter};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from(Args::parse());
    let listener = TcpListener::bind(config.bind).await?;
    let authority = Arc::new(Authority::new(SystemEnv, config));

    tephra_server::run(listener, authority, Counter::new).await?;
    Ok(())
}
