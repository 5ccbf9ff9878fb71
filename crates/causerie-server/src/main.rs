use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use causerie_server::config::ServerConfig;
use causerie_server::state::Shared;
use causerie_server::{acceptor, reaper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,causerie_server=debug")),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .context("usage: server <port>")?
        .parse()
        .context("port must be an integer in 0..=65535")?;
    anyhow::ensure!(args.next().is_none(), "usage: server <port>");

    let config = ServerConfig::from_env(port);
    info!(?config, "Starting conferencing server");

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    info!(port = config.port, "Listening for clients");

    let state = Shared::new_shared(&config);
    tokio::spawn(reaper::run(
        state.clone(),
        config.reaper_period,
        config.idle_timeout,
    ));
    acceptor::run(listener, state).await;
    Ok(())
}
