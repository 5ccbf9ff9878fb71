use anyhow::Context;
use tracing_subscriber::EnvFilter;

use causerie_ftp::config::ReceiverConfig;
use causerie_ftp::receiver;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .context("usage: recv <port>")?
        .parse()
        .context("port must be an integer in 0..=65535")?;
    anyhow::ensure!(args.next().is_none(), "usage: recv <port>");

    receiver::run(port, &ReceiverConfig::from_env()).await
}
