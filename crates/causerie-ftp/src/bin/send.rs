use std::io::Write as _;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use causerie_ftp::config::SenderConfig;
use causerie_ftp::sender;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().context("usage: send <host> <port>")?;
    let port: u16 = args
        .next()
        .context("usage: send <host> <port>")?
        .parse()
        .context("port must be an integer in 0..=65535")?;
    anyhow::ensure!(args.next().is_none(), "usage: send <host> <port>");

    print!("Enter command as ftp <filename>: ");
    std::io::stdout().flush()?;

    sender::run(&host, port, &SenderConfig::default()).await
}
