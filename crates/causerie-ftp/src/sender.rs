//! Stop-and-wait file sender.
//!
//! After a `ftp`/`yes` handshake the file goes out as numbered fragments,
//! exactly one outstanding at a time. Every fragment must be answered
//! with a literal `ACK` before the next is sent; a timeout or a garbled
//! reply triggers a retransmission of the same fragment, with the wait
//! doubling on each retry up to a cap.

use std::path::Path;

use anyhow::{bail, Context};
use tokio::fs::File;
use tokio::io::{stdin, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use causerie_shared::constants::{
    FRAGMENT_ACK, FRAGMENT_DATA_LEN, HANDSHAKE, HANDSHAKE_OK, MAX_DATAGRAM_LEN,
};
use causerie_shared::fragment::validate_filename;
use causerie_shared::Fragment;

use crate::config::SenderConfig;

/// Entry point for the `send` binary: reads one `ftp <filename>` command
/// from standard input and ships that file.
pub async fn run(host: &str, port: u16, config: &SenderConfig) -> anyhow::Result<()> {
    let mut line = String::new();
    BufReader::new(stdin())
        .read_line(&mut line)
        .await
        .context("failed to read command")?;
    let filename = parse_command(line.trim_end())?;
    send_file(host, port, Path::new(filename), config).await
}

/// Accepts exactly `ftp <filename>`, with the filename fit to embed in a
/// fragment header.
pub fn parse_command(line: &str) -> anyhow::Result<&str> {
    let filename = line
        .strip_prefix("ftp ")
        .context("command must start with 'ftp '")?;
    validate_filename(filename)?;
    Ok(filename)
}

pub async fn send_file(
    host: &str,
    port: u16,
    path: &Path,
    config: &SenderConfig,
) -> anyhow::Result<()> {
    // only the final component travels in the header
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable filename", path.display()))?;
    validate_filename(filename)?;
    let file_size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("cannot access {filename}"))?
        .len();
    if file_size == 0 {
        bail!("{filename} is empty; nothing to transfer");
    }
    let total = file_size.div_ceil(FRAGMENT_DATA_LEN as u64) as u32;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket
        .connect((host, port))
        .await
        .with_context(|| format!("cannot reach {host}:{port}"))?;

    handshake(&socket, config).await?;
    info!(file = %filename, size = file_size, fragments = total, "Transfer accepted");

    let mut file = File::open(path).await?;
    let mut remaining = file_size;
    for seq in 1..=total {
        let chunk_len = remaining.min(FRAGMENT_DATA_LEN as u64) as usize;
        let mut payload = vec![0u8; chunk_len];
        file.read_exact(&mut payload).await?;
        remaining -= chunk_len as u64;

        let fragment = Fragment::new(total, seq, filename, payload)?;
        exchange(&socket, &fragment.encode(), seq, config).await?;
        debug!(seq, total, bytes = chunk_len, "Fragment acknowledged");
    }

    info!(file = %filename, "Transfer complete");
    Ok(())
}

async fn handshake(socket: &UdpSocket, config: &SenderConfig) -> anyhow::Result<()> {
    socket.send(HANDSHAKE).await?;
    let mut buf = [0u8; MAX_DATAGRAM_LEN];
    let n = timeout(config.max_timeout, socket.recv(&mut buf))
        .await
        .context("no handshake reply")??;
    if &buf[..n] != HANDSHAKE_OK {
        bail!("receiver refused the transfer");
    }
    Ok(())
}

/// Send one datagram and wait for its ACK, retransmitting on timeout or
/// on any reply other than the ACK literal.
async fn exchange(
    socket: &UdpSocket,
    datagram: &[u8],
    seq: u32,
    config: &SenderConfig,
) -> anyhow::Result<()> {
    let mut wait = config.initial_timeout;
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    for attempt in 1..=config.max_attempts {
        if attempt > 1 {
            warn!(seq, attempt, "Retransmitting fragment");
        }
        socket.send(datagram).await?;

        match timeout(wait, socket.recv(&mut buf)).await {
            Ok(Ok(n)) if &buf[..n] == FRAGMENT_ACK => return Ok(()),
            Ok(Ok(n)) => {
                debug!(seq, reply_len = n, "Reply was not an ACK");
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                debug!(seq, timeout_ms = wait.as_millis() as u64, "ACK timed out");
            }
        }
        wait = (wait * 2).min(config.max_timeout);
    }

    bail!(
        "fragment {seq} unacknowledged after {} attempts",
        config.max_attempts
    )
}
