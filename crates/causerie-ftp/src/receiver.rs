//! Reassembling file receiver with a built-in loss simulator.
//!
//! Fragments are written strictly in sequence. A `last_acked` cursor
//! makes duplicate deliveries harmless: a fragment at or below the cursor
//! is acknowledged again but never re-written, so a lost ACK costs the
//! sender one retransmission and nothing else. Fragments beyond the next
//! expected sequence number are dropped without acknowledgement; under
//! stop-and-wait they can only mean a confused sender.

use std::path::PathBuf;

use anyhow::{bail, Context};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use causerie_shared::constants::{FRAGMENT_ACK, HANDSHAKE, HANDSHAKE_OK, MAX_DATAGRAM_LEN};
use causerie_shared::Fragment;

use crate::config::ReceiverConfig;

/// Decides, per datagram, whether to pretend the network ate it.
pub struct LossSimulator {
    p_drop: f64,
    rng: StdRng,
}

impl LossSimulator {
    pub fn new(p_drop: f64) -> Self {
        Self {
            p_drop,
            rng: StdRng::from_entropy(),
        }
    }

    pub fn with_seed(p_drop: f64, seed: u64) -> Self {
        Self {
            p_drop,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn should_drop(&mut self) -> bool {
        self.p_drop > 0.0 && self.rng.gen::<f64>() < self.p_drop
    }
}

struct Transfer {
    file: File,
    path: PathBuf,
    filename: String,
    total: u32,
    last_acked: u32,
}

/// Entry point for the `recv` binary.
pub async fn run(port: u16, config: &ReceiverConfig) -> anyhow::Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("failed to bind UDP port {port}"))?;
    info!(port, "Waiting for a transfer");
    let path = serve_one(&socket, config).await?;
    info!(path = %path.display(), "File received");
    Ok(())
}

/// Accept one handshake and receive one complete file, returning where it
/// was written.
pub async fn serve_one(socket: &UdpSocket, config: &ReceiverConfig) -> anyhow::Result<PathBuf> {
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    let (n, peer) = socket.recv_from(&mut buf).await?;
    if &buf[..n] != HANDSHAKE {
        bail!("unexpected opening message ({n} bytes)");
    }
    socket.send_to(HANDSHAKE_OK, peer).await?;
    debug!(%peer, "Handshake complete");

    let mut loss = LossSimulator::new(config.p_drop);
    let mut transfer: Option<Transfer> = None;

    loop {
        let (n, peer) = socket.recv_from(&mut buf).await?;
        if loss.should_drop() {
            debug!(bytes = n, "Simulating datagram loss");
            continue;
        }
        let fragment = match Fragment::decode(&buf[..n]) {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(error = %e, bytes = n, "Dropping malformed datagram");
                continue;
            }
        };

        if let Some(state) = transfer.as_mut() {
            if fragment.filename != state.filename || fragment.total != state.total {
                bail!(
                    "fragment header changed mid-transfer: {}:{} became {}:{}",
                    state.filename,
                    state.total,
                    fragment.filename,
                    fragment.total
                );
            }
            if fragment.seq <= state.last_acked {
                // retransmission of something already written; the sender
                // just missed our ACK
                debug!(seq = fragment.seq, "Re-acknowledging duplicate fragment");
                socket.send_to(FRAGMENT_ACK, peer).await?;
                continue;
            }
            if fragment.seq != state.last_acked + 1 {
                debug!(
                    seq = fragment.seq,
                    expected = state.last_acked + 1,
                    "Dropping out-of-order fragment"
                );
                continue;
            }

            state.file.write_all(&fragment.payload).await?;
            state.last_acked = fragment.seq;
            socket.send_to(FRAGMENT_ACK, peer).await?;
            debug!(seq = fragment.seq, total = state.total, "Fragment written");

            if fragment.is_last() {
                state.file.flush().await?;
                info!(file = %state.filename, "Last fragment received");
                return Ok(state.path.clone());
            }
            continue;
        }

        // nothing in flight yet: only fragment 1 may open a transfer
        if fragment.seq != 1 {
            debug!(seq = fragment.seq, "Fragment before the start of a transfer");
            continue;
        }
        let path = config.saved_dir.join(&fragment.filename);
        let mut file = File::create(&path).await.with_context(|| {
            format!(
                "cannot create {} (does {} exist?)",
                path.display(),
                config.saved_dir.display()
            )
        })?;
        info!(file = %fragment.filename, fragments = fragment.total, "Transfer started");
        file.write_all(&fragment.payload).await?;
        socket.send_to(FRAGMENT_ACK, peer).await?;

        if fragment.is_last() {
            file.flush().await?;
            return Ok(path);
        }
        transfer = Some(Transfer {
            file,
            path,
            filename: fragment.filename,
            total: fragment.total,
            last_acked: 1,
        });
    }
}
