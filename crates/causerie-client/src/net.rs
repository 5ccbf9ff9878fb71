//! Connection management for the conferencing client.
//!
//! A [`Client`] owns the write half of the server connection; a spawned
//! receiver task owns the read half, printing whatever the server pushes
//! and keeping the session tracker in step with the acknowledgements.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, bail, Context};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::debug;

use causerie_shared::frame::{read_frame, write_frame, Frame, MessageType};

use crate::session::SessionTracker;

pub struct Client {
    pub id: String,
    writer: OwnedWriteHalf,
    pub tracker: Arc<Mutex<SessionTracker>>,
    alive: Arc<AtomicBool>,
    receiver: JoinHandle<()>,
}

impl Client {
    /// Connect, authenticate, and spawn the receiver task. A LO_NAK turns
    /// into an error carrying the server's reason.
    pub async fn login(id: &str, password: &str, host: &str, port: u16) -> anyhow::Result<Client> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("cannot reach {host}:{port}"))?;
        let (mut reader, mut writer) = stream.into_split();

        write_frame(&mut writer, &Frame::login(id, password))
            .await
            .context("failed to send login")?;
        let reply = read_frame(&mut reader)
            .await
            .context("server closed the connection during login")?;
        match reply.kind {
            MessageType::LoginAck => {}
            MessageType::LoginNak => bail!("login refused: {}", reply.data_text()),
            other => bail!("unexpected reply to login: {other:?}"),
        }

        let tracker = Arc::new(Mutex::new(SessionTracker::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let receiver = tokio::spawn(receive_loop(reader, tracker.clone(), alive.clone()));

        Ok(Client {
            id: id.to_owned(),
            writer,
            tracker,
            alive,
            receiver,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Relaxed)
    }

    pub async fn send(&mut self, frame: Frame) -> anyhow::Result<()> {
        write_frame(&mut self.writer, &frame)
            .await
            .map_err(|e| anyhow!("send failed: {e}"))
    }

    /// Announce departure and tear the connection down.
    pub async fn logout(mut self) {
        let _ = write_frame(&mut self.writer, &Frame::reply(MessageType::Exit, Vec::new())).await;
        self.receiver.abort();
    }
}

async fn receive_loop(
    mut reader: OwnedReadHalf,
    tracker: Arc<Mutex<SessionTracker>>,
    alive: Arc<AtomicBool>,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(error = %e, "Receive loop ended");
                println!("\nDisconnected from server.");
                alive.store(false, Ordering::Relaxed);
                return;
            }
        };

        match frame.kind {
            MessageType::Message => {
                println!("[{}][{}]: {}", frame.session, frame.source, frame.data_text());
            }
            MessageType::JoinAck => {
                let sid = frame.data_text().into_owned();
                println!("Joined session: {sid}");
                if let Ok(mut tracker) = tracker.lock() {
                    tracker.note_joined(&sid);
                }
            }
            MessageType::NewSessionAck => {
                let sid = frame.data_text().into_owned();
                println!("Created and joined new session: {sid}");
                if let Ok(mut tracker) = tracker.lock() {
                    tracker.note_joined(&sid);
                }
            }
            MessageType::JoinNak => {
                println!("Request refused: {}", frame.data_text());
            }
            MessageType::QueryAck => {
                println!("List of users and sessions:\n{}", frame.data_text());
            }
            other => {
                println!("Unexpected message from server: {other:?}");
            }
        }
    }
}
