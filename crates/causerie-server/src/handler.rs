//! Per-client connection handler.
//!
//! One handler task owns the read half of each admitted connection and
//! processes that client's frames strictly in receive order. Every
//! dispatch runs under the process-wide state lock; replies and
//! broadcasts go out while the lock is held.

use std::sync::Arc;

use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use causerie_shared::constants::MAX_DATA;
use causerie_shared::frame::{read_frame, write_frame, Frame, MessageType};
use causerie_shared::FrameError;

use crate::state::{Shared, SharedState};

#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drive one client until EXIT, transport closure, protocol error, or a
/// reaper kick. The reaper detaches the record itself before signalling,
/// so the kick branch only has to drop the read half.
pub async fn run(
    state: SharedState,
    slot: usize,
    id: String,
    mut reader: OwnedReadHalf,
    kick: Arc<Notify>,
) {
    loop {
        tokio::select! {
            result = read_frame(&mut reader) => match result {
                Ok(frame) => {
                    let mut shared = state.lock().await;
                    // The slot may have been reaped, and even handed to a
                    // new client, while this frame was in flight.
                    if !shared.clients.get(slot).is_some_and(|r| r.id == id) {
                        return;
                    }
                    shared.clients.touch(slot);
                    if dispatch(&mut shared, slot, &id, frame).await == Flow::Stop {
                        return;
                    }
                }
                Err(FrameError::Closed) => {
                    cleanup(&state, slot, &id, None).await;
                    return;
                }
                Err(e) => {
                    cleanup(&state, slot, &id, Some(e)).await;
                    return;
                }
            },
            _ = kick.notified() => {
                return;
            }
        }
    }
}

async fn cleanup(state: &SharedState, slot: usize, id: &str, error: Option<FrameError>) {
    let mut shared = state.lock().await;
    if shared.clients.get(slot).is_some_and(|r| r.id == id) {
        shared.detach_client(slot);
        match error {
            None => info!(client = %id, "Client disconnected"),
            Some(e) => {
                warn!(client = %id, error = %e, "Closing connection after protocol error");
            }
        }
    }
}

async fn dispatch(shared: &mut Shared, slot: usize, id: &str, frame: Frame) -> Flow {
    match frame.kind {
        MessageType::Exit => {
            shared.detach_client(slot);
            info!(client = %id, "Client logged out");
            return Flow::Stop;
        }

        MessageType::Join => {
            let sid = frame.data_text().into_owned();
            if shared.sessions.find(&sid).is_none() {
                let reason = format!("{sid}: session not found");
                send_to(shared, slot, &Frame::reply(MessageType::JoinNak, reason.into_bytes()))
                    .await;
            } else if already_joined(shared, slot, &sid) {
                send_to(shared, slot, &Frame::reply(MessageType::JoinAck, sid.into_bytes()))
                    .await;
            } else {
                match shared.sessions.add_member(&sid, id) {
                    Ok(()) => {
                        if let Some(record) = shared.clients.get_mut(slot) {
                            record.joined.push(sid.clone());
                        }
                        info!(client = %id, session = %sid, "Client joined session");
                        send_to(
                            shared,
                            slot,
                            &Frame::reply(MessageType::JoinAck, sid.into_bytes()),
                        )
                        .await;
                    }
                    Err(e) => {
                        debug!(client = %id, session = %sid, error = %e, "Join refused");
                        send_to(
                            shared,
                            slot,
                            &Frame::reply(
                                MessageType::JoinNak,
                                b"Session is full or error adding".to_vec(),
                            ),
                        )
                        .await;
                    }
                }
            }
        }

        MessageType::LeaveSession => {
            let sid = frame.session;
            if already_joined(shared, slot, &sid) {
                shared.sessions.remove_member(&sid, id);
                if let Some(record) = shared.clients.get_mut(slot) {
                    record.joined.retain(|s| s != &sid);
                }
                info!(client = %id, session = %sid, "Client left session");
            }
        }

        MessageType::NewSession => {
            let sid = frame.data_text().into_owned();
            let created = match shared.sessions.create(&sid) {
                Ok(()) => match shared.sessions.add_member(&sid, id) {
                    Ok(()) => Ok(()),
                    Err(e) => {
                        // never leave the fresh session behind empty
                        shared.sessions.remove_member(&sid, id);
                        Err(e)
                    }
                },
                Err(e) => Err(e),
            };
            match created {
                Ok(()) => {
                    if let Some(record) = shared.clients.get_mut(slot) {
                        record.joined.push(sid.clone());
                    }
                    info!(client = %id, session = %sid, "Client created session");
                    send_to(
                        shared,
                        slot,
                        &Frame::reply(MessageType::NewSessionAck, sid.into_bytes()),
                    )
                    .await;
                }
                Err(e) => {
                    debug!(client = %id, session = %sid, error = %e, "Session creation refused");
                    let reason = format!("Failed to create session {sid}");
                    send_to(shared, slot, &Frame::reply(MessageType::JoinNak, reason.into_bytes()))
                        .await;
                }
            }
        }

        MessageType::Message => {
            let sid = frame.session.clone();
            if already_joined(shared, slot, &sid) {
                let mut out = frame;
                out.source = id.to_owned();
                shared.broadcast(&sid, &out).await;
            } else {
                debug!(client = %id, session = %sid, "Dropping message for a session the client has not joined");
            }
        }

        MessageType::Query => {
            let mut roster = shared.list_all().into_bytes();
            roster.truncate(MAX_DATA - 1);
            send_to(shared, slot, &Frame::reply(MessageType::QueryAck, roster)).await;
        }

        other => {
            warn!(client = %id, kind = ?other, "Ignoring unexpected message type");
        }
    }
    Flow::Continue
}

fn already_joined(shared: &Shared, slot: usize, sid: &str) -> bool {
    shared
        .clients
        .get(slot)
        .is_some_and(|r| r.joined.iter().any(|s| s == sid))
}

/// Reply to the client occupying `slot`. Failures are logged; the handler
/// keeps running and learns of a dead transport on its next read.
async fn send_to(shared: &Shared, slot: usize, frame: &Frame) {
    let Some(record) = shared.clients.get(slot) else {
        return;
    };
    let id = record.id.clone();
    let writer = record.writer.clone();
    let mut writer = writer.lock().await;
    if let Err(e) = write_frame(&mut *writer, frame).await {
        warn!(client = %id, error = %e, "Reply send failed");
    }
}
