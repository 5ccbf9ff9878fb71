//! Connection admission.
//!
//! Each inbound connection must open with exactly one LOGIN frame. The
//! admission sequence (duplicate ID, credentials, capacity) runs under
//! the state lock so two racing logins for the same principal cannot
//! both slip through. Rejected connections get a LO_NAK with the reason
//! and are dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use causerie_shared::frame::{read_frame, write_frame, Frame, MessageType};

use crate::auth;
use crate::handler;
use crate::registry::{ClientRecord, SharedWriter};
use crate::state::SharedState;

pub async fn run(listener: TcpListener, state: SharedState) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                debug!(%addr, "Inbound connection");
                tokio::spawn(admit(state.clone(), stream, addr));
            }
            Err(e) => {
                warn!(error = %e, "Accept failed");
            }
        }
    }
}

async fn admit(state: SharedState, stream: TcpStream, addr: SocketAddr) {
    let (mut reader, writer) = stream.into_split();

    let frame = match read_frame(&mut reader).await {
        Ok(frame) => frame,
        Err(e) => {
            debug!(%addr, error = %e, "Connection dropped before login");
            return;
        }
    };
    if frame.kind != MessageType::Login {
        debug!(%addr, kind = ?frame.kind, "First frame was not LOGIN");
        return;
    }
    let id = frame.source.clone();
    let password = frame.data_text().into_owned();
    let writer: SharedWriter = Arc::new(Mutex::new(writer));

    let mut shared = state.lock().await;

    if shared.clients.find_by_id(&id).is_some() {
        info!(client = %id, %addr, "Rejected login: duplicate ID");
        refuse(&writer, "Client ID already in use").await;
        return;
    }
    if !auth::authenticate(&id, &password) {
        info!(client = %id, %addr, "Rejected login: bad credentials");
        refuse(&writer, "Invalid username/password").await;
        return;
    }
    let record = ClientRecord::new(id.clone(), addr, writer.clone());
    let Some(slot) = shared.clients.register(record) else {
        info!(client = %id, %addr, "Rejected login: server full");
        refuse(&writer, "Server full").await;
        return;
    };
    let kick = match shared.clients.get(slot) {
        Some(record) => record.kick.clone(),
        None => return,
    };

    {
        let mut w = writer.lock().await;
        let ack = Frame::reply(MessageType::LoginAck, b"Login successful".to_vec());
        if write_frame(&mut *w, &ack).await.is_err() {
            shared.detach_client(slot);
            return;
        }
    }
    info!(client = %id, %addr, "Client logged in");
    drop(shared);

    tokio::spawn(handler::run(state, slot, id, reader, kick));
}

async fn refuse(writer: &SharedWriter, reason: &str) {
    let mut w = writer.lock().await;
    let nak = Frame::reply(MessageType::LoginNak, reason.as_bytes().to_vec());
    let _ = write_frame(&mut *w, &nak).await;
}
