//! Shared server state and the operations that span both registries.
//!
//! A single `Mutex<Shared>` guards every client and session mutation;
//! any read that feeds a decision (find-then-act) happens under the same
//! guard. Broadcast sends run while the lock is held, which keeps each
//! broadcast atomic with respect to membership changes.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::warn;

use causerie_shared::frame::{write_frame, Frame};

use crate::config::ServerConfig;
use crate::registry::{ClientRecord, ClientRegistry};
use crate::session::SessionRegistry;

pub type SharedState = Arc<Mutex<Shared>>;

#[derive(Debug)]
pub struct Shared {
    pub clients: ClientRegistry,
    pub sessions: SessionRegistry,
}

impl Shared {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            clients: ClientRegistry::new(config.max_clients),
            sessions: SessionRegistry::new(config.max_sessions, config.max_clients),
        }
    }

    pub fn new_shared(config: &ServerConfig) -> SharedState {
        Arc::new(Mutex::new(Self::new(config)))
    }

    /// Deliver `frame` to every member of `sid`, the originator included.
    /// A failed send is logged and skipped; the rest of the session still
    /// receives the message.
    pub async fn broadcast(&self, sid: &str, frame: &Frame) {
        let Some(session) = self.sessions.find(sid) else {
            return;
        };
        let targets: Vec<_> = session
            .members
            .iter()
            .filter_map(|member| {
                let slot = self.clients.find_by_id(member)?;
                let record = self.clients.get(slot)?;
                Some((record.id.clone(), record.writer.clone()))
            })
            .collect();

        for (id, writer) in targets {
            let mut writer = writer.lock().await;
            if let Err(e) = write_frame(&mut *writer, frame).await {
                warn!(client = %id, session = %sid, error = %e, "Broadcast send failed");
            }
        }
    }

    /// Remove the client in `slot` from every session it joined and vacate
    /// the slot. Shared by EXIT, abrupt disconnect and reaper eviction.
    pub fn detach_client(&mut self, slot: usize) -> Option<ClientRecord> {
        let record = self.clients.deactivate(slot)?;
        for sid in &record.joined {
            self.sessions.remove_member(sid, &record.id);
        }
        Some(record)
    }

    /// Human-readable roster for QU_ACK. The reply frame's data field caps
    /// the text at 1023 bytes; overflow is cut off silently.
    pub fn list_all(&self) -> String {
        let mut out = String::from("Users:\n");
        for (_, record) in self.clients.iter_active() {
            out.push_str("  ");
            out.push_str(&record.id);
            out.push('\n');
        }
        out.push_str("\nSessions:\n");
        for session in self.sessions.iter() {
            out.push_str(&format!(
                "  {} ({} members)\n",
                session.id,
                session.members.len()
            ));
        }
        out
    }
}

#[cfg(test)]
pub(crate) fn check_invariants(shared: &Shared) {
    use std::collections::HashSet;

    // I1: principal IDs unique among active clients
    let mut ids = HashSet::new();
    for (_, record) in shared.clients.iter_active() {
        assert!(ids.insert(record.id.clone()), "duplicate id {}", record.id);
    }

    for (_, record) in shared.clients.iter_active() {
        // I2: joined lists reference existing sessions
        for sid in &record.joined {
            assert!(
                shared.sessions.find(sid).is_some(),
                "{} joined to dead session {sid}",
                record.id
            );
        }
        // I5 (⇒): joined implies membership
        for sid in &record.joined {
            let session = shared.sessions.find(sid).unwrap();
            assert!(session.members.contains(&record.id));
        }
    }

    for session in shared.sessions.iter() {
        // I4: no empty sessions
        assert!(!session.members.is_empty(), "empty session {}", session.id);
        let mut seen = HashSet::new();
        for member in &session.members {
            // I3: members are active and listed once
            assert!(seen.insert(member.clone()));
            let slot = shared
                .clients
                .find_by_id(member)
                .unwrap_or_else(|| panic!("ghost member {member} in {}", session.id));
            // I5 (⇐): membership implies joined
            let record = shared.clients.get(slot).unwrap();
            assert!(record.joined.contains(&session.id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SharedWriter;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::net::{TcpListener, TcpStream};

    async fn test_writer() -> SharedWriter {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stream, _) = tokio::join!(TcpStream::connect(addr), async {
            listener.accept().await.unwrap()
        });
        let (_, writer) = stream.unwrap().into_split();
        Arc::new(Mutex::new(writer))
    }

    fn addr() -> SocketAddr {
        "127.0.0.1:1".parse().unwrap()
    }

    async fn shared_with(ids: &[&str]) -> (Shared, Vec<usize>) {
        let mut shared = Shared::new(&ServerConfig::default());
        let mut slots = Vec::new();
        for id in ids {
            let record = ClientRecord::new((*id).into(), addr(), test_writer().await);
            slots.push(shared.clients.register(record).unwrap());
        }
        (shared, slots)
    }

    fn join(shared: &mut Shared, slot: usize, sid: &str) {
        let id = shared.clients.get(slot).unwrap().id.clone();
        shared.sessions.add_member(sid, &id).unwrap();
        shared.clients.get_mut(slot).unwrap().joined.push(sid.into());
    }

    #[tokio::test]
    async fn detach_erases_every_membership() {
        let (mut shared, slots) = shared_with(&["jill", "jack"]).await;
        shared.sessions.create("r1").unwrap();
        shared.sessions.create("r2").unwrap();
        join(&mut shared, slots[0], "r1");
        join(&mut shared, slots[0], "r2");
        join(&mut shared, slots[1], "r1");
        check_invariants(&shared);

        shared.detach_client(slots[0]);
        check_invariants(&shared);

        // r2 emptied and vanished, r1 kept jack
        assert!(shared.sessions.find("r2").is_none());
        assert_eq!(shared.sessions.find("r1").unwrap().members, vec!["jack"]);
    }

    #[tokio::test]
    async fn list_all_matches_roster_format() {
        let (mut shared, slots) = shared_with(&["jill", "jack"]).await;
        shared.sessions.create("lab").unwrap();
        join(&mut shared, slots[0], "lab");
        join(&mut shared, slots[1], "lab");

        assert_eq!(
            shared.list_all(),
            "Users:\n  jill\n  jack\n\nSessions:\n  lab (2 members)\n"
        );
    }

    #[tokio::test]
    async fn broadcast_to_missing_session_is_a_noop() {
        let (shared, _) = shared_with(&["jill"]).await;
        shared
            .broadcast("ghost", &Frame::reply(causerie_shared::MessageType::Message, b"x".to_vec()))
            .await;
    }
}
