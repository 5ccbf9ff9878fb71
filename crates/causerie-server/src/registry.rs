//! Catalog of logged-in clients.
//!
//! Clients live in a fixed array of slots; a free slot is `None`. The
//! registry itself is not synchronised; it is only ever touched through
//! the process-wide state lock in [`crate::state`].

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Mutex, Notify};

/// Write half of a client connection, shared between that client's
/// handler (replies) and broadcasts originating from other handlers.
pub type SharedWriter = Arc<Mutex<OwnedWriteHalf>>;

#[derive(Debug)]
pub struct ClientRecord {
    /// Authenticated principal ID, unique among occupied slots.
    pub id: String,
    pub addr: SocketAddr,
    pub writer: SharedWriter,
    /// Session IDs this client has joined, in join order.
    pub joined: Vec<String>,
    pub last_activity: Instant,
    /// Signalled by the reaper to force the handler off its socket.
    pub kick: Arc<Notify>,
}

impl ClientRecord {
    pub fn new(id: String, addr: SocketAddr, writer: SharedWriter) -> Self {
        Self {
            id,
            addr,
            writer,
            joined: Vec::new(),
            last_activity: Instant::now(),
            kick: Arc::new(Notify::new()),
        }
    }
}

#[derive(Debug)]
pub struct ClientRegistry {
    slots: Vec<Option<ClientRecord>>,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    pub fn find_free_slot(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn find_by_id(&self, id: &str) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.as_ref().is_some_and(|r| r.id == id))
    }

    /// Install `record` in the first free slot.
    pub fn register(&mut self, record: ClientRecord) -> Option<usize> {
        let slot = self.find_free_slot()?;
        self.slots[slot] = Some(record);
        Some(slot)
    }

    /// Vacate `slot`, returning its record. Dropping the returned record's
    /// last writer handle closes the transport.
    pub fn deactivate(&mut self, slot: usize) -> Option<ClientRecord> {
        self.slots.get_mut(slot)?.take()
    }

    pub fn touch(&mut self, slot: usize) {
        if let Some(record) = self.slots.get_mut(slot).and_then(Option::as_mut) {
            record.last_activity = Instant::now();
        }
    }

    pub fn get(&self, slot: usize) -> Option<&ClientRecord> {
        self.slots.get(slot)?.as_ref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut ClientRecord> {
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn iter_active(&self) -> impl Iterator<Item = (usize, &ClientRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|r| (i, r)))
    }

    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}
