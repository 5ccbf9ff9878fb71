//! Catalog of conference sessions and their memberships.
//!
//! Sessions are created explicitly (NEW_SESS) or die implicitly the
//! moment their last member leaves; an empty session never exists
//! between critical sections. Like the client registry, this structure
//! is only touched under the process-wide state lock.

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("session {0} already exists")]
    Exists(String),

    #[error("session table is full")]
    Capacity,

    #[error("session {0} not found")]
    NotFound(String),

    #[error("session {0} is full")]
    Full(String),
}

#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    /// Member principal IDs in join order, no duplicates.
    pub members: Vec<String>,
}

#[derive(Debug)]
pub struct SessionRegistry {
    sessions: Vec<Session>,
    max_sessions: usize,
    max_members: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize, max_members: usize) -> Self {
        Self {
            sessions: Vec::new(),
            max_sessions,
            max_members,
        }
    }

    pub fn find(&self, sid: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.id == sid)
    }

    pub fn create(&mut self, sid: &str) -> Result<(), SessionError> {
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::Capacity);
        }
        if self.find(sid).is_some() {
            return Err(SessionError::Exists(sid.to_owned()));
        }
        self.sessions.push(Session {
            id: sid.to_owned(),
            members: Vec::new(),
        });
        Ok(())
    }

    /// Add `cid` to `sid`. Already a member is success, not a duplicate.
    pub fn add_member(&mut self, sid: &str, cid: &str) -> Result<(), SessionError> {
        let max_members = self.max_members;
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.id == sid)
            .ok_or_else(|| SessionError::NotFound(sid.to_owned()))?;
        if session.members.iter().any(|m| m == cid) {
            return Ok(());
        }
        if session.members.len() >= max_members {
            return Err(SessionError::Full(sid.to_owned()));
        }
        session.members.push(cid.to_owned());
        Ok(())
    }

    /// Drop `cid` from `sid`; removes the session itself once emptied.
    pub fn remove_member(&mut self, sid: &str, cid: &str) {
        if let Some(idx) = self.sessions.iter().position(|s| s.id == sid) {
            self.sessions[idx].members.retain(|m| m != cid);
            if self.sessions[idx].members.is_empty() {
                self.sessions.remove(idx);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_duplicates_and_overflow() {
        let mut registry = SessionRegistry::new(2, 8);
        registry.create("a").unwrap();
        assert_eq!(
            registry.create("a"),
            Err(SessionError::Exists("a".into()))
        );
        registry.create("b").unwrap();
        assert_eq!(registry.create("c"), Err(SessionError::Capacity));
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut registry = SessionRegistry::new(4, 8);
        registry.create("lab").unwrap();
        registry.add_member("lab", "jill").unwrap();
        registry.add_member("lab", "jill").unwrap();
        assert_eq!(registry.find("lab").unwrap().members, vec!["jill"]);
    }

    #[test]
    fn add_member_to_missing_session_fails() {
        let mut registry = SessionRegistry::new(4, 8);
        assert_eq!(
            registry.add_member("ghost", "jill"),
            Err(SessionError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn member_capacity_is_enforced() {
        let mut registry = SessionRegistry::new(4, 2);
        registry.create("lab").unwrap();
        registry.add_member("lab", "jill").unwrap();
        registry.add_member("lab", "jack").unwrap();
        assert_eq!(
            registry.add_member("lab", "alice"),
            Err(SessionError::Full("lab".into()))
        );
    }

    #[test]
    fn emptied_session_disappears() {
        let mut registry = SessionRegistry::new(4, 8);
        registry.create("lab").unwrap();
        registry.add_member("lab", "jill").unwrap();
        registry.add_member("lab", "jack").unwrap();

        registry.remove_member("lab", "jill");
        assert!(registry.find("lab").is_some());

        registry.remove_member("lab", "jack");
        assert!(registry.find("lab").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn remove_from_missing_session_is_a_noop() {
        let mut registry = SessionRegistry::new(4, 8);
        registry.remove_member("ghost", "jill");
        assert!(registry.is_empty());
    }
}
