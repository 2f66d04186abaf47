//! Thread-safe session registry shared by the HTTP handlers on a relay.

use crate::session::Session;
use dashmap::DashMap;
use httptun_common::error::{Result, TunnelError};
use std::sync::Arc;
use uuid::Uuid;

/// Holds every session currently known to this relay process, keyed by
/// session id. Cloning a `SessionRegistry` clones the `Arc`, so handlers can
/// each hold their own copy.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<Uuid, Session>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Register a new session. Fails if `session.id()` is already registered,
    /// enforcing the at-most-one-session-per-id invariant.
    pub fn insert(&self, session: Session) -> Result<()> {
        let id = session.id();
        match self.sessions.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(TunnelError::SessionExists(id.to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                Ok(())
            }
        }
    }

    /// Idempotent insert: if `id` is already registered, this is a no-op
    /// rather than an error. Used by the egress session-init PUT handler,
    /// which a retrying ingress may call more than once for the same session.
    pub fn insert_idempotent(&self, session: Session) {
        self.sessions.entry(session.id()).or_insert(session);
    }

    pub fn get(&self, id: &Uuid) -> Option<dashmap::mapref::one::Ref<'_, Uuid, Session>> {
        self.sessions.get(id)
    }

    pub fn get_mut(&self, id: &Uuid) -> Option<dashmap::mapref::one::RefMut<'_, Uuid, Session>> {
        self.sessions.get_mut(id)
    }

    pub fn remove(&self, id: &Uuid) -> Option<Session> {
        self.sessions.remove(id).map(|(_, s)| s)
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}
