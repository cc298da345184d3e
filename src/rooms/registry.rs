//! Connection Registry: live connections, their room membership and display name.

use dashmap::DashMap;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::events::{ConnId, ServerEvent};

pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

struct Connection {
    membership: Membership,
    outbox: Outbox,
}

/// Last known membership of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    pub room_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Default)]
pub struct Registry {
    connections: DashMap<ConnId, Connection>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, outbox: Outbox) -> ConnId {
        let id = Uuid::now_v7();
        self.connections.insert(
            id,
            Connection {
                membership: Membership::default(),
                outbox,
            },
        );
        id
    }

    /// Run `f` on a connection's membership while holding its entry, so the connection cannot
    /// be removed until `f` returns. `None` if the connection is not registered.
    ///
    /// `f` must not call back into the registry.
    pub fn with_membership<R>(
        &self,
        id: ConnId,
        f: impl FnOnce(&mut Membership) -> R,
    ) -> Option<R> {
        let mut conn = self.connections.get_mut(&id)?;
        Some(f(&mut conn.membership))
    }

    pub fn lookup(&self, id: ConnId) -> Option<Membership> {
        self.connections.get(&id).map(|conn| conn.membership.clone())
    }

    /// Removes the connection and hands back its last membership. Only the first call for a
    /// given id gets `Some`, which makes teardown run once.
    pub fn remove(&self, id: ConnId) -> Option<Membership> {
        self.connections.remove(&id).map(|(_, conn)| conn.membership)
    }

    /// Queue an event for a connection. Returns false if the connection is gone or its
    /// writer has stopped.
    pub fn send(&self, id: ConnId, event: ServerEvent) -> bool {
        match self.connections.get(&id) {
            Some(conn) => conn.outbox.send(event).is_ok(),
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoomError;

    #[test]
    fn tracks_membership() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        assert_eq!(registry.lookup(id), Some(Membership::default()));

        registry.with_membership(id, |m| {
            m.room_id = Some("42".into());
            m.name = Some("Alice".into());
        });
        assert_eq!(
            registry.lookup(id),
            Some(Membership {
                room_id: Some("42".into()),
                name: Some("Alice".into()),
            })
        );
    }

    #[test]
    fn remove_is_once_only() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);
        registry.with_membership(id, |m| m.room_id = Some("42".into()));

        assert_eq!(registry.remove(id).and_then(|m| m.room_id), Some("42".into()));
        assert_eq!(registry.remove(id), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn unknown_ids_are_noops() {
        let registry = Registry::new();
        let ghost = Uuid::now_v7();
        assert_eq!(registry.with_membership(ghost, |m| m.name.take()), None);
        assert_eq!(registry.lookup(ghost), None);
        assert!(!registry.send(ghost, RoomError::RoomNotFound.into()));
    }

    #[test]
    fn with_membership_skips_removed_connections() {
        let registry = Registry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        let previous = registry.with_membership(id, |m| m.room_id.replace("42".into()));
        assert_eq!(previous, Some(None));
        assert_eq!(registry.len(), 1);

        registry.remove(id);
        let mut ran = false;
        assert_eq!(registry.with_membership(id, |_| ran = true), None);
        assert!(!ran);
    }

    #[test]
    fn send_reaches_outbox() {
        let registry = Registry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = registry.register(tx);

        assert!(registry.send(id, RoomError::RoomNotFound.into()));
        assert_eq!(rx.try_recv().unwrap(), ServerEvent::from(RoomError::RoomNotFound));
    }
}
