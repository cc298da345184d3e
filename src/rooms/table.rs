//! Room Table: active rooms keyed by room id.
//!
//! Each mutation runs under the map entry's lock, so changes to one room's participants are
//! linearizable while other rooms stay independent. Callers get back a snapshot of whom to
//! notify and do the fan-out after the lock is released.

use dashmap::{DashMap, mapref::entry::Entry};
use time::OffsetDateTime;

use super::events::ConnId;
use crate::error::RoomError;

#[derive(Debug, Clone)]
pub struct Room {
    pub name: String,
    pub created_at: OffsetDateTime,
    /// In join order. Display names may repeat across connections.
    participants: Vec<(ConnId, String)>,
}

impl Room {
    fn new(name: String, creator: ConnId, creator_name: String) -> Self {
        Self {
            name,
            created_at: OffsetDateTime::now_utc(),
            participants: vec![(creator, creator_name)],
        }
    }

    fn upsert(&mut self, conn: ConnId, name: String) {
        match self.participants.iter_mut().find(|(id, _)| *id == conn) {
            Some((_, existing)) => *existing = name,
            None => self.participants.push((conn, name)),
        }
    }

    fn remove(&mut self, conn: ConnId) -> Option<String> {
        let idx = self.participants.iter().position(|(id, _)| *id == conn)?;
        Some(self.participants.remove(idx).1)
    }

    fn others(&self, conn: ConnId) -> Vec<ConnId> {
        self.participants
            .iter()
            .map(|(id, _)| *id)
            .filter(|id| *id != conn)
            .collect()
    }

    /// Distinct display names, first occurrence first.
    pub fn display_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.participants.len());
        for (_, name) in &self.participants {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }

    pub fn participants(&self) -> &[(ConnId, String)] {
        &self.participants
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    pub room_name: String,
    pub participants: Vec<String>,
    pub notify: Vec<ConnId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Left {
    pub name: String,
    pub notify: Vec<ConnId>,
    /// The room was deleted because this was its last participant.
    pub closed: bool,
    pub created_at: OffsetDateTime,
}

#[derive(Default)]
pub struct RoomTable {
    rooms: DashMap<String, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &self,
        room_id: &str,
        room_name: String,
        creator: ConnId,
        creator_name: String,
    ) -> Result<(), RoomError> {
        match self.rooms.entry(room_id.to_owned()) {
            Entry::Occupied(_) => Err(RoomError::RoomAlreadyExists),
            Entry::Vacant(slot) => {
                slot.insert(Room::new(room_name, creator, creator_name));
                Ok(())
            }
        }
    }

    pub fn join(&self, room_id: &str, conn: ConnId, name: String) -> Result<Joined, RoomError> {
        let mut room = self.rooms.get_mut(room_id).ok_or(RoomError::RoomNotFound)?;
        room.upsert(conn, name);
        Ok(Joined {
            room_name: room.name.clone(),
            participants: room.display_names(),
            notify: room.others(conn),
        })
    }

    /// `None` if the room is absent or `conn` is not in it.
    pub fn leave(&self, room_id: &str, conn: ConnId) -> Option<Left> {
        let Entry::Occupied(mut slot) = self.rooms.entry(room_id.to_owned()) else {
            return None;
        };
        let name = slot.get_mut().remove(conn)?;
        if slot.get().participants.is_empty() {
            let room = slot.remove();
            return Some(Left {
                name,
                notify: Vec::new(),
                closed: true,
                created_at: room.created_at,
            });
        }
        Some(Left {
            name,
            notify: slot.get().others(conn),
            closed: false,
            created_at: slot.get().created_at,
        })
    }

    /// Everyone in the room except `conn`, or `None` if the room is absent.
    pub fn others(&self, room_id: &str, conn: ConnId) -> Option<Vec<ConnId>> {
        self.rooms.get(room_id).map(|room| room.others(conn))
    }

    pub fn get(&self, room_id: &str) -> Option<Room> {
        self.rooms.get(room_id).map(|room| room.value().clone())
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn create_rejects_active_id() {
        let table = RoomTable::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        table.create("42", "Team".into(), a, "Alice".into()).unwrap();
        assert_eq!(
            table.create("42", "Other".into(), b, "Bob".into()),
            Err(RoomError::RoomAlreadyExists)
        );
        let room = table.get("42").unwrap();
        assert_eq!(room.name, "Team");
        assert_eq!(room.participants(), &[(a, "Alice".to_string())]);
    }

    #[test]
    fn join_requires_room() {
        let table = RoomTable::new();
        assert_eq!(
            table.join("nope", Uuid::now_v7(), "Bob".into()),
            Err(RoomError::RoomNotFound)
        );
        assert!(table.is_empty());
    }

    #[test]
    fn join_dedupes_names_in_first_seen_order() {
        let table = RoomTable::new();
        let (a, b, c) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        table.create("42", "Team".into(), a, "Alice".into()).unwrap();
        table.join("42", b, "Bob".into()).unwrap();
        let joined = table.join("42", c, "Alice".into()).unwrap();

        assert_eq!(joined.room_name, "Team");
        assert_eq!(joined.participants, vec!["Alice", "Bob"]);
        assert_eq!(joined.notify, vec![a, b]);
        assert_eq!(table.get("42").unwrap().participants().len(), 3);
    }

    #[test]
    fn rejoin_is_idempotent() {
        let table = RoomTable::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        table.create("42", "Team".into(), a, "Alice".into()).unwrap();
        table.join("42", b, "Bob".into()).unwrap();
        table.join("42", b, "Bob".into()).unwrap();
        assert_eq!(table.get("42").unwrap().participants().len(), 2);
    }

    #[test]
    fn room_lives_while_it_has_participants() {
        let table = RoomTable::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        table.create("42", "Team".into(), a, "Alice".into()).unwrap();
        table.join("42", b, "Bob".into()).unwrap();

        let left = table.leave("42", b).unwrap();
        assert_eq!(left.name, "Bob");
        assert_eq!(left.notify, vec![a]);
        assert!(!left.closed);
        assert_eq!(left.created_at, table.get("42").unwrap().created_at);
        assert!(table.contains("42"));

        assert_eq!(table.leave("42", b), None);

        let left = table.leave("42", a).unwrap();
        assert!(left.closed);
        assert!(left.notify.is_empty());
        assert!(!table.contains("42"));
    }

    #[test]
    fn rooms_do_not_share_members() {
        let table = RoomTable::new();
        let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
        table.create("1", "One".into(), a, "Alice".into()).unwrap();
        table.create("2", "Two".into(), b, "Bob".into()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.others("1", b), Some(vec![a]));
        assert_eq!(table.others("3", a), None);
    }
}
