use async_trait::async_trait;
use dashmap::{DashMap, mapref::entry::Entry};
use thiserror::Error;

use crate::rooms::events::ChatMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Durable message history, owned by the surrounding application.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Appending an id that is already stored is accepted and ignored.
    async fn append(&self, message: ChatMessage) -> Result<(), StoreError>;

    /// Up to `limit` of the room's most recent messages, oldest first.
    async fn list_recent(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, StoreError>;

    /// Add `user_name` to the message's readers. `None` if the message is unknown or the
    /// reader is already recorded.
    async fn mark_read(
        &self,
        message_id: &str,
        user_name: &str,
    ) -> Result<Option<ChatMessage>, StoreError>;
}

/// In-process store, per-room message lists plus a message id index.
#[derive(Default)]
pub struct MemoryStore {
    rooms: DashMap<String, Vec<ChatMessage>>,
    index: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: ChatMessage) -> Result<(), StoreError> {
        match self.index.entry(message.message_id.clone()) {
            Entry::Occupied(_) => return Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(message.room_id.clone());
            }
        }

        let mut room = self.rooms.entry(message.room_id.clone()).or_default();
        // keep chronological order even when a late client timestamp arrives
        let at = room.partition_point(|m| m.timestamp <= message.timestamp);
        room.insert(at, message);
        Ok(())
    }

    async fn list_recent(&self, room_id: &str, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        Ok(self
            .rooms
            .get(room_id)
            .map(|room| {
                let start = room.len().saturating_sub(limit);
                room[start..].to_vec()
            })
            .unwrap_or_default())
    }

    async fn mark_read(
        &self,
        message_id: &str,
        user_name: &str,
    ) -> Result<Option<ChatMessage>, StoreError> {
        let Some(room_id) = self.index.get(message_id).map(|r| r.value().clone()) else {
            return Ok(None);
        };
        let Some(mut room) = self.rooms.get_mut(&room_id) else {
            return Ok(None);
        };
        let Some(message) = room.iter_mut().find(|m| m.message_id == message_id) else {
            return Ok(None);
        };
        if message.read_by.iter().any(|r| r == user_name) {
            return Ok(None);
        }
        message.read_by.push(user_name.to_owned());
        Ok(Some(message.clone()))
    }
}
