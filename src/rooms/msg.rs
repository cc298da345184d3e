use time::OffsetDateTime;
use tracing::debug;

use super::events::{ChatMessage, ConnId, NewMessage, ServerEvent};
use super::hub::{Effect, Hub, Outcome};

/// Random 8-byte id, hex encoded.
pub fn generate_message_id() -> String {
    hex::encode(rand::random::<[u8; 8]>())
}

impl NewMessage {
    /// Stamp the server-owned fields: id if absent, timestamp if absent, and `readBy` reset to
    /// just the sender.
    pub fn into_chat_message(self) -> ChatMessage {
        ChatMessage {
            room_id: self.room_id,
            message: self.body,
            read_by: vec![self.sender.clone()],
            sender: self.sender,
            timestamp: self.timestamp.unwrap_or_else(OffsetDateTime::now_utc),
            media_url: self.media_url,
            media_type: self.media_type,
            file_name: self.file_name,
            message_id: self.message_id.unwrap_or_else(generate_message_id),
        }
    }
}

impl Hub {
    /// Relay to everyone else in the room. Messages for rooms that are not active are dropped.
    pub fn send_message(&self, conn: ConnId, msg: NewMessage) -> Outcome {
        let Some(recipients) = self.rooms.others(&msg.room_id, conn) else {
            debug!(room_id = %msg.room_id, sender = %msg.sender, "dropped message for inactive room");
            return Outcome::default();
        };

        let msg = msg.into_chat_message();
        match &msg.media_url {
            Some(_) => debug!(
                room_id = %msg.room_id,
                sender = %msg.sender,
                media_type = ?msg.media_type,
                "media message"
            ),
            None => debug!(room_id = %msg.room_id, sender = %msg.sender, "text message"),
        }

        let mut outcome = Outcome::default();
        outcome.fan_out(recipients, ServerEvent::ReceiveMessage(msg.clone()));
        outcome.effect(Effect::AppendMessage(msg));
        outcome
    }
}
