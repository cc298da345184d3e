//! Read-Receipt Tracker.
//!
//! Receipts are rebroadcast as-is; the core keeps no message store, so it neither checks that
//! the message belongs to the room nor de-duplicates repeats. Consumers apply set semantics.

use time::OffsetDateTime;
use tracing::debug;

use super::events::{ConnId, MessageRead, ReadReceipt, ServerEvent};
use super::hub::{Effect, Hub, Outcome};

impl Hub {
    pub fn mark_read(&self, conn: ConnId, receipt: Option<ReadReceipt>) -> Outcome {
        let Some(ReadReceipt {
            message_id,
            room_id,
            user_name,
        }) = receipt
        else {
            debug!(%conn, "dropped malformed read receipt");
            return Outcome::default();
        };
        debug!(%message_id, %room_id, user = %user_name, "message marked read");

        let mut outcome = Outcome::default();
        if let Some(recipients) = self.rooms.others(&room_id, conn) {
            outcome.fan_out(
                recipients,
                ServerEvent::MessageRead(MessageRead {
                    message_id: message_id.clone(),
                    user_name: user_name.clone(),
                    timestamp: OffsetDateTime::now_utc(),
                }),
            );
        }
        outcome.effect(Effect::MarkRead {
            message_id,
            user_name,
        });
        outcome
    }
}
