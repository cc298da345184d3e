//! The dispatcher that routes inbound events to presence, relay and receipt handling.
//!
//! Handling an event never touches the network or the store. It mutates the room table and
//! registry and returns an [`Outcome`]: the events to deliver and the side effects the
//! surrounding application may perform afterwards.

use tracing::{trace, warn};

use super::events::{ChatMessage, ClientEvent, ConnId, ServerEvent};
use super::registry::{Outbox, Registry};
use super::table::RoomTable;
use crate::error::RoomError;

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub to: ConnId,
    pub event: ServerEvent,
}

/// Requests for the persistence collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    AppendMessage(ChatMessage),
    MarkRead { message_id: String, user_name: String },
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Outcome {
    pub deliveries: Vec<Delivery>,
    pub effects: Vec<Effect>,
}

impl Outcome {
    pub fn reply(to: ConnId, event: ServerEvent) -> Self {
        Self {
            deliveries: vec![Delivery { to, event }],
            effects: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, to: ConnId, event: ServerEvent) {
        self.deliveries.push(Delivery { to, event });
    }

    pub(crate) fn fan_out(&mut self, recipients: Vec<ConnId>, event: ServerEvent) {
        self.deliveries.extend(recipients.into_iter().map(|to| Delivery {
            to,
            event: event.clone(),
        }));
    }

    pub(crate) fn effect(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Events addressed to one connection, in delivery order.
    pub fn events_for(&self, conn: ConnId) -> Vec<&ServerEvent> {
        self.deliveries
            .iter()
            .filter(|d| d.to == conn)
            .map(|d| &d.event)
            .collect()
    }
}

/// Owns the room table and the connection registry. One per server; tests make their own.
#[derive(Default)]
pub struct Hub {
    pub(crate) registry: Registry,
    pub(crate) rooms: RoomTable,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, outbox: Outbox) -> ConnId {
        let id = self.registry.register(outbox);
        trace!(%id, "connection registered");
        id
    }

    /// Parse one text frame and handle it. Frames that fail validation are answered with
    /// `room-error`.
    pub fn handle_frame(&self, conn: ConnId, frame: &str) -> Outcome {
        match ClientEvent::parse(frame) {
            Ok(event) => self.handle(conn, event),
            Err(err) => {
                warn!(%conn, %err, "rejected frame");
                Outcome::reply(conn, err.into())
            }
        }
    }

    pub fn handle(&self, conn: ConnId, event: ClientEvent) -> Outcome {
        self.dispatch(conn, event)
            .unwrap_or_else(|err| Outcome::reply(conn, err.into()))
    }

    fn dispatch(&self, conn: ConnId, event: ClientEvent) -> Result<Outcome, RoomError> {
        match event {
            ClientEvent::CreateRoom {
                room_id,
                room_name,
                creator_name,
            } => self.create_room(conn, room_id, room_name, creator_name),
            ClientEvent::JoinRoom { room_id, user_name } => {
                self.join_room(conn, room_id, user_name)
            }
            ClientEvent::SendMessage(msg) => Ok(self.send_message(conn, msg)),
            ClientEvent::LeaveRoom { room_id } => Ok(self.leave_room(conn, &room_id)),
            ClientEvent::MarkMessageRead(receipt) => Ok(self.mark_read(conn, receipt)),
        }
    }

    /// Push each delivery into its connection's outbox. Connections that have gone away are
    /// skipped; nothing is queued for them.
    pub fn deliver(&self, deliveries: Vec<Delivery>) {
        for Delivery { to, event } in deliveries {
            if !self.registry.send(to, event) {
                trace!(%to, "dropped event for closed connection");
            }
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn rooms(&self) -> &RoomTable {
        &self.rooms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[test]
    fn bad_frame_gets_room_error() {
        let hub = Hub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = hub.connect(tx);

        let outcome = hub.handle_frame(conn, "{oops");
        assert_eq!(outcome.deliveries.len(), 1);
        assert!(matches!(outcome.events_for(conn)[0], ServerEvent::RoomError(_)));
        assert!(outcome.effects.is_empty());
    }

    #[test]
    fn receipt_without_data_is_dropped_quietly() {
        let hub = Hub::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = hub.connect(tx);

        let outcome = hub.handle_frame(conn, r#"{"event":"mark-message-read"}"#);
        assert_eq!(outcome, Outcome::default());
    }

    #[test]
    fn deliver_routes_to_outboxes() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = hub.connect(tx_a);
        let b = hub.connect(tx_b);

        let frame = json!({
            "event": "create-room",
            "data": { "roomId": "42", "roomName": "Team", "creatorName": "Alice" }
        });
        let outcome = hub.handle_frame(a, &frame.to_string());
        hub.deliver(outcome.deliveries);

        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::RoomCreated(_))));
        assert!(rx_b.try_recv().is_err());

        let outcome = hub.handle(
            b,
            ClientEvent::JoinRoom {
                room_id: "42".into(),
                user_name: "Bob".into(),
            },
        );
        hub.deliver(outcome.deliveries);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::UserJoined(_))));
        assert!(matches!(rx_b.try_recv(), Ok(ServerEvent::RoomJoined(_))));

        let outcome = hub.disconnect(b);
        hub.deliver(outcome.deliveries);
        assert!(matches!(rx_a.try_recv(), Ok(ServerEvent::UserLeft(_))));
        assert!(rx_b.try_recv().is_err());
    }
}
