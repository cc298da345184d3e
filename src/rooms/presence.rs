//! Presence Engine: create, join, leave and disconnect.

use time::OffsetDateTime;
use tracing::{debug, info};

use super::events::{ConnId, PresenceChange, RoomCreated, RoomJoined, ServerEvent};
use super::hub::{Hub, Outcome};
use crate::error::RoomError;

impl Hub {
    pub fn create_room(
        &self,
        conn: ConnId,
        room_id: String,
        room_name: String,
        creator_name: String,
    ) -> Result<Outcome, RoomError> {
        let Some(((), mut outcome)) = self.enter(conn, &room_id, &creator_name, || {
            self.rooms
                .create(&room_id, room_name.clone(), conn, creator_name.clone())
        })?
        else {
            return Ok(Outcome::default());
        };
        info!(
            %room_id,
            %room_name,
            creator = %creator_name,
            active_rooms = self.rooms.len(),
            "room created"
        );

        outcome.push(
            conn,
            ServerEvent::RoomCreated(RoomCreated {
                room_id,
                room_name,
                success: true,
            }),
        );
        Ok(outcome)
    }

    pub fn join_room(
        &self,
        conn: ConnId,
        room_id: String,
        user_name: String,
    ) -> Result<Outcome, RoomError> {
        let Some((joined, mut outcome)) = self
            .enter(conn, &room_id, &user_name, || {
                self.rooms.join(&room_id, conn, user_name.clone())
            })
            .inspect_err(|_| info!(%room_id, user = %user_name, "join attempt for missing room"))?
        else {
            return Ok(Outcome::default());
        };
        info!(%room_id, user = %user_name, "user joined room");

        outcome.fan_out(
            joined.notify,
            ServerEvent::UserJoined(PresenceChange {
                user_id: conn,
                user_name,
                timestamp: OffsetDateTime::now_utc(),
            }),
        );
        outcome.push(
            conn,
            ServerEvent::RoomJoined(RoomJoined {
                room_id,
                room_name: joined.room_name,
                participants: joined.participants,
                success: true,
            }),
        );
        Ok(outcome)
    }

    /// Leaving a room the connection is not in does nothing.
    pub fn leave_room(&self, conn: ConnId, room_id: &str) -> Outcome {
        self.registry.with_membership(conn, |membership| {
            if membership.room_id.as_deref() == Some(room_id) {
                membership.room_id = None;
            }
        });
        self.depart(conn, room_id)
    }

    /// Transport-level teardown. Safe to call repeatedly; only the first call does anything.
    pub fn disconnect(&self, conn: ConnId) -> Outcome {
        let Some(membership) = self.registry.remove(conn) else {
            return Outcome::default();
        };
        info!(%conn, name = ?membership.name, "connection closed");
        match membership.room_id {
            Some(room_id) => self.depart(conn, &room_id),
            None => Outcome::default(),
        }
    }

    /// Apply `change` to the room table and record `room_id` as the connection's room, leaving
    /// whichever room it was in before. All of it happens under the connection's registry entry,
    /// so a concurrent disconnect either sees the new room or runs before anything changed.
    ///
    /// `Ok(None)` means the connection is already gone and nothing was touched.
    fn enter<T>(
        &self,
        conn: ConnId,
        room_id: &str,
        name: &str,
        change: impl FnOnce() -> Result<T, RoomError>,
    ) -> Result<Option<(T, Outcome)>, RoomError> {
        let entered = self.registry.with_membership(conn, |membership| -> Result<_, RoomError> {
            let snapshot = change()?;
            membership.name = Some(name.to_owned());
            let outcome = match membership.room_id.replace(room_id.to_owned()) {
                Some(previous) if previous != room_id => self.depart(conn, &previous),
                _ => Outcome::default(),
            };
            Ok((snapshot, outcome))
        });
        match entered {
            Some(result) => result.map(Some),
            None => {
                debug!(%conn, %room_id, "ignored room change from closed connection");
                Ok(None)
            }
        }
    }

    fn depart(&self, conn: ConnId, room_id: &str) -> Outcome {
        let mut outcome = Outcome::default();
        let Some(left) = self.rooms.leave(room_id, conn) else {
            return outcome;
        };
        if left.closed {
            let open_for = OffsetDateTime::now_utc() - left.created_at;
            info!(
                %room_id,
                user = %left.name,
                open_secs = open_for.whole_seconds(),
                "last participant left, room deleted"
            );
            return outcome;
        }
        info!(%room_id, user = %left.name, "user left room");
        outcome.fan_out(
            left.notify,
            ServerEvent::UserLeft(PresenceChange {
                user_id: conn,
                user_name: left.name,
                timestamp: OffsetDateTime::now_utc(),
            }),
        );
        outcome
    }
}
