//! The real-time room core: connection registry, room table, presence, message relay and
//! read receipts, plus the websocket transport that feeds them.

pub mod events;
mod hub;
mod msg;
mod presence;
mod receipts;
pub mod registry;
pub mod table;
mod ws;

pub use hub::{Delivery, Effect, Hub, Outcome};
pub use msg::generate_message_id;

use axum::{Router, routing::get};

use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws::room_ws))
}
