//! Message history: the persistence collaborator and its `/api/messages` routes.

mod store;
mod worker;

pub use store::{MemoryStore, MessageStore, StoreError};
pub use worker::EffectQueue;

use std::sync::Arc;

use axum::{
    Json, Router, debug_handler,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{AppError, AppResult, AppState, config::Config, rooms::events::SendMessageData};

pub fn router() -> Router<AppState> {
    Router::new().route(
        "/messages",
        get(list_messages).post(append_message).patch(mark_read),
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    room_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadBody {
    message_id: Option<String>,
    user_name: Option<String>,
}

#[debug_handler(state = AppState)]
async fn list_messages(
    State(store): State<Arc<dyn MessageStore>>,
    State(config): State<Arc<Config>>,
    Query(ListQuery { room_id }): Query<ListQuery>,
) -> AppResult<Json<Value>> {
    let Some(room_id) = room_id.filter(|r| !r.is_empty()) else {
        return Err(AppError::bad_request("Room ID is required"));
    };
    let messages = store.list_recent(&room_id, config.history_limit).await?;
    Ok(Json(json!({ "messages": messages })))
}

#[debug_handler(state = AppState)]
async fn append_message(
    State(store): State<Arc<dyn MessageStore>>,
    Json(data): Json<SendMessageData>,
) -> AppResult<Json<Value>> {
    if [&data.room_id, &data.message, &data.sender]
        .iter()
        .any(|field| field.as_deref().is_none_or(str::is_empty))
    {
        return Err(AppError::bad_request("Missing required fields"));
    }
    let message = data
        .validate()
        .map_err(|err| AppError::bad_request(err.to_string()))?
        .into_chat_message();

    store.append(message.clone()).await?;
    Ok(Json(json!({ "success": true, "message": message })))
}

#[debug_handler(state = AppState)]
async fn mark_read(
    State(store): State<Arc<dyn MessageStore>>,
    Json(MarkReadBody {
        message_id,
        user_name,
    }): Json<MarkReadBody>,
) -> AppResult<Json<Value>> {
    let (Some(message_id), Some(user_name)) = (
        message_id.filter(|m| !m.is_empty()),
        user_name.filter(|u| !u.is_empty()),
    ) else {
        return Err(AppError::bad_request("Missing required fields"));
    };

    let body = match store.mark_read(&message_id, &user_name).await? {
        Some(message) => json!({ "success": true, "message": message }),
        None => json!({ "success": false, "error": "Message not found or already read" }),
    };
    Ok(Json(body))
}
