//! Wire contract of the websocket endpoint.
//!
//! Every frame is a JSON text frame shaped `{"event": "<name>", "data": {...}}`. Inbound frames
//! are parsed into [`ClientEvent`] and validated here, so nothing malformed reaches room logic.
//! Outbound frames are [`ServerEvent`]s.

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{GetField, error::RoomError};

pub type ConnId = uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

impl std::str::FromStr for MediaKind {
    type Err = RoomError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(Self::Image),
            "video" => Ok(Self::Video),
            "audio" => Ok(Self::Audio),
            "document" => Ok(Self::Document),
            other => Err(RoomError::validation(format!("unsupported mediaType `{other}`"))),
        }
    }
}

/// A chat message as relayed to room members and handed to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub room_id: String,
    pub message: String,
    pub sender: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<MediaKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub message_id: String,
    #[serde(default)]
    pub read_by: Vec<String>,
}

/// Inbound `send-message` after validation. `message_id` is still optional: the relay fills it.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub room_id: String,
    pub body: String,
    pub sender: String,
    pub timestamp: Option<OffsetDateTime>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub file_name: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReceipt {
    pub message_id: String,
    pub room_id: String,
    pub user_name: String,
}

/// Validated inbound events.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    CreateRoom {
        room_id: String,
        room_name: String,
        creator_name: String,
    },
    JoinRoom {
        room_id: String,
        user_name: String,
    },
    SendMessage(NewMessage),
    LeaveRoom {
        room_id: String,
    },
    /// `None` when the receipt was missing a field; those are dropped without a reply.
    MarkMessageRead(Option<ReadReceipt>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRoomData {
    room_id: Option<String>,
    room_name: Option<String>,
    creator_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRoomData {
    room_id: Option<String>,
    user_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SendMessageData {
    pub room_id: Option<String>,
    pub message: Option<String>,
    pub sender: Option<String>,
    pub timestamp: Option<String>,
    pub media_url: Option<String>,
    pub media_type: Option<String>,
    pub file_name: Option<String>,
    pub message_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeaveRoomData {
    room_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkReadData {
    message_id: Option<String>,
    room_id: Option<String>,
    user_name: Option<String>,
}

/// Present and non-empty, or a validation error naming the field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, RoomError> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(RoomError::missing(field)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl SendMessageData {
    pub(crate) fn validate(self) -> Result<NewMessage, RoomError> {
        let room_id = required(self.room_id, "roomId")?;
        let sender = required(self.sender, "sender")?;
        let media_url = non_empty(self.media_url);
        let body = match (non_empty(self.message), &media_url) {
            (Some(body), _) => body,
            (None, Some(_)) => String::new(),
            (None, None) => return Err(RoomError::missing("message")),
        };
        let media_type = non_empty(self.media_type)
            .map(|kind| kind.parse::<MediaKind>())
            .transpose()?;
        let timestamp = non_empty(self.timestamp)
            .map(|ts| {
                OffsetDateTime::parse(&ts, &Rfc3339)
                    .map_err(|_| RoomError::validation(format!("invalid timestamp `{ts}`")))
            })
            .transpose()?;

        Ok(NewMessage {
            room_id,
            body,
            sender,
            timestamp,
            media_url,
            media_type,
            file_name: non_empty(self.file_name),
            message_id: non_empty(self.message_id),
        })
    }
}

impl ReadReceipt {
    /// Receipts with missing fields, or no `data` object at all, come back as `None`.
    fn from_data(data: Option<&serde_json::Value>) -> Option<Self> {
        let data = MarkReadData::deserialize(data.filter(|v| v.is_object())?).ok()?;
        Some(ReadReceipt {
            message_id: non_empty(data.message_id)?,
            room_id: non_empty(data.room_id)?,
            user_name: non_empty(data.user_name)?,
        })
    }
}

impl ClientEvent {
    /// Parse and validate one inbound text frame.
    pub fn parse(frame: &str) -> Result<Self, RoomError> {
        let value: serde_json::Value = serde_json::from_str(frame)?;
        let event = value.get_str_field("event")?;
        if event == "mark-message-read" {
            return Ok(Self::MarkMessageRead(ReadReceipt::from_data(value.get("data"))));
        }
        let data = value.get_obj_field("data")?.clone();

        match event.as_str() {
            "create-room" => {
                let data: CreateRoomData = serde_json::from_value(data)?;
                Ok(Self::CreateRoom {
                    room_id: required(data.room_id, "roomId")?,
                    room_name: required(data.room_name, "roomName")?,
                    creator_name: required(data.creator_name, "creatorName")?,
                })
            }
            "join-room" => {
                let data: JoinRoomData = serde_json::from_value(data)?;
                Ok(Self::JoinRoom {
                    room_id: required(data.room_id, "roomId")?,
                    user_name: required(data.user_name, "userName")?,
                })
            }
            "send-message" => {
                let data: SendMessageData = serde_json::from_value(data)?;
                Ok(Self::SendMessage(data.validate()?))
            }
            "leave-room" => {
                let data: LeaveRoomData = serde_json::from_value(data)?;
                Ok(Self::LeaveRoom {
                    room_id: required(data.room_id, "roomId")?,
                })
            }
            "mark-message-read" => {
                let receipt = serde_json::from_value::<MarkReadData>(data)
                    .ok()
                    .and_then(|data| {
                        Some(ReadReceipt {
                            message_id: non_empty(data.message_id)?,
                            room_id: non_empty(data.room_id)?,
                            user_name: non_empty(data.user_name)?,
                        })
                    });
                Ok(Self::MarkMessageRead(receipt))
            }
            other => Err(RoomError::validation(format!("unknown event `{other}`"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomCreated {
    pub room_id: String,
    pub room_name: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    pub room_id: String,
    pub room_name: String,
    pub participants: Vec<String>,
    pub success: bool,
}

/// Payload of both `user-joined` and `user-left`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceChange {
    pub user_id: ConnId,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRead {
    pub message_id: String,
    pub user_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomErrorBody {
    pub error: String,
    pub success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    RoomCreated(RoomCreated),
    RoomJoined(RoomJoined),
    UserJoined(PresenceChange),
    ReceiveMessage(ChatMessage),
    UserLeft(PresenceChange),
    MessageRead(MessageRead),
    RoomError(RoomErrorBody),
}

impl From<RoomError> for ServerEvent {
    fn from(err: RoomError) -> Self {
        Self::RoomError(RoomErrorBody {
            error: err.to_string(),
            success: false,
        })
    }
}
