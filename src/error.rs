use thiserror::Error;

/// Errors the room core reports back to the originating connection as `room-error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoomError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Room already exists")]
    RoomAlreadyExists,

    #[error("{0}")]
    Validation(String),
}

impl RoomError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn missing(field: &str) -> Self {
        Self::Validation(format!("missing required field `{field}`"))
    }
}

impl From<serde_json::Error> for RoomError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("malformed event: {err}"))
    }
}
