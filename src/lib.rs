pub mod config;
pub mod error;
pub mod history;
pub mod rooms;

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::FromRef,
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use config::Config;
use error::RoomError;
use history::{EffectQueue, MessageStore};
use rooms::Hub;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub hub: Arc<Hub>,
    pub store: Arc<dyn MessageStore>,
    pub config: Arc<Config>,
    pub effects: EffectQueue,
}

impl AppState {
    /// Must be called inside a tokio runtime: it starts the persistence worker.
    pub fn new(config: Config, store: Arc<dyn MessageStore>) -> Self {
        Self {
            hub: Arc::new(Hub::new()),
            effects: EffectQueue::spawn(store.clone()),
            store,
            config: Arc::new(config),
        }
    }
}

/// The full HTTP + websocket application.
pub fn app(state: AppState) -> anyhow::Result<Router> {
    let origin: HeaderValue = state.config.cors_origin.parse()?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PATCH])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Ok(Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(rooms::router())
        .nest("/api", history::router())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http()))
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> Result<String, RoomError>;
    fn get_obj_field(&self, field: &str) -> Result<&Value, RoomError>;
}

impl GetField for serde_json::Value {
    fn get_str_field(&self, field: &str) -> Result<String, RoomError> {
        Ok(self
            .get(field)
            .ok_or_else(|| RoomError::missing(field))?
            .as_str()
            .ok_or_else(|| RoomError::validation(format!("expected `{field}` to be a string")))?
            .to_owned())
    }

    fn get_obj_field(&self, field: &str) -> Result<&Value, RoomError> {
        self.get(field)
            .filter(|v| v.is_object())
            .ok_or_else(|| RoomError::validation(format!("expected `{field}` to be an object")))
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: anyhow::Error,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: anyhow::Error::msg(msg.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.error, "request failed");
            return (self.status, Json(json!({ "error": "Server error" }))).into_response();
        }
        (self.status, Json(json!({ "error": self.error.to_string() }))).into_response()
    }
}

macro_rules! apperr_impl {
    ($E:ty) => {
        impl From<$E> for AppError {
            fn from(err: $E) -> Self {
                Self {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    error: anyhow::Error::from(err),
                }
            }
        }
    };
}

apperr_impl!(serde_json::Error);
apperr_impl!(history::StoreError);
