use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use roomcast::{AppState, app, config::Config, history::MemoryStore};
use serde_json::{Value, json};
use tower::ServiceExt;

fn router() -> Router {
    let config = Config {
        history_limit: 2,
        ..Config::default()
    };
    app(AppState::new(config, Arc::new(MemoryStore::new()))).unwrap()
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn post_then_list() {
    let router = router();
    for (i, ts) in ["2024-05-01T10:00:00Z", "2024-05-01T10:01:00Z", "2024-05-01T10:02:00Z"]
        .into_iter()
        .enumerate()
    {
        let (status, body) = call(
            &router,
            "POST",
            "/api/messages",
            Some(json!({
                "roomId": "42",
                "message": format!("m{i}"),
                "sender": "Alice",
                "timestamp": ts,
                "readBy": ["Alice", "Eve"],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"]["readBy"], json!(["Alice"]));
    }

    let (status, body) = call(&router, "GET", "/api/messages?roomId=42", None).await;
    assert_eq!(status, StatusCode::OK);
    let bodies: Vec<_> = body["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(bodies, vec!["m1", "m2"]);
}

#[tokio::test]
async fn rejects_incomplete_requests() {
    let router = router();

    let (status, body) = call(&router, "GET", "/api/messages", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Room ID is required");

    let (status, body) = call(
        &router,
        "POST",
        "/api/messages",
        Some(json!({ "roomId": "42", "sender": "Alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields");

    let (status, _) = call(&router, "PATCH", "/api/messages", Some(json!({ "messageId": "x" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn patch_marks_read_once() {
    let router = router();
    let (_, body) = call(
        &router,
        "POST",
        "/api/messages",
        Some(json!({ "roomId": "42", "message": "hi", "sender": "Alice", "messageId": "m1" })),
    )
    .await;
    assert_eq!(body["message"]["messageId"], "m1");

    let patch = json!({ "messageId": "m1", "userName": "Bob" });
    let (status, body) = call(&router, "PATCH", "/api/messages", Some(patch.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"]["readBy"], json!(["Alice", "Bob"]));

    let (_, body) = call(&router, "PATCH", "/api/messages", Some(patch)).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Message not found or already read");
}

#[tokio::test]
async fn health_check() {
    let router = router();
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
