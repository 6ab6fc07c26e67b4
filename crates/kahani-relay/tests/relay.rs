use axum::{
    http::{header, StatusCode},
    routing::{get, post},
    Json, Router,
};
use kahani_core::{BackendClient, ChatController, ChatRole};
use kahani_relay::{router, RelayState};
use serde_json::{json, Value};
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Backend that streams the request body back as a single token event.
fn echo_backend() -> Router {
    Router::new()
        .route(
            "/generate",
            post(|body: String| async move {
                let event = json!({ "token": body });
                (
                    [(header::CONTENT_TYPE, "text/event-stream")],
                    format!("event: token\r\ndata: {}\r\n\r\nevent: done\r\ndata: {{}}\r\n\r\n", event),
                )
            }),
        )
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok", "vocab_size": 250 })) }),
        )
}

async fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

#[tokio::test]
async fn stream_is_relayed_verbatim() {
    let backend = serve(echo_backend()).await;
    let relay = serve(router(RelayState::new(&backend))).await;

    let request_body = r#"{"prefix":"ایک دن","max_length":50}"#;
    let response = reqwest::Client::new()
        .post(format!("{}/generate", relay))
        .header("Content-Type", "application/json")
        .body(request_body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "text/event-stream");
    assert_eq!(response.headers()["cache-control"], "no-cache");

    let expected = format!(
        "event: token\r\ndata: {}\r\n\r\nevent: done\r\ndata: {{}}\r\n\r\n",
        json!({ "token": request_body })
    );
    assert_eq!(response.text().await.unwrap(), expected);
}

#[tokio::test]
async fn backend_error_status_is_wrapped() {
    let backend = serve(Router::new().route(
        "/generate",
        post(|| async { (StatusCode::UNPROCESSABLE_ENTITY, "Prefix cannot be empty.") }),
    ))
    .await;
    let relay = serve(router(RelayState::new(&backend))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate", relay))
        .json(&json!({ "prefix": " ", "max_length": 10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Prefix cannot be empty." }));
}

#[tokio::test]
async fn blank_prefix_rejection_keeps_backend_detail() {
    let backend = serve(Router::new().route(
        "/generate",
        post(|| async {
            (
                StatusCode::BAD_REQUEST,
                Json(json!({ "detail": "Prefix cannot be empty." })),
            )
        }),
    ))
    .await;
    let relay = serve(router(RelayState::new(&backend))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate", relay))
        .json(&json!({ "prefix": "", "max_length": 200 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    let error = body["error"].as_str().expect("error string");
    assert!(error.contains("Prefix cannot be empty."), "error was {:?}", error);
}

#[tokio::test]
async fn generate_against_unreachable_backend() {
    let relay = serve(router(RelayState::new(&unreachable_url().await))).await;

    let response = reqwest::Client::new()
        .post(format!("{}/generate", relay))
        .json(&json!({ "prefix": "x", "max_length": 10 }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "error": "Failed to connect to backend" }));
}

#[tokio::test]
async fn health_against_unreachable_backend() {
    let relay = serve(router(RelayState::new(&unreachable_url().await))).await;

    for path in ["/generate", "/health"] {
        let response = reqwest::get(format!("{}{}", relay, path)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY, "path {}", path);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body, json!({ "status": "error", "message": "Backend not reachable" }));
    }
}

#[tokio::test]
async fn health_is_relayed() {
    let backend = serve(echo_backend()).await;
    let relay = serve(router(RelayState::new(&backend))).await;

    let response = reqwest::get(format!("{}/generate", relay)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok", "vocab_size": 250 }));
}

#[tokio::test]
async fn non_json_health_counts_as_unreachable() {
    let backend = serve(Router::new().route("/health", get(|| async { "up" }))).await;
    let relay = serve(router(RelayState::new(&backend))).await;

    let response = reqwest::get(format!("{}/health", relay)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn controller_streams_through_relay() {
    let backend = serve(echo_backend()).await;
    let relay = serve(router(RelayState::new(&backend))).await;
    let mut controller = ChatController::new(42);

    controller.run(&BackendClient::new(&relay), "ایک دن").await;

    let reply = &controller.messages()[1];
    assert_eq!(reply.role, ChatRole::Assistant);
    let forwarded: Value = serde_json::from_str(&reply.content).unwrap();
    assert_eq!(forwarded, json!({ "prefix": "ایک دن", "max_length": 42 }));
}
