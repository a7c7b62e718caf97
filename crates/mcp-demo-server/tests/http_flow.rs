use axum::body::Body;
use axum::http::{Request, StatusCode};
use mcp_demo_server::build_app;
use serde_json::{json, Value};
use tower::ServiceExt;

const SESSION_HEADER: &str = "mcp-session-id";

async fn post(app: axum::Router, session_id: Option<&str>, body: Value) -> (StatusCode, Option<String>, Value) {
    let mut builder = Request::builder().method("POST").uri("/mcp").header("content-type", "application/json");
    if let Some(id) = session_id {
        builder = builder.header(SESSION_HEADER, id);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let returned_session = response
        .headers()
        .get(SESSION_HEADER)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    // A request's response now arrives as an SSE body (zero or more
    // `notifications/progress` events ahead of the terminal
    // Response/Error); take the payload of the last `data:` line. Plain
    // JSON error bodies and empty notification-ack bodies fall back
    // unchanged.
    let text = String::from_utf8_lossy(&bytes);
    let last_event_payload = text
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .last();
    let value: Value = match last_event_payload {
        Some(payload) => serde_json::from_str(payload).unwrap(),
        None if bytes.is_empty() => Value::Null,
        None => serde_json::from_slice(&bytes).unwrap(),
    };
    (status, returned_session, value)
}

async fn initialize(app: axum::Router) -> String {
    let (status, session_id, _) = post(
        app,
        None,
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": "2025-06-18",
                "capabilities": {},
                "clientInfo": {"name": "integration-test", "version": "0.0.0"}
            }
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    session_id.expect("initialize must assign a session id")
}

#[tokio::test]
async fn handshake_then_tools_list_then_echo_call() {
    let app = build_app();
    let session_id = initialize(app.clone()).await;

    let (_, _, list) = post(app.clone(), Some(&session_id), json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
    let names: Vec<&str> = list["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"echo"));
    assert!(names.contains(&"slow_count"));

    let (_, _, echoed) = post(
        app,
        Some(&session_id),
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "echo", "arguments": {"text": "hello"}}
        }),
    )
    .await;
    assert_eq!(echoed["result"]["content"][0]["text"], json!("hello"));
}

#[tokio::test]
async fn task_augmented_slow_count_reports_a_task_then_completes() {
    let app = build_app();
    let session_id = initialize(app.clone()).await;

    let (_, _, call) = post(
        app.clone(),
        Some(&session_id),
        json!({
            "jsonrpc": "2.0",
            "id": 4,
            "method": "tools/call",
            "params": {
                "name": "slow_count",
                "arguments": {"count": 1},
                "task": {}
            }
        }),
    )
    .await;
    let task_id = call["result"]["task"]["taskId"].as_str().unwrap().to_string();
    assert_eq!(call["result"]["task"]["status"], json!("working"));

    let mut completed = false;
    for _ in 0..50 {
        let (_, _, polled) = post(
            app.clone(),
            Some(&session_id),
            json!({"jsonrpc": "2.0", "id": 5, "method": "tasks/get", "params": {"taskId": task_id}}),
        )
        .await;
        if polled["result"]["task"]["status"] == json!("completed") {
            completed = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }
    assert!(completed, "slow_count task never reached completed status");
}

#[tokio::test]
async fn requests_before_initialize_need_a_session_header() {
    let app = build_app();
    let (status, _, _) = post(app, None, json!({"jsonrpc": "2.0", "id": 1, "method": "ping"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
