use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use futures::stream::{self, Stream, StreamExt};
use mcp_protocol::{Implementation, JsonRpcMessage, RequestId, ServerCapabilities};
use serde_json::Value;
use tokio_stream::wrappers::{BroadcastStream, UnboundedReceiverStream};

use crate::session::Session;
use crate::tasks::TaskStore;
use crate::transport::event_store::{EventStore, InMemoryEventStore};
use crate::transport::headers::{LAST_EVENT_ID_HEADER, MCP_SESSION_ID_HEADER};
use crate::transport::registry::{SessionInitializer, SessionRegistry};

/// Shared state behind the `/mcp` Streamable HTTP endpoint.
pub struct StreamableHttpState {
    pub sessions: Arc<SessionRegistry>,
    pub event_store: Arc<dyn EventStore>,
    pub task_store: Arc<dyn TaskStore>,
    pub server_capabilities: ServerCapabilities,
    pub server_info: Implementation,
    pub session_initializer: Option<SessionInitializer>,
}

impl StreamableHttpState {
    pub fn new(server_capabilities: ServerCapabilities, server_info: Implementation, task_store: Arc<dyn TaskStore>) -> Arc<Self> {
        Arc::new(Self {
            sessions: Arc::new(SessionRegistry::new()),
            event_store: Arc::new(InMemoryEventStore::default()),
            task_store,
            server_capabilities,
            server_info,
            session_initializer: None,
        })
    }

    /// Registers a hook that runs against every session right after it is
    /// created, typically to wire tool/prompt/resource handlers onto it.
    pub fn with_session_initializer<F>(mut self: Arc<Self>, initializer: F) -> Arc<Self>
    where
        F: Fn(&Arc<Session>) + Send + Sync + 'static,
    {
        Arc::get_mut(&mut self)
            .expect("with_session_initializer must be called before the state is shared")
            .session_initializer = Some(Arc::new(initializer));
        self
    }
}

pub fn router(state: Arc<StreamableHttpState>) -> Router {
    Router::new()
        .route("/mcp", post(handle_post).get(handle_get).delete(handle_delete))
        .with_state(state)
}

struct McpHttpError {
    status: StatusCode,
    message: String,
}

impl McpHttpError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for McpHttpError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

fn require_session_header(headers: &HeaderMap) -> Result<String, McpHttpError> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| McpHttpError::new(StatusCode::BAD_REQUEST, "missing mcp-session-id header"))
}

async fn handle_post(
    State(state): State<Arc<StreamableHttpState>>,
    headers: HeaderMap,
    Json(message): Json<JsonRpcMessage>,
) -> Result<Response, McpHttpError> {
    if let JsonRpcMessage::Request { id, method, params } = &message {
        if method == "initialize" {
            return handle_initialize_post(state, id.clone(), params.clone()).await;
        }
    }

    let session_id = require_session_header(&headers)?;
    let http_session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| McpHttpError::new(StatusCode::NOT_FOUND, "unknown mcp-session-id"))?;

    match message {
        JsonRpcMessage::Request { id, method, params } => {
            let rx = http_session.session.dispatcher.dispatch_request_streaming(id, method, params);
            Ok(request_sse_response(rx))
        }
        JsonRpcMessage::Notification { .. } | JsonRpcMessage::Response { .. } | JsonRpcMessage::Error { .. } => {
            http_session.session.dispatcher.dispatch_incoming(message).await;
            Ok(StatusCode::ACCEPTED.into_response())
        }
    }
}

async fn handle_initialize_post(
    state: Arc<StreamableHttpState>,
    id: RequestId,
    params: Option<Value>,
) -> Result<Response, McpHttpError> {
    let http_session = state
        .sessions
        .create(
            state.server_capabilities.clone(),
            state.server_info.clone(),
            Arc::clone(&state.task_store),
            Arc::clone(&state.event_store),
            state.session_initializer.as_ref(),
        )
        .await;

    let rx = http_session
        .session
        .dispatcher
        .dispatch_request_streaming(id, "initialize".to_string(), params);
    let mut http_response = request_sse_response(rx);
    let session_id = http_session.session.id.clone();
    http_response
        .headers_mut()
        .insert(MCP_SESSION_ID_HEADER, session_id.parse().unwrap());
    Ok(http_response)
}

/// Turns a request's response pipe into the SSE body a Streamable HTTP POST
/// answers with: zero or more server-initiated messages (e.g.
/// `notifications/progress`) followed by exactly one terminal
/// Response/Error. The stream ends on its own once that terminal message is
/// sent, since `dispatch_request_streaming` drops every sender it holds
/// right after sending it.
fn request_sse_response(rx: tokio::sync::mpsc::UnboundedReceiver<JsonRpcMessage>) -> Response {
    let stream = UnboundedReceiverStream::new(rx).map(|message| {
        let payload = mcp_protocol::encode(&message).unwrap_or_default();
        Ok::<_, std::convert::Infallible>(Event::default().data(payload))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))).into_response()
}

async fn handle_get(
    State(state): State<Arc<StreamableHttpState>>,
    headers: HeaderMap,
) -> Result<Response, McpHttpError> {
    let session_id = require_session_header(&headers)?;
    let http_session = state
        .sessions
        .get(&session_id)
        .await
        .ok_or_else(|| McpHttpError::new(StatusCode::NOT_FOUND, "unknown mcp-session-id"))?;

    // A session may have only one live GET stream at a time; a second
    // concurrent GET is rejected outright rather than racing the first for
    // the broadcast subscription.
    if !http_session.try_open_get_stream() {
        return Err(McpHttpError::new(
            StatusCode::CONFLICT,
            "a GET stream is already open for this session",
        ));
    }

    let last_event_id: u64 = headers
        .get(LAST_EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);

    let Some(backlog) = state.event_store.replay_since(&session_id, last_event_id).await else {
        http_session.close_get_stream();
        return Err(McpHttpError::new(
            StatusCode::GONE,
            "the requested Last-Event-ID has fallen out of the backlog; restart the session",
        ));
    };
    let replay = stream::iter(backlog.into_iter().map(to_sse_event));

    let live = BroadcastStream::new(http_session.live.subscribe())
        .filter_map(|item| async move { item.ok() })
        .map(to_sse_event);

    let merged = replay.chain(live).map(Ok::<Event, axum::Error>);
    let guarded = GetStreamGuard {
        inner: Box::pin(merged),
        http_session,
    };

    Ok(Sse::new(guarded).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))).into_response())
}

/// Wraps the SSE body stream so the session's single-GET-stream slot is
/// released on drop, whether that's a clean end-of-stream or the client
/// disconnecting mid-stream.
struct GetStreamGuard<S> {
    inner: std::pin::Pin<Box<S>>,
    http_session: Arc<crate::transport::registry::HttpSession>,
}

impl<S: Stream> Stream for GetStreamGuard<S> {
    type Item = S::Item;

    fn poll_next(mut self: std::pin::Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> std::task::Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl<S> Drop for GetStreamGuard<S> {
    fn drop(&mut self) {
        self.http_session.close_get_stream();
    }
}

async fn handle_delete(State(state): State<Arc<StreamableHttpState>>, headers: HeaderMap) -> Result<StatusCode, McpHttpError> {
    let session_id = require_session_header(&headers)?;
    state.sessions.remove(&session_id).await;
    state.event_store.forget(&session_id).await;
    Ok(StatusCode::NO_CONTENT)
}

fn to_sse_event(stored: crate::transport::event_store::StoredEvent) -> Event {
    Event::default().id(stored.id.to_string()).data(stored.payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::InMemoryTaskStore;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> Arc<StreamableHttpState> {
        StreamableHttpState::new(
            ServerCapabilities::default(),
            Implementation {
                name: "demo".into(),
                version: "0.1.0".into(),
            },
            Arc::new(InMemoryTaskStore::new()),
        )
    }

    fn initialize_body() -> Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": {
                "protocolVersion": crate::session::PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "1.0"}
            }
        })
    }

    #[tokio::test]
    async fn initialize_post_assigns_a_session_id_header() {
        let app = router(test_state());
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(initialize_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(MCP_SESSION_ID_HEADER).is_some());
    }

    #[tokio::test]
    async fn request_without_session_header_is_rejected() {
        let app = router(test_state());
        let body = serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn ping_after_initialize_succeeds() {
        let state = test_state();
        let app = router(Arc::clone(&state));

        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(initialize_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let session_id = init_response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let ping_body = serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header(MCP_SESSION_ID_HEADER, session_id)
                    .body(Body::from(ping_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn ping_post_response_is_an_sse_body_carrying_the_terminal_response() {
        let state = test_state();
        let app = router(Arc::clone(&state));

        let init_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(initialize_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let session_id = init_response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let ping_body = serde_json::json!({"jsonrpc": "2.0", "id": 2, "method": "ping"});
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .header(MCP_SESSION_ID_HEADER, session_id)
                    .body(Body::from(ping_body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&bytes);
        let payload = text.lines().filter_map(|line| line.strip_prefix("data:")).map(str::trim).last().unwrap();
        let decoded: JsonRpcMessage = serde_json::from_str(payload).unwrap();
        assert!(matches!(decoded, JsonRpcMessage::Response { result, .. } if result == serde_json::json!({})));
    }

    #[tokio::test]
    async fn a_second_concurrent_get_is_rejected() {
        let state = test_state();

        let init_response = router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/mcp")
                    .header("content-type", "application/json")
                    .body(Body::from(initialize_body().to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let session_id = init_response
            .headers()
            .get(MCP_SESSION_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let http_session = state.sessions.get(&session_id).await.unwrap();
        assert!(http_session.try_open_get_stream());

        let response = router(Arc::clone(&state))
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/mcp")
                    .header(MCP_SESSION_ID_HEADER, session_id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        http_session.close_get_stream();
    }
}
