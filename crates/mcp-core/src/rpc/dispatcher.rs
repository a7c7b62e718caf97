use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use mcp_protocol::{JsonRpcMessage, RequestId, RequestIdGenerator};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::McpCoreError;
use crate::rpc::cancellation::CancellationRegistry;
use crate::rpc::filter::MessageFilter;
use crate::rpc::handler::{NotificationHandler, RequestHandler};
use crate::rpc::pending::PendingRequests;

const CANCELLED_NOTIFICATION: &str = "notifications/cancelled";

tokio::task_local! {
    /// Bound for the duration of one `dispatch_request_streaming` call: lets
    /// `notify`/`send` redirect onto the response pipe of the specific POST
    /// that's waiting on this request, instead of the session-wide outbound
    /// channel, so progress notifications interleave in that one response.
    static CURRENT_RESPONSE_SINK: mpsc::UnboundedSender<JsonRpcMessage>;
}

/// Correlates outbound requests with their eventual responses and routes
/// inbound requests/notifications to registered handlers. Generalizes the
/// teacher's `JsonRpcTransport` (`mcp/jsonrpc.rs`) from a one-shot child
/// process's stdio pipe to either side of a long-lived MCP session.
pub struct Dispatcher {
    outbound: mpsc::UnboundedSender<String>,
    pending: PendingRequests,
    ids: RequestIdGenerator,
    requests: RwLock<HashMap<String, Arc<dyn RequestHandler>>>,
    notifications: RwLock<HashMap<String, Vec<Arc<dyn NotificationHandler>>>>,
    filters: RwLock<Vec<Arc<dyn MessageFilter>>>,
    cancellations: CancellationRegistry,
}

impl Dispatcher {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            outbound,
            pending: PendingRequests::new(),
            ids: RequestIdGenerator::new(),
            requests: RwLock::new(HashMap::new()),
            notifications: RwLock::new(HashMap::new()),
            filters: RwLock::new(Vec::new()),
            cancellations: CancellationRegistry::new(),
        }
    }

    pub fn on_request(&self, method: impl Into<String>, handler: Arc<dyn RequestHandler>) {
        self.requests.write().unwrap().insert(method.into(), handler);
    }

    /// Registers an additional handler for `method`; every handler
    /// registered for a method runs (concurrently) when a matching
    /// notification arrives, in no particular order.
    pub fn on_notification(&self, method: impl Into<String>, handler: Arc<dyn NotificationHandler>) {
        self.notifications.write().unwrap().entry(method.into()).or_default().push(handler);
    }

    /// Installs a session-wide filter around every inbound request. The
    /// last filter registered is the outermost: its `before_request` runs
    /// first and its `after_request` runs last, wrapping everything
    /// registered before it.
    pub fn register_message_filter(&self, filter: Arc<dyn MessageFilter>) {
        self.filters.write().unwrap().push(filter);
    }

    /// Sends a request to the peer and awaits its response.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, McpCoreError> {
        let id = self.ids.next();
        let rx = self.pending.register(id.clone()).await;
        self.send(&JsonRpcMessage::request(id, method, params))?;
        rx.await
            .map_err(|_| McpCoreError::Internal("pending request dropped before it resolved".into()))?
    }

    /// Sends a fire-and-forget notification. When called from within a
    /// `dispatch_request_streaming` flow, the notification is written to
    /// that request's response pipe instead of the session's outbound
    /// channel, so it interleaves with the eventual terminal response.
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), McpCoreError> {
        let message = JsonRpcMessage::notification(method, params);
        if let Ok(sink) = CURRENT_RESPONSE_SINK.try_with(Clone::clone) {
            return sink
                .send(message)
                .map_err(|_| McpCoreError::Internal("response pipe closed before notification was sent".into()));
        }
        self.send(&message)
    }

    /// Tells the peer to stop a request this side made, by id. Fire-and-forget.
    pub async fn cancel_outbound(&self, id: RequestId) -> Result<(), McpCoreError> {
        self.pending.cancel(&id).await;
        self.notify(CANCELLED_NOTIFICATION, Some(serde_json::json!({ "requestId": id })))
    }

    /// Feeds one decoded inbound message through the dispatcher: resolves a
    /// pending outbound call, or routes a request/notification to its
    /// handler and writes back the response.
    pub async fn dispatch_incoming(&self, message: JsonRpcMessage) {
        match message {
            JsonRpcMessage::Response { id, result } => {
                self.pending.resolve(&id, Ok(result)).await;
            }
            JsonRpcMessage::Error { id, error } => {
                let domain_error = McpCoreError::from_detail(error, id.clone());
                self.pending.resolve(&id, Err(domain_error)).await;
            }
            JsonRpcMessage::Notification { method, params } => {
                if method == CANCELLED_NOTIFICATION {
                    self.handle_cancelled_notification(params).await;
                    return;
                }
                let filters = self.filters.read().unwrap().clone();
                for filter in filters.iter() {
                    filter.on_notification(&method, &params).await;
                }
                let handlers = self.notifications.read().unwrap().get(&method).cloned();
                match handlers {
                    Some(handlers) if !handlers.is_empty() => {
                        let params = &params;
                        let method = &method;
                        futures::future::join_all(handlers.iter().map(|handler| async move {
                            if let Err(err) = handler.handle(params.clone()).await {
                                warn!(method = %method, error = %err, "notification handler failed");
                            }
                        }))
                        .await;
                    }
                    _ => warn!(method = %method, "no handler registered for notification"),
                }
            }
            JsonRpcMessage::Request { id, method, params } => {
                let response = self.dispatch_request(id, method, params).await;
                let _ = self.send(&response);
            }
        }
    }

    /// Runs a request's handler and returns its response directly, without
    /// touching the outbound sink. The Streamable HTTP POST handler uses this
    /// to correlate a request with its reply within a single HTTP exchange,
    /// rather than racing the shared outbound channel.
    pub async fn dispatch_request_direct(&self, id: RequestId, method: String, params: Option<Value>) -> JsonRpcMessage {
        self.dispatch_request(id, method, params).await
    }

    /// Like `dispatch_request_direct`, but any notification sent (e.g.
    /// progress) while the handler runs is pushed onto the returned channel
    /// ahead of the terminal response, instead of the session's outbound
    /// channel. The Streamable HTTP POST handler turns this into the
    /// interleaved SSE body a request's response is required to support.
    pub fn dispatch_request_streaming(
        self: &Arc<Self>,
        id: RequestId,
        method: String,
        params: Option<Value>,
    ) -> mpsc::UnboundedReceiver<JsonRpcMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let this = Arc::clone(self);
        let sink = tx.clone();
        tokio::spawn(async move {
            let response = CURRENT_RESPONSE_SINK.scope(sink, this.dispatch_request(id, method, params)).await;
            let _ = tx.send(response);
        });
        rx
    }

    async fn dispatch_request(&self, id: RequestId, method: String, params: Option<Value>) -> JsonRpcMessage {
        let filters = self.filters.read().unwrap().clone();

        let mut params = params;
        for filter in filters.iter().rev() {
            match filter.before_request(&method, params).await {
                Ok(next) => params = next,
                Err(err) => return JsonRpcMessage::error(id, err.into_detail()),
            }
        }

        let handler = self.requests.read().unwrap().get(&method).cloned();
        let mut outcome = match handler {
            Some(handler) => {
                let flag = self.cancellations.register(id.clone()).await;
                let outcome = handler.handle(params, flag).await;
                self.cancellations.unregister(&id).await;
                outcome
            }
            None => Err(McpCoreError::MethodNotFound(method.clone())),
        };

        for filter in filters.iter() {
            outcome = filter.after_request(&method, outcome).await;
        }

        match outcome {
            Ok(result) => JsonRpcMessage::response(id, result),
            Err(err) => JsonRpcMessage::error(id, err.into_detail()),
        }
    }

    async fn handle_cancelled_notification(&self, params: Option<Value>) {
        let Some(request_id) = params
            .as_ref()
            .and_then(|p| p.get("requestId"))
            .and_then(|v| serde_json::from_value::<RequestId>(v.clone()).ok())
        else {
            warn!("received notifications/cancelled without a valid requestId");
            return;
        };
        self.cancellations.cancel(&request_id).await;
    }

    fn send(&self, message: &JsonRpcMessage) -> Result<(), McpCoreError> {
        let encoded = mcp_protocol::encode(message)?;
        self.outbound
            .send(encoded)
            .map_err(|_| McpCoreError::Internal("outbound channel closed".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::handler::{FnNotificationHandler, FnRequestHandler};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn new_dispatcher() -> (Dispatcher, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Dispatcher::new(tx), rx)
    }

    #[tokio::test]
    async fn inbound_request_is_routed_and_answered() {
        let (dispatcher, mut rx) = new_dispatcher();
        dispatcher.on_request(
            "ping",
            Arc::new(FnRequestHandler(|_params| async { Ok(serde_json::json!({})) })),
        );

        dispatcher
            .dispatch_incoming(JsonRpcMessage::request(RequestId::Number(1), "ping", None))
            .await;

        let wire = rx.recv().await.unwrap();
        let response: JsonRpcMessage = serde_json::from_str(&wire).unwrap();
        assert!(matches!(response, JsonRpcMessage::Response { .. }));
    }

    #[tokio::test]
    async fn unknown_method_yields_method_not_found() {
        let (dispatcher, mut rx) = new_dispatcher();
        dispatcher
            .dispatch_incoming(JsonRpcMessage::request(RequestId::Number(1), "nope", None))
            .await;
        let wire = rx.recv().await.unwrap();
        let response: JsonRpcMessage = serde_json::from_str(&wire).unwrap();
        match response {
            JsonRpcMessage::Error { error, .. } => {
                assert_eq!(error.code, mcp_protocol::error_code::METHOD_NOT_FOUND);
            }
            other => panic!("expected an error response, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_notification_flips_the_handlers_flag() {
        let (dispatcher, mut rx) = new_dispatcher();
        let observed = Arc::new(AtomicBool::new(false));
        let observed_clone = Arc::clone(&observed);

        dispatcher.on_request(
            "slow",
            Arc::new(crate::rpc::handler::FnRequestHandler(move |_| {
                let observed = Arc::clone(&observed_clone);
                async move {
                    // In a real handler this would be polled between steps of
                    // actual work; here we just assert it can be observed.
                    let _ = &observed;
                    Ok(serde_json::json!(null))
                }
            })),
        );

        // Registering happens inside dispatch_request; exercise cancellation
        // against the lower-level registry directly instead, since the FnRequestHandler
        // above doesn't accept a CancellationFlag.
        let flag = dispatcher.cancellations.register(RequestId::Number(5)).await;
        dispatcher
            .dispatch_incoming(JsonRpcMessage::notification(
                "notifications/cancelled",
                Some(serde_json::json!({"requestId": 5})),
            ))
            .await;
        assert!(flag.is_cancelled());

        dispatcher
            .dispatch_incoming(JsonRpcMessage::request(RequestId::Number(1), "slow", None))
            .await;
        let _ = rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn notification_without_handler_is_dropped_silently() {
        let (dispatcher, mut rx) = new_dispatcher();
        dispatcher
            .dispatch_incoming(JsonRpcMessage::notification("notifications/whatever", None))
            .await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn registered_notification_handler_runs() {
        let (dispatcher, _rx) = new_dispatcher();
        let called = Arc::new(AtomicBool::new(false));
        let called_clone = Arc::clone(&called);
        dispatcher.on_notification(
            "notifications/initialized",
            Arc::new(FnNotificationHandler(move |_params| {
                let called = Arc::clone(&called_clone);
                async move {
                    called.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })),
        );
        dispatcher
            .dispatch_incoming(JsonRpcMessage::notification("notifications/initialized", None))
            .await;
        assert!(called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn all_handlers_registered_for_a_method_run() {
        let (dispatcher, _rx) = new_dispatcher();
        let first = Arc::new(AtomicBool::new(false));
        let second = Arc::new(AtomicBool::new(false));
        let (first_clone, second_clone) = (Arc::clone(&first), Arc::clone(&second));

        dispatcher.on_notification(
            "notifications/initialized",
            Arc::new(FnNotificationHandler(move |_params| {
                let first = Arc::clone(&first_clone);
                async move {
                    first.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })),
        );
        dispatcher.on_notification(
            "notifications/initialized",
            Arc::new(FnNotificationHandler(move |_params| {
                let second = Arc::clone(&second_clone);
                async move {
                    second.store(true, Ordering::SeqCst);
                    Ok(())
                }
            })),
        );

        dispatcher
            .dispatch_incoming(JsonRpcMessage::notification("notifications/initialized", None))
            .await;
        assert!(first.load(Ordering::SeqCst));
        assert!(second.load(Ordering::SeqCst));
    }

    struct RecordingFilter {
        log: Arc<std::sync::Mutex<Vec<&'static str>>>,
        tag: &'static str,
    }

    #[async_trait::async_trait]
    impl MessageFilter for RecordingFilter {
        async fn before_request(&self, _method: &str, params: Option<Value>) -> Result<Option<Value>, McpCoreError> {
            self.log.lock().unwrap().push(self.tag);
            Ok(params)
        }
    }

    #[tokio::test]
    async fn streaming_dispatch_interleaves_notifications_before_the_terminal_response() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let dispatcher = Arc::new(Dispatcher::new(tx));
        let dispatcher_for_handler = Arc::clone(&dispatcher);

        dispatcher.on_request(
            "slow",
            Arc::new(FnRequestHandler(move |_params| {
                let dispatcher = Arc::clone(&dispatcher_for_handler);
                async move {
                    dispatcher.notify("notifications/progress", Some(serde_json::json!({"progress": 1}))).unwrap();
                    dispatcher.notify("notifications/progress", Some(serde_json::json!({"progress": 2}))).unwrap();
                    Ok(serde_json::json!({"done": true}))
                }
            })),
        );

        let mut rx = dispatcher.dispatch_request_streaming(RequestId::Number(1), "slow".to_string(), None);
        let first = rx.recv().await.unwrap();
        assert!(matches!(first, JsonRpcMessage::Notification { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, JsonRpcMessage::Notification { .. }));
        let third = rx.recv().await.unwrap();
        assert!(matches!(third, JsonRpcMessage::Response { .. }));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn last_registered_filter_runs_outermost() {
        let (dispatcher, mut rx) = new_dispatcher();
        dispatcher.on_request(
            "ping",
            Arc::new(FnRequestHandler(|_params| async { Ok(serde_json::json!({})) })),
        );
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        dispatcher.register_message_filter(Arc::new(RecordingFilter { log: Arc::clone(&log), tag: "first" }));
        dispatcher.register_message_filter(Arc::new(RecordingFilter { log: Arc::clone(&log), tag: "second" }));

        dispatcher
            .dispatch_incoming(JsonRpcMessage::request(RequestId::Number(1), "ping", None))
            .await;
        let _ = rx.recv().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["second", "first"]);
    }
}
