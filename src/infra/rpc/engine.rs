//! Bidirectional JSON-RPC engine
//!
//! As a client it issues correlated requests and notifications; as a
//! dispatcher it routes inbound requests and notifications to registered
//! handlers and resolves inbound responses against outstanding calls.

use std::collections::HashMap;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use super::protocol::{
    Message, Notification, Request, RequestId, Response, ResponseError, methods,
};
use super::writer::Writer;
use crate::config::RuntimeConfig;
use crate::error::RpcError;
use crate::infra::channel::{FromServer, IntoServer, ResponseRouter};

type MethodHandler =
    Arc<dyn Fn(Option<Value>) -> BoxFuture<'static, Result<Value, ResponseError>> + Send + Sync>;
type NotificationHandler = Arc<dyn Fn(Value) + Send + Sync>;

pub struct RpcEngine {
    writer: Writer,
    responses: ResponseRouter,
    next_id: AtomicU64,
    methods: RwLock<HashMap<String, MethodHandler>>,
    notification_handlers: RwLock<HashMap<String, NotificationHandler>>,
    config: RuntimeConfig,
}

impl RpcEngine {
    pub fn new(
        into_server: Arc<dyn IntoServer>,
        from_server: &FromServer,
        config: RuntimeConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            writer: Writer::new(into_server, from_server, config.base_timeout()),
            responses: from_server.responses().clone(),
            next_id: AtomicU64::new(1),
            methods: RwLock::new(HashMap::new()),
            notification_handlers: RwLock::new(HashMap::new()),
            config,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Number of requests still waiting for a response
    pub fn pending_count(&self) -> usize {
        self.responses.pending_count()
    }

    // ------------------------------------------------------------------
    // Client side
    // ------------------------------------------------------------------

    /// Send a request and wait for its response, bounded by the method deadline
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> Result<T, RpcError> {
        let value = self.call(method, params, None).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Protocol(e.to_string()))
    }

    /// Like `request`, but also gives up when `cancel` fires
    pub async fn request_with<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: &CancellationToken,
    ) -> Result<T, RpcError> {
        let value = self.call(method, params, Some(cancel)).await?;
        serde_json::from_value(value).map_err(|e| RpcError::Protocol(e.to_string()))
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Register before sending so the reply cannot race the waiter
        let pending = self.responses.get(RequestId::Number(id))?;

        tracing::trace!("LSP request {}: {}", id, method);
        self.writer.send(&Request::new(id, method, params).into())?;

        let deadline = self.config.timeout_for(method);
        let cancelled = async {
            match cancel {
                Some(token) => token.cancelled().await,
                None => std::future::pending().await,
            }
        };

        let response = tokio::select! {
            result = timeout(deadline, pending) => match result {
                Ok(response) => response?,
                Err(_) => {
                    self.cancel_request(id);
                    return Err(RpcError::Timeout {
                        method: method.to_string(),
                        after: deadline,
                    });
                }
            },
            _ = cancelled => {
                self.cancel_request(id);
                return Err(RpcError::Cancelled);
            }
        };

        Ok(response.into_result()?)
    }

    /// Tell the server a request is abandoned; its waiter is already gone
    fn cancel_request(&self, id: u64) {
        tracing::debug!("Abandoning request {}", id);
        let _ = self.notify(methods::CANCEL_REQUEST, Some(serde_json::json!({ "id": id })));
    }

    /// Send a notification (no id, no response expected)
    pub fn notify(&self, method: &str, params: Option<Value>) -> Result<(), RpcError> {
        self.writer.send(&Notification::new(method, params).into())
    }

    // ------------------------------------------------------------------
    // Dispatcher side
    // ------------------------------------------------------------------

    /// Register a handler for inbound requests of `method`
    pub fn add_method<F, Fut>(&self, method: &str, handler: F)
    where
        F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ResponseError>> + Send + 'static,
    {
        let handler: MethodHandler = Arc::new(move |params| handler(params).boxed());
        self.methods
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), handler);
    }

    /// Register a handler for inbound notifications of `method`
    pub fn on_notification<F>(&self, method: &str, handler: F)
    where
        F: Fn(Value) + Send + Sync + 'static,
    {
        self.notification_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.to_string(), Arc::new(handler));
    }

    /// Classify one inbound message and route it
    pub async fn receive_and_send(&self, message: Message) {
        match message {
            Message::Response(response) => {
                self.responses.resolve(response);
            }
            Message::Request(request) => self.handle_request(request).await,
            Message::Notification(notification) => self.handle_notification(notification),
        }
    }

    async fn handle_request(&self, request: Request) {
        let handler = self
            .methods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&request.method)
            .cloned();

        let response = match handler {
            Some(handler) => match handler(request.params).await {
                Ok(result) => Response::success(request.id, result),
                Err(error) => Response::failure(request.id, error),
            },
            None => {
                tracing::debug!("Unhandled server request: {}", request.method);
                Response::failure(request.id, ResponseError::method_not_found(&request.method))
            }
        };

        if let Err(e) = self.writer.send(&response.into()) {
            tracing::warn!("Failed to answer server request: {}", e);
        }
    }

    fn handle_notification(&self, notification: Notification) {
        let handler = self
            .notification_handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&notification.method)
            .cloned();

        match handler {
            Some(handler) => {
                let params = notification.params.unwrap_or(Value::Null);
                if catch_unwind(AssertUnwindSafe(|| handler(params))).is_err() {
                    tracing::error!("Notification handler panicked for '{}'", notification.method);
                }
            }
            None => tracing::trace!("Unhandled notification: {}", notification.method),
        }
    }
}
