//! Channel abstraction
//!
//! One bidirectional message channel seen as:
//! - an outbound sink (`IntoServer::enqueue`), FIFO and non-blocking
//! - an inbound source (`FromServer`) split into three derived sequences:
//!   requests, notifications and id-keyed responses
//!
//! Transports feed `FromServer::deliver` and drain the outbox receiver.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use super::rpc::codec::WireMessage;
use super::rpc::protocol::{Message, Notification, Request, RequestId, Response};
use crate::error::RpcError;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// Outbound
// ============================================================================

/// Outbound half of the channel
pub trait IntoServer: Send + Sync {
    /// Queue one wire message; never waits on the transport
    fn enqueue(&self, message: WireMessage) -> Result<(), RpcError>;
}

/// Unbounded FIFO outbox drained by a transport
#[derive(Clone)]
pub struct Outbox {
    tx: mpsc::UnboundedSender<WireMessage>,
}

pub type OutboxReceiver = mpsc::UnboundedReceiver<WireMessage>;

impl Outbox {
    pub fn new() -> (Self, OutboxReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl IntoServer for Outbox {
    fn enqueue(&self, message: WireMessage) -> Result<(), RpcError> {
        self.tx.send(message).map_err(|_| RpcError::ChannelClosed)
    }
}

// ============================================================================
// Inbound sequences
// ============================================================================

/// Lossless broadcast: every subscriber sees every message published after
/// it subscribed, in publish order
struct Fanout<T> {
    subscribers: Mutex<Option<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T: Clone> Fanout<T> {
    fn new() -> Self {
        Self {
            subscribers: Mutex::new(Some(Vec::new())),
        }
    }

    fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        // After close the sender is dropped here and the subscription ends at once
        if let Some(subscribers) = lock(&self.subscribers).as_mut() {
            subscribers.push(tx);
        }
        Subscription { rx }
    }

    fn publish(&self, item: T) {
        if let Some(subscribers) = lock(&self.subscribers).as_mut() {
            subscribers.retain(|tx| tx.send(item.clone()).is_ok());
        }
    }

    fn close(&self) {
        lock(&self.subscribers).take();
    }
}

/// An inbound sequence; ends when the channel closes
pub struct Subscription<T> {
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl<T> Stream for Subscription<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.rx.poll_recv(cx)
    }
}

// ============================================================================
// Responses
// ============================================================================

type Waiter = oneshot::Sender<Response>;

#[derive(Default)]
struct RouterState {
    waiters: HashMap<RequestId, Waiter>,
    closed: bool,
}

/// The single id → waiter table
///
/// An id is registered at most once among outstanding waiters and resolved
/// exactly once, after which it is removed.
#[derive(Clone, Default)]
pub struct ResponseRouter {
    state: Arc<Mutex<RouterState>>,
}

impl ResponseRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for `id`
    ///
    /// Register before sending the request so a fast reply cannot slip past.
    pub fn get(&self, id: RequestId) -> Result<PendingResponse, RpcError> {
        let mut state = lock(&self.state);
        if state.closed {
            return Err(RpcError::ChannelClosed);
        }
        if state.waiters.contains_key(&id) {
            return Err(RpcError::DuplicateRequestId(id));
        }
        let (tx, rx) = oneshot::channel();
        state.waiters.insert(id.clone(), tx);
        Ok(PendingResponse {
            id,
            rx,
            router: self.clone(),
            done: false,
        })
    }

    /// Hand a response to its waiter; unmatched responses are dropped
    pub fn resolve(&self, response: Response) -> bool {
        let Some(id) = response.id.clone() else {
            tracing::debug!("Dropping response without id: {:?}", response.error);
            return false;
        };

        let waiter = {
            let mut state = lock(&self.state);
            // Some servers echo numeric ids as strings
            state.waiters.remove(&id).or_else(|| match &id {
                RequestId::String(s) => s
                    .parse::<u64>()
                    .ok()
                    .and_then(|n| state.waiters.remove(&RequestId::Number(n))),
                RequestId::Number(_) => None,
            })
        };

        match waiter {
            Some(tx) => tx.send(response).is_ok(),
            None => {
                tracing::debug!("Dropping response for unknown request id {}", id);
                false
            }
        }
    }

    pub fn is_pending(&self, id: &RequestId) -> bool {
        lock(&self.state).waiters.contains_key(id)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.state).waiters.len()
    }

    /// Fail every outstanding waiter and refuse new ones
    pub fn close(&self) {
        let mut state = lock(&self.state);
        state.closed = true;
        let count = state.waiters.len();
        if count > 0 {
            tracing::debug!("Failing {} pending requests: channel closed", count);
        }
        state.waiters.clear();
    }

    fn forget(&self, id: &RequestId) {
        lock(&self.state).waiters.remove(id);
    }
}

/// Future for one registered response
///
/// Dropping it before resolution removes the waiter from the table.
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Response>,
    router: ResponseRouter,
    done: bool,
}

impl PendingResponse {
    pub fn id(&self) -> &RequestId {
        &self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Response, RpcError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(result) => {
                self.done = true;
                Poll::Ready(result.map_err(|_| RpcError::ChannelClosed))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        if !self.done {
            self.router.forget(&self.id);
        }
    }
}

// ============================================================================
// Inbound source
// ============================================================================

/// Inbound half of the channel
#[derive(Clone)]
pub struct FromServer {
    requests: Arc<Fanout<Request>>,
    notifications: Arc<Fanout<Notification>>,
    responses: ResponseRouter,
}

impl Default for FromServer {
    fn default() -> Self {
        Self::new()
    }
}

impl FromServer {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Fanout::new()),
            notifications: Arc::new(Fanout::new()),
            responses: ResponseRouter::new(),
        }
    }

    /// Inbound requests published from now on
    pub fn requests(&self) -> Subscription<Request> {
        self.requests.subscribe()
    }

    /// Inbound notifications published from now on
    pub fn notifications(&self) -> Subscription<Notification> {
        self.notifications.subscribe()
    }

    pub fn responses(&self) -> &ResponseRouter {
        &self.responses
    }

    /// Route one decoded inbound message to its sequence
    pub fn deliver(&self, message: Message) {
        match message {
            Message::Request(request) => self.requests.publish(request),
            Message::Notification(notification) => self.notifications.publish(notification),
            Message::Response(response) => {
                self.responses.resolve(response);
            }
        }
    }

    /// End both sequences and fail outstanding waiters
    pub fn close(&self) {
        self.requests.close();
        self.notifications.close();
        self.responses.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_outbox_is_fifo() {
        let (outbox, mut rx) = Outbox::new();
        outbox.enqueue("a".to_string()).unwrap();
        outbox.enqueue("b".to_string()).unwrap();
        assert_eq!(rx.recv().await.as_deref(), Some("a"));
        assert_eq!(rx.recv().await.as_deref(), Some("b"));

        drop(rx);
        assert!(matches!(
            outbox.enqueue("c".to_string()),
            Err(RpcError::ChannelClosed)
        ));
    }

    #[tokio::test]
    async fn test_requests_broadcast_to_every_subscriber() {
        let inbound = FromServer::new();
        let mut first = inbound.requests();
        let mut second = inbound.requests();

        inbound.deliver(Request::new(1, "custom/readFile", None).into());
        inbound.deliver(Request::new(2, "custom/readFile", None).into());

        for sub in [&mut first, &mut second] {
            assert_eq!(sub.next().await.unwrap().id, RequestId::Number(1));
            assert_eq!(sub.next().await.unwrap().id, RequestId::Number(2));
        }
    }

    #[tokio::test]
    async fn test_sequences_are_independent() {
        let inbound = FromServer::new();
        let mut requests = inbound.requests();
        let mut notifications = inbound.notifications();

        inbound.deliver(Notification::new("window/logMessage", None).into());
        inbound.deliver(Request::new(9, "custom/readFile", None).into());
        inbound.close();

        assert_eq!(requests.next().await.unwrap().method, "custom/readFile");
        assert!(requests.next().await.is_none());
        assert_eq!(
            notifications.next().await.unwrap().method,
            "window/logMessage"
        );
        assert!(notifications.next().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_after_close_ends_immediately() {
        let inbound = FromServer::new();
        inbound.close();
        let mut requests = inbound.requests();
        assert!(requests.next().await.is_none());
    }

    #[tokio::test]
    async fn test_responses_resolve_by_exact_id() {
        let inbound = FromServer::new();
        let first = inbound.responses().get(RequestId::Number(1)).unwrap();
        let second = inbound.responses().get(RequestId::Number(2)).unwrap();

        inbound.deliver(Response::success(RequestId::Number(2), json!("two")).into());
        inbound.deliver(Response::success(RequestId::Number(1), json!("one")).into());

        assert_eq!(first.await.unwrap().result, Some(json!("one")));
        assert_eq!(second.await.unwrap().result, Some(json!("two")));
        assert_eq!(inbound.responses().pending_count(), 0);
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let router = ResponseRouter::new();
        let _pending = router.get(RequestId::Number(5)).unwrap();
        assert!(matches!(
            router.get(RequestId::Number(5)),
            Err(RpcError::DuplicateRequestId(RequestId::Number(5)))
        ));
    }

    #[test]
    fn test_unmatched_response_is_dropped() {
        let router = ResponseRouter::new();
        assert!(!router.resolve(Response::success(RequestId::Number(42), json!(null))));
    }

    #[test]
    fn test_pending_until_resolved() {
        let router = ResponseRouter::new();
        let mut pending = tokio_test::task::spawn(router.get(RequestId::Number(9)).unwrap());
        tokio_test::assert_pending!(pending.poll());

        assert!(router.resolve(Response::success(RequestId::Number(9), json!(1))));
        assert!(pending.is_woken());
        let response = tokio_test::assert_ready_ok!(pending.poll());
        assert_eq!(response.result, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_string_id_matches_numeric_waiter() {
        let router = ResponseRouter::new();
        let pending = router.get(RequestId::Number(12)).unwrap();
        assert!(router.resolve(Response::success(RequestId::from("12"), json!(true))));
        assert_eq!(pending.await.unwrap().result, Some(json!(true)));
    }

    #[test]
    fn test_dropping_pending_response_frees_id() {
        let router = ResponseRouter::new();
        let pending = router.get(RequestId::Number(3)).unwrap();
        assert!(router.is_pending(&RequestId::Number(3)));
        drop(pending);
        assert!(!router.is_pending(&RequestId::Number(3)));
        assert!(router.get(RequestId::Number(3)).is_ok());
    }

    #[tokio::test]
    async fn test_close_fails_outstanding_waiters() {
        let inbound = FromServer::new();
        let pending = inbound.responses().get(RequestId::Number(1)).unwrap();
        inbound.close();
        assert!(matches!(pending.await, Err(RpcError::ChannelClosed)));
        assert!(matches!(
            inbound.responses().get(RequestId::Number(2)),
            Err(RpcError::ChannelClosed)
        ));
    }
}
