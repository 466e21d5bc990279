//! Session lifecycle
//!
//! Uninitialized → Initializing → Initialized → Running, then Stopped once
//! both inbound sequences end or startup fails.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use futures::future::{BoxFuture, try_join_all};
use futures::{FutureExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::watch;

use crate::bridge::{EditorSurface, ProviderBridge};
use crate::config::RuntimeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::infra::channel::{FromServer, IntoServer, Subscription};
use crate::infra::rpc::{Disposable, Reader, RpcEngine};
use crate::infra::rpc::protocol::{Notification, Request, ResponseError, methods};
use crate::models::editor::{LanguageExtensionPoint, ModelHandle};
use crate::models::lsp::{ClientInfo, InitializeParams, InitializeResult, PublishDiagnosticsParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Initialized,
    Running,
    Stopped,
}

type Hook = Box<dyn FnOnce(Arc<RpcEngine>) -> BoxFuture<'static, BridgeResult<()>> + Send>;

/// One editor attachment to one server
pub struct Session {
    engine: Arc<RpcEngine>,
    bridge: Arc<ProviderBridge>,
    from_server: FromServer,
    reader: Reader,
    hooks: Mutex<Vec<Hook>>,
    state: watch::Sender<SessionState>,
}

impl Session {
    pub fn new(
        into_server: Arc<dyn IntoServer>,
        from_server: FromServer,
        surface: Arc<dyn EditorSurface>,
        config: RuntimeConfig,
    ) -> Arc<Self> {
        let engine = RpcEngine::new(into_server, &from_server, config);
        let bridge = Arc::new(ProviderBridge::new(Arc::clone(&engine), surface));
        let (state, _) = watch::channel(SessionState::Uninitialized);
        let reader = Reader::new(&from_server);

        Arc::new(Self {
            engine,
            bridge,
            from_server,
            reader,
            hooks: Mutex::new(Vec::new()),
            state,
        })
    }

    pub fn engine(&self) -> &Arc<RpcEngine> {
        &self.engine
    }

    pub fn bridge(&self) -> &Arc<ProviderBridge> {
        &self.bridge
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Resolve once the session has reached `target` (or stopped)
    pub async fn wait_until(&self, target: SessionState) -> SessionState {
        let mut rx = self.state.subscribe();
        match rx.wait_for(|s| *s >= target).await {
            Ok(state) => *state,
            Err(_) => SessionState::Stopped,
        }
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!("Session state: {:?}", state);
        self.state.send_replace(state);
    }

    pub fn add_language(&self, language: LanguageExtensionPoint) -> String {
        self.bridge.add_language(language)
    }

    /// Make `model` eligible for diagnostics
    pub fn open_document(&self, model: ModelHandle) {
        self.bridge.documents().open(model);
    }

    pub fn close_document(&self, uri: &str) {
        self.bridge.documents().close(uri);
    }

    /// Observe every server-initiated request alongside the engine's own dispatch
    pub fn listen<F>(&self, callback: F) -> Disposable
    where
        F: Fn(&Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.reader.listen(callback)
    }

    /// Queue work to run after the handshake, before the inbound loops
    ///
    /// Hooks run concurrently; the first failure aborts startup.
    pub fn push_after_initialize_hook<F, Fut>(&self, hook: F)
    where
        F: FnOnce(Arc<RpcEngine>) -> Fut + Send + 'static,
        Fut: Future<Output = BridgeResult<()>> + Send + 'static,
    {
        self.hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(move |engine| hook(engine).boxed()));
    }

    /// Run the whole lifecycle; resolves when the channel's inbound side ends
    pub async fn start(&self) -> BridgeResult<()> {
        let claimed = self.state.send_if_modified(|state| {
            if *state != SessionState::Uninitialized {
                return false;
            }
            *state = SessionState::Initializing;
            true
        });
        if !claimed {
            return Err(BridgeError::Handshake("session already started".to_string()));
        }
        tracing::debug!("Session state: {:?}", SessionState::Initializing);
        let result = self.run().await;
        if let Err(e) = &result {
            tracing::warn!("Session stopped: {}", e);
        }
        self.set_state(SessionState::Stopped);
        result
    }

    async fn run(&self) -> BridgeResult<()> {
        // Subscribe before the handshake so nothing sent meanwhile is missed
        let notifications = self.from_server.notifications();
        let requests = self.from_server.requests();

        self.register_handlers();

        self.initialize().await?;
        self.set_state(SessionState::Initialized);

        self.engine
            .notify(methods::INITIALIZED, Some(json!({})))?;

        let hooks: Vec<Hook> = std::mem::take(
            &mut *self.hooks.lock().unwrap_or_else(PoisonError::into_inner),
        );
        if !hooks.is_empty() {
            tracing::debug!("Running {} post-initialize hooks", hooks.len());
        }
        try_join_all(hooks.into_iter().map(|hook| hook(Arc::clone(&self.engine)))).await?;

        self.set_state(SessionState::Running);
        tokio::join!(
            self.process_notifications(notifications),
            self.process_requests(requests),
            self.reader.init()
        );
        Ok(())
    }

    fn register_handlers(&self) {
        let bridge: Weak<ProviderBridge> = Arc::downgrade(&self.bridge);
        self.engine
            .on_notification(methods::PUBLISH_DIAGNOSTICS, move |params| {
                let Some(bridge) = bridge.upgrade() else {
                    return;
                };
                match serde_json::from_value::<PublishDiagnosticsParams>(params) {
                    Ok(params) => bridge.handle_diagnostics(params),
                    Err(e) => tracing::warn!("Malformed diagnostics notification: {}", e),
                }
            });

        self.engine
            .add_method(methods::CUSTOM_READ_FILE, |params: Option<Value>| async move {
                tracing::debug!("{} {:?}", methods::CUSTOM_READ_FILE, params);
                Ok::<_, ResponseError>(json!({ "error": "Not implemented" }))
            });
    }

    async fn initialize(&self) -> BridgeResult<()> {
        let config = self.engine.config();
        let params = InitializeParams {
            process_id: None,
            client_info: ClientInfo {
                name: config.client_name.clone(),
                version: config.client_version.clone(),
            },
            capabilities: json!({
                "textDocument": {
                    "publishDiagnostics": {}
                }
            }),
            root_uri: None,
        };

        let value: Value = self
            .engine
            .request(methods::INITIALIZE, Some(serde_json::to_value(params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(value)
            .map_err(|e| BridgeError::Handshake(format!("invalid initialize result: {e}")))?;

        if let Some(info) = &result.server_info {
            tracing::debug!("Connected to {} {:?}", info.name, info.version);
        }

        let legend = result
            .capabilities
            .semantic_tokens_provider
            .and_then(|provider| provider.legend)
            .ok_or_else(|| {
                BridgeError::Handshake("server declared no semantic token legend".to_string())
            })?;
        self.bridge.set_legend(legend);
        Ok(())
    }

    async fn process_notifications(&self, mut notifications: Subscription<Notification>) {
        while let Some(notification) = notifications.next().await {
            tracing::debug!("<- notification {}", notification.method);
            self.engine.receive_and_send(notification.into()).await;
        }
        tracing::debug!("Notification sequence ended");
    }

    async fn process_requests(&self, mut requests: Subscription<Request>) {
        while let Some(request) = requests.next().await {
            tracing::debug!("<- request {} ({})", request.method, request.id);
            self.engine.receive_and_send(request.into()).await;
        }
        tracing::debug!("Request sequence ended");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::infra::rpc::protocol::{Message, RequestId};
    use crate::test_support::{Harness, RecordingSurface};

    fn session(harness: &Harness) -> (Arc<Session>, Arc<RecordingSurface>) {
        let surface = Arc::new(RecordingSurface::default());
        let session = Session::new(
            harness.outbox(),
            harness.inbound.clone(),
            surface.clone(),
            RuntimeConfig::default().with_base_timeout(Duration::from_secs(5)),
        );
        (session, surface)
    }

    fn initialize_result() -> Value {
        json!({
            "capabilities": {
                "semanticTokensProvider": {
                    "legend": {"tokenTypes": ["keyword", "variable"], "tokenModifiers": []},
                    "full": true
                }
            },
            "serverInfo": {"name": "swls"}
        })
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let mut harness = Harness::new();
        let (session, surface) = session(&harness);
        assert_eq!(session.state(), SessionState::Uninitialized);

        session.push_after_initialize_hook(|engine: Arc<RpcEngine>| async move {
            engine.notify("test/hookRan", None)?;
            Ok::<(), BridgeError>(())
        });
        let seen = Arc::new(Mutex::new(Vec::new()));
        let _listener = session.listen({
            let seen = Arc::clone(&seen);
            move |request: &Request| {
                seen.lock().unwrap().push(request.method.clone());
                Ok(())
            }
        });

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        let init = harness.next_request().await;
        assert_eq!(init.method, "initialize");
        let params = init.params.clone().unwrap();
        assert_eq!(params["processId"], Value::Null);
        assert_eq!(params["rootUri"], Value::Null);
        assert_eq!(params["clientInfo"]["name"], "lsp-bridge");
        assert_eq!(params["capabilities"]["textDocument"]["publishDiagnostics"], json!({}));

        // Sent during the handshake; must still be handled once running
        session.open_document(ModelHandle::new(1, "file:///a.ts"));
        harness.push(Notification::new(
            "textDocument/publishDiagnostics",
            Some(json!({"uri": "file:///a.ts", "diagnostics": [{
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 1}},
                "message": "bad"
            }]})),
        ));

        harness.reply(init.id, initialize_result());
        assert_eq!(harness.next_notification().await.method, "initialized");
        assert_eq!(harness.next_notification().await.method, "test/hookRan");
        assert_eq!(session.wait_until(SessionState::Running).await, SessionState::Running);
        assert_eq!(
            session.bridge().legend().map(|l| l.token_types.len()),
            Some(2)
        );

        harness.push(Request::new("srv-1", "custom/readFile", Some(json!({"uri": "x"}))));
        match harness.next_message().await {
            Message::Response(response) => {
                assert_eq!(response.id, Some(RequestId::from("srv-1")));
                assert_eq!(response.result, Some(json!({"error": "Not implemented"})));
            }
            other => panic!("expected response, got {other:?}"),
        }
        assert_eq!(surface.markers_for("file:///a.ts").map(|m| m.len()), Some(1));

        harness.inbound.close();
        task.await.unwrap().unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
        assert_eq!(*seen.lock().unwrap(), vec!["custom/readFile".to_string()]);
    }

    #[tokio::test]
    async fn test_extreme_diagnostic_range_keeps_session_running() {
        let mut harness = Harness::new();
        let (session, surface) = session(&harness);
        session.open_document(ModelHandle::new(1, "file:///a.ts"));

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });
        let init = harness.next_request().await;
        harness.reply(init.id, initialize_result());
        assert_eq!(session.wait_until(SessionState::Running).await, SessionState::Running);

        let diagnostic = |line: u32, message: &str| {
            Notification::new(
                "textDocument/publishDiagnostics",
                Some(json!({"uri": "file:///a.ts", "diagnostics": [{
                    "range": {
                        "start": {"line": line, "character": 0},
                        "end": {"line": line, "character": 1}
                    },
                    "message": message
                }]})),
            )
        };
        harness.push(diagnostic(u32::MAX, "far away"));
        harness.push(diagnostic(0, "after"));

        harness.inbound.close();
        task.await.unwrap().unwrap();

        let calls = surface.marker_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].2[0].range.start_line_number, u32::MAX);
        assert_eq!(calls[1].2[0].message, "after");
    }

    #[tokio::test]
    async fn test_missing_legend_fails_startup() {
        let mut harness = Harness::new();
        let (session, _) = session(&harness);

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });
        let init = harness.next_request().await;
        harness.reply(init.id, json!({"capabilities": {}}));

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Handshake(_)));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.bridge().legend().is_none());
    }

    #[tokio::test]
    async fn test_failing_hook_aborts_startup() {
        let mut harness = Harness::new();
        let (session, _) = session(&harness);
        session.push_after_initialize_hook(|_| async {
            Err::<(), _>(BridgeError::Handshake("hook failed".to_string()))
        });

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });
        let init = harness.next_request().await;
        harness.reply(init.id, initialize_result());

        assert!(task.await.unwrap().is_err());
        assert_eq!(
            session.wait_until(SessionState::Running).await,
            SessionState::Stopped
        );
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let mut harness = Harness::new();
        let (session, _) = session(&harness);
        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });
        let _init = harness.next_request().await;

        assert!(session.start().await.is_err());
        harness.inbound.close();
        assert!(task.await.unwrap().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_starts_admit_one() {
        let mut harness = Harness::new();
        let (session, _) = session(&harness);
        let starts: Vec<_> = (0..2)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move { session.start().await })
            })
            .collect();

        let init = harness.next_request().await;
        assert_eq!(init.method, "initialize");
        harness.inbound.close();

        let mut rejected = 0;
        for start in starts {
            if let Err(BridgeError::Handshake(message)) = start.await.unwrap()
                && message == "session already started"
            {
                rejected += 1;
            }
        }
        assert_eq!(rejected, 1);
    }
}
