//! In-memory fake server and a recording editor surface for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;

use crate::bridge::{Capability, EditorSurface};
use crate::infra::channel::{FromServer, IntoServer, Outbox, OutboxReceiver};
use crate::infra::rpc::codec::Codec;
use crate::infra::rpc::protocol::{
    Message, Notification, Request, RequestId, Response, ResponseError,
};
use crate::models::editor::{LanguageExtensionPoint, Marker, ModelHandle};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// Server side of an in-memory channel
///
/// Reads what the client enqueued and feeds replies into `inbound` as a
/// transport would.
pub struct Harness {
    pub inbound: FromServer,
    outbox: Arc<Outbox>,
    rx: OutboxReceiver,
}

impl Harness {
    pub fn new() -> Self {
        let (outbox, rx) = Outbox::new();
        Self {
            inbound: FromServer::new(),
            outbox: Arc::new(outbox),
            rx,
        }
    }

    pub fn outbox(&self) -> Arc<dyn IntoServer> {
        self.outbox.clone()
    }

    /// Next message the client sent
    pub async fn next_message(&mut self) -> Message {
        let wire = tokio::time::timeout(RECV_TIMEOUT, self.rx.recv())
            .await
            .expect("client sent nothing")
            .expect("outbox closed");
        Codec::decode(&wire).expect("client sent malformed message")
    }

    /// Next request the client sent, skipping notifications
    pub async fn next_request(&mut self) -> Request {
        loop {
            match self.next_message().await {
                Message::Request(request) => return request,
                Message::Notification(_) => continue,
                Message::Response(response) => panic!("unexpected response {response:?}"),
            }
        }
    }

    pub async fn next_notification(&mut self) -> Notification {
        match self.next_message().await {
            Message::Notification(notification) => notification,
            other => panic!("expected notification, got {other:?}"),
        }
    }

    pub fn reply(&self, id: RequestId, result: Value) {
        self.inbound.deliver(Response::success(id, result).into());
    }

    pub fn reply_error(&self, id: RequestId, error: ResponseError) {
        self.inbound.deliver(Response::failure(id, error).into());
    }

    pub fn push(&self, message: impl Into<Message>) {
        self.inbound.deliver(message.into());
    }
}

type MarkerCall = (ModelHandle, String, Vec<Marker>);

/// Editor surface that records every call
#[derive(Default)]
pub struct RecordingSurface {
    registered: Mutex<Vec<(String, Vec<Capability>)>>,
    marker_calls: Mutex<Vec<MarkerCall>>,
}

impl RecordingSurface {
    pub fn registrations(&self) -> Vec<String> {
        self.registered
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn marker_calls(&self) -> Vec<MarkerCall> {
        self.marker_calls.lock().unwrap().clone()
    }

    /// Markers currently shown for `uri`, last write wins
    pub fn markers_for(&self, uri: &str) -> Option<Vec<Marker>> {
        let mut current: HashMap<String, Vec<Marker>> = HashMap::new();
        for (model, _, markers) in self.marker_calls.lock().unwrap().iter() {
            current.insert(model.uri.clone(), markers.clone());
        }
        current.remove(uri)
    }
}

impl EditorSurface for RecordingSurface {
    fn register_language(&self, language: &LanguageExtensionPoint, capabilities: &[Capability]) {
        self.registered
            .lock()
            .unwrap()
            .push((language.id.clone(), capabilities.to_vec()));
    }

    fn set_model_markers(&self, model: &ModelHandle, owner: &str, markers: Vec<Marker>) {
        self.marker_calls
            .lock()
            .unwrap()
            .push((model.clone(), owner.to_string(), markers));
    }
}
