//! Subscribe-style reader over inbound requests

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures::StreamExt;

use super::protocol::Request;
use crate::infra::channel::{FromServer, Subscription};

pub type DataCallback = Arc<dyn Fn(&Request) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(u64, DataCallback)>,
}

fn lock(listeners: &Mutex<Listeners>) -> MutexGuard<'_, Listeners> {
    listeners.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Fans every inbound request out to the registered callbacks
pub struct Reader {
    listeners: Arc<Mutex<Listeners>>,
    requests: tokio::sync::Mutex<Subscription<Request>>,
}

impl Reader {
    /// Subscribes to the request sequence immediately
    pub fn new(from_server: &FromServer) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(Listeners::default())),
            requests: tokio::sync::Mutex::new(from_server.requests()),
        }
    }

    pub fn listen<F>(&self, callback: F) -> Disposable
    where
        F: Fn(&Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut listeners = lock(&self.listeners);
        let id = listeners.next_id;
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(callback)));
        Disposable {
            id,
            listeners: Arc::downgrade(&self.listeners),
        }
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners).entries.len()
    }

    /// Drive callbacks until the request sequence ends
    pub async fn init(&self) {
        let mut requests = self.requests.lock().await;
        while let Some(request) = requests.next().await {
            let callbacks: Vec<DataCallback> = lock(&self.listeners)
                .entries
                .iter()
                .map(|(_, cb)| Arc::clone(cb))
                .collect();

            for callback in callbacks {
                match catch_unwind(AssertUnwindSafe(|| callback(&request))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        tracing::warn!("Reader callback failed for '{}': {}", request.method, e)
                    }
                    Err(_) => tracing::error!("Reader callback panicked for '{}'", request.method),
                }
            }
        }
        tracing::debug!("Request sequence ended");
    }
}

/// Release handle returned by `Reader::listen`
///
/// The callback stays registered for as long as the handle lives.
#[must_use = "dropping the handle unregisters the callback"]
pub struct Disposable {
    id: u64,
    listeners: Weak<Mutex<Listeners>>,
}

impl Disposable {
    /// Remove the callback from the reader
    pub fn dispose(self) {
        drop(self);
    }
}

impl Drop for Disposable {
    fn drop(&mut self) {
        if let Some(listeners) = self.listeners.upgrade() {
            lock(&listeners).entries.retain(|(id, _)| *id != self.id);
        }
    }
}
