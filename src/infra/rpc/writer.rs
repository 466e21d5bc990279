//! Outbound message writer

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::timeout;

use super::codec::Codec;
use super::protocol::Message;
use crate::error::RpcError;
use crate::infra::channel::{FromServer, IntoServer, ResponseRouter};

/// Encodes messages onto the outbound channel
///
/// `send` is the send half only. `write` additionally waits, for requests,
/// until the server's response with the same id has been observed; the value
/// is discarded. Callers that need the value go through the RPC engine.
pub struct Writer {
    into_server: Arc<dyn IntoServer>,
    responses: ResponseRouter,
    ack_timeout: Duration,
    ended: AtomicBool,
}

impl Writer {
    pub fn new(into_server: Arc<dyn IntoServer>, from_server: &FromServer, ack_timeout: Duration) -> Self {
        Self {
            into_server,
            responses: from_server.responses().clone(),
            ack_timeout,
            ended: AtomicBool::new(false),
        }
    }

    /// Encode and enqueue
    pub fn send(&self, message: &Message) -> Result<(), RpcError> {
        if self.ended.load(Ordering::Acquire) {
            return Err(RpcError::WriterClosed);
        }
        let wire = Codec::encode(message)?;
        tracing::trace!("LSP -> {}", wire);
        self.into_server.enqueue(wire)
    }

    /// Encode, enqueue and, for requests, wait for the matching response
    pub async fn write(&self, message: &Message) -> Result<(), RpcError> {
        let ack = match message {
            Message::Request(request) => Some((
                request.method.clone(),
                self.responses.get(request.id.clone())?,
            )),
            _ => None,
        };

        // A failed send drops `ack`, which releases the id again
        self.send(message)?;

        let Some((method, ack)) = ack else {
            return Ok(());
        };

        match timeout(self.ack_timeout, ack).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(RpcError::Timeout {
                method,
                after: self.ack_timeout,
            }),
        }
    }

    /// Release the writer; later writes fail with `WriterClosed`
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::AcqRel) {
            tracing::debug!("Writer ended");
        }
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }
}
