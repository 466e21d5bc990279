//! Wire codec
//!
//! Stateless conversion between `Message` and its JSON text form, plus the
//! `Content-Length` framing used on byte streams.

use serde::de::Error as _;
use serde_json::Value;

use super::protocol::Message;
use crate::error::RpcError;

/// JSON text of one message, unframed
pub type WireMessage = String;

pub struct Codec;

impl Codec {
    pub fn encode(message: &Message) -> Result<WireMessage, RpcError> {
        let json = match message {
            Message::Request(r) => serde_json::to_string(r),
            Message::Notification(n) => serde_json::to_string(n),
            Message::Response(r) => serde_json::to_string(r),
        }?;
        Ok(json)
    }

    /// Classify and parse one JSON message
    ///
    /// id + method is a request, id alone a response, method alone a
    /// notification.
    pub fn decode(json: &str) -> Result<Message, RpcError> {
        let value: Value = serde_json::from_str(json)?;
        let has_id = value.get("id").is_some();
        let has_method = value.get("method").is_some();

        let message = match (has_id, has_method) {
            (true, true) => Message::Request(serde_json::from_value(value)?),
            (true, false) => Message::Response(serde_json::from_value(value)?),
            (false, true) => Message::Notification(serde_json::from_value(value)?),
            (false, false) => {
                return Err(serde_json::Error::custom("Invalid JSON-RPC message").into());
            }
        };
        Ok(message)
    }

    /// Prefix a wire message with its `Content-Length` header
    pub fn frame(wire: &str) -> String {
        format!("Content-Length: {}\r\n\r\n{}", wire.len(), wire)
    }
}
