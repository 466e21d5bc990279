//! JSON-RPC 2.0 over a message channel
//!
//! - `protocol`: message types and method catalog
//! - `codec`: message ↔ JSON text
//! - `reader` / `writer`: subscribe-style inbound, encoding outbound
//! - `engine`: correlated requests plus inbound dispatch

pub mod codec;
pub mod engine;
pub mod protocol;
pub mod reader;
pub mod writer;

pub use codec::{Codec, WireMessage};
pub use engine::RpcEngine;
pub use protocol::{Message, Notification, Request, RequestId, Response, ResponseError};
pub use reader::{Disposable, Reader};
pub use writer::Writer;
