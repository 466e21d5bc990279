//! Infrastructure layer for lsp-bridge
//!
//! Message channel, JSON-RPC engine and byte-stream transport.

pub mod channel;
pub mod rpc;
pub mod transport;
