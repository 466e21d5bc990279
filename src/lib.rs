//! lsp-bridge - Language Server Protocol client bridge
//!
//! Connects an editor surface to a language server over JSON-RPC 2.0:
//! the session drives the handshake and inbound loops, the provider bridge
//! translates capability calls and pushed diagnostics between LSP and
//! editor-native shapes.

pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod error;
pub mod infra;
pub mod models;
pub mod services;
pub mod session;

#[cfg(test)]
mod test_support;

pub use error::{BridgeError, BridgeResult};
pub use session::{Session, SessionState};
