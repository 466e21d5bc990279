//! Data models for lsp-bridge
//!
//! `lsp` holds the protocol shapes, `editor` the editor-native ones; the
//! bridge converts between the two.

pub mod config;
pub mod editor;
pub mod lsp;

pub use config::BridgeConfig;
