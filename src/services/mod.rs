//! Service layer for lsp-bridge

pub mod config;

pub use config::{ConfigService, DefaultConfigService};
