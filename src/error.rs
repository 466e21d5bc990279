//! Error types for lsp-bridge

use std::time::Duration;

use thiserror::Error;

use crate::infra::rpc::protocol::{RequestId, ResponseError, error_codes};

pub type BridgeResult<T> = std::result::Result<T, BridgeError>;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0}")]
    Rpc(#[from] RpcError),

    /// The server's initialize response is missing something startup depends on
    #[error("Handshake failed: {0}")]
    Handshake(String),

    #[error("Failed to translate {capability} response: {message}")]
    Translation {
        capability: &'static str,
        message: String,
    },

    #[error("Language not registered: {0}")]
    UnknownLanguage(String),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    pub fn translation(capability: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Translation {
            capability,
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("Channel closed")]
    ChannelClosed,

    #[error("Writer already ended")]
    WriterClosed,

    #[error("Request id {0} is already outstanding")]
    DuplicateRequestId(RequestId),

    #[error("'{method}' timed out after {}ms", after.as_millis())]
    Timeout { method: String, after: Duration },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Server error [{code}]: {message}")]
    ServerError { code: i32, message: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl RpcError {
    pub fn error_code(&self) -> i32 {
        match self {
            Self::ServerError { code, .. } => *code,
            Self::Timeout { .. } => -32001,
            Self::ChannelClosed | Self::WriterClosed => -32003,
            Self::Cancelled => error_codes::REQUEST_CANCELLED,
            Self::Protocol(_) | Self::Json(_) => error_codes::PARSE_ERROR,
            _ => -32000,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
            || matches!(self, Self::ServerError { code, .. } if *code == error_codes::REQUEST_CANCELLED)
    }

    /// Whether retrying the same call on the same channel can succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled)
            || self.is_cancelled()
            || matches!(self, Self::ServerError { code, .. } if *code == error_codes::CONTENT_MODIFIED)
    }
}

impl From<ResponseError> for RpcError {
    fn from(err: ResponseError) -> Self {
        RpcError::ServerError {
            code: err.code,
            message: err.message,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config parse error: {0}")]
    Parse(String),

    #[error("Invalid value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_recoverable() {
        let err = RpcError::Timeout {
            method: "textDocument/hover".to_string(),
            after: Duration::from_millis(1500),
        };
        assert!(err.is_recoverable());
        assert_eq!(err.error_code(), -32001);
        assert_eq!(err.to_string(), "'textDocument/hover' timed out after 1500ms");
    }

    #[test]
    fn test_cancelled_error() {
        assert!(RpcError::Cancelled.is_cancelled());

        let server_cancelled = RpcError::ServerError {
            code: -32800,
            message: "cancelled".to_string(),
        };
        assert!(server_cancelled.is_cancelled());
        assert!(server_cancelled.is_recoverable());
    }

    #[test]
    fn test_channel_closed_not_recoverable() {
        assert!(!RpcError::ChannelClosed.is_recoverable());
        assert!(!RpcError::WriterClosed.is_recoverable());
    }

    #[test]
    fn test_response_error_conversion() {
        let err: RpcError = ResponseError {
            code: error_codes::METHOD_NOT_FOUND,
            message: "Method not found".to_string(),
            data: None,
        }
        .into();
        assert_eq!(err.error_code(), -32601);
        assert_eq!(err.to_string(), "Server error [-32601]: Method not found");
    }

    #[test]
    fn test_bridge_error_wraps_rpc() {
        let err: BridgeError = RpcError::ChannelClosed.into();
        assert_eq!(err.to_string(), "Channel closed");
        let err = BridgeError::translation("completion", "expected array");
        assert_eq!(
            err.to_string(),
            "Failed to translate completion response: expected array"
        );
    }
}
