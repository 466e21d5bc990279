//! Configuration model for lsp-bridge

use serde::{Deserialize, Serialize};

/// lsp-bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BridgeConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub rpc: RpcConfig,

    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,

    #[serde(default)]
    pub connection: ConnectionConfig,
}

/// How the bridge introduces itself in `initialize`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "defaults::client_name")]
    pub name: String,

    #[serde(default)]
    pub version: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            name: defaults::client_name(),
            version: None,
        }
    }
}

/// Request deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Base deadline for a correlated request; scaled per method
    #[serde(default = "defaults::timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            timeout_secs: defaults::timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Owner tag under which markers are applied
    #[serde(default = "defaults::owner")]
    pub owner: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            owner: defaults::owner(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// `host:port` of an already running language server
    #[serde(default = "defaults::address")]
    pub address: String,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: defaults::address(),
        }
    }
}

mod defaults {
    pub fn client_name() -> String {
        "lsp-bridge".to_string()
    }
    pub fn timeout_secs() -> u64 {
        30
    }
    pub fn owner() -> String {
        "lsp-bridge".to_string()
    }
    pub fn address() -> String {
        "127.0.0.1:9257".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.client.name, "lsp-bridge");
        assert_eq!(config.rpc.timeout_secs, 30);
        assert_eq!(config.diagnostics.owner, "lsp-bridge");
        assert_eq!(config.connection.address, "127.0.0.1:9257");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            [rpc]
            timeout_secs = 5

            [diagnostics]
            owner = "SWLS"
            "#,
        )
        .unwrap();
        assert_eq!(config.rpc.timeout_secs, 5);
        assert_eq!(config.diagnostics.owner, "SWLS");
        assert_eq!(config.client.name, "lsp-bridge");
    }
}
