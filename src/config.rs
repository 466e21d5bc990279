//! Runtime configuration derived from `BridgeConfig`

use std::time::Duration;

use crate::infra::rpc::protocol::methods;
use crate::models::config::BridgeConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Request,
    Rename,
    Initialization,
}

impl OperationType {
    pub fn from_method(method: &str) -> Self {
        match method {
            methods::RENAME | methods::PREPARE_RENAME => Self::Rename,
            methods::INITIALIZE => Self::Initialization,
            _ => Self::Request,
        }
    }

    fn base_multiplier(self) -> u32 {
        match self {
            Self::Request => 1,
            Self::Rename => 10,
            Self::Initialization => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    base_timeout: Duration,
    pub client_name: String,
    pub client_version: Option<String>,
    pub diagnostics_owner: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        RuntimeConfig::from(&BridgeConfig::default())
    }
}

impl From<&BridgeConfig> for RuntimeConfig {
    fn from(config: &BridgeConfig) -> Self {
        Self {
            base_timeout: Duration::from_secs(config.rpc.timeout_secs),
            client_name: config.client.name.clone(),
            client_version: config.client.version.clone(),
            diagnostics_owner: config.diagnostics.owner.clone(),
        }
    }
}

impl RuntimeConfig {
    /// Override the base deadline (tests use millisecond deadlines)
    pub fn with_base_timeout(mut self, timeout: Duration) -> Self {
        self.base_timeout = timeout;
        self
    }

    pub fn base_timeout(&self) -> Duration {
        self.base_timeout
    }

    /// Saturates at `Duration::MAX` for huge bases
    pub fn timeout_for(&self, method: &str) -> Duration {
        let multiplier = OperationType::from_method(method).base_multiplier();
        self.base_timeout
            .checked_mul(multiplier)
            .unwrap_or(Duration::MAX)
    }
}
