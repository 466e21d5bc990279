//! Configuration service for lsp-bridge

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ConfigError;
use crate::models::config::BridgeConfig;

pub const ENV_TIMEOUT_SECS: &str = "LSP_BRIDGE_TIMEOUT_SECS";
pub const ENV_ADDRESS: &str = "LSP_BRIDGE_ADDRESS";

/// One day; longer deadlines are treated as configuration mistakes
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[async_trait]
pub trait ConfigService: Send + Sync {
    async fn load(&self) -> Result<BridgeConfig, ConfigError>;
    fn config_path(&self) -> PathBuf;
    async fn init(&self, force: bool) -> Result<PathBuf, ConfigError>;
}

pub struct DefaultConfigService {
    path: PathBuf,
}

impl Default for DefaultConfigService {
    fn default() -> Self {
        Self::new(None)
    }
}

impl DefaultConfigService {
    /// Use `path` when given, the global config file otherwise
    pub fn new(path: Option<&Path>) -> Self {
        Self {
            path: path
                .map(Path::to_path_buf)
                .unwrap_or_else(Self::global_config_path),
        }
    }

    fn global_config_path() -> PathBuf {
        // XDG standard: ~/.config/lsp-bridge/config.toml
        std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lsp-bridge")
            .join("config.toml")
    }

    async fn load_from_path(path: &Path) -> Result<BridgeConfig, ConfigError> {
        if !path.exists() {
            return Ok(BridgeConfig::default());
        }
        let content = tokio::fs::read_to_string(path).await?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    async fn write_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = toml::to_string_pretty(&BridgeConfig::default())
            .map_err(|e| ConfigError::Parse(e.to_string()))?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigService for DefaultConfigService {
    async fn load(&self) -> Result<BridgeConfig, ConfigError> {
        let config = Self::load_from_path(&self.path).await?;
        let config = apply_env_overrides(config, |key| std::env::var(key).ok());
        validate(&config)?;
        Ok(config)
    }

    fn config_path(&self) -> PathBuf {
        self.path.clone()
    }

    async fn init(&self, force: bool) -> Result<PathBuf, ConfigError> {
        if self.path.exists() && !force {
            return Err(ConfigError::InvalidValue {
                key: "config".to_string(),
                message: format!(
                    "Config already exists: {}. Use --force to overwrite.",
                    self.path.display()
                ),
            });
        }

        Self::write_default_config(&self.path).await?;
        Ok(self.path.clone())
    }
}

fn apply_env_overrides(
    mut config: BridgeConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> BridgeConfig {
    if let Some(val) = lookup(ENV_TIMEOUT_SECS)
        && let Ok(timeout) = val.parse()
    {
        config.rpc.timeout_secs = timeout;
    }
    if let Some(val) = lookup(ENV_ADDRESS)
        && !val.is_empty()
    {
        config.connection.address = val;
    }
    config
}

fn validate(config: &BridgeConfig) -> Result<(), ConfigError> {
    if config.rpc.timeout_secs == 0 {
        return Err(ConfigError::InvalidValue {
            key: "rpc.timeout_secs".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }
    if config.rpc.timeout_secs > MAX_TIMEOUT_SECS {
        return Err(ConfigError::InvalidValue {
            key: "rpc.timeout_secs".to_string(),
            message: format!("must be at most {MAX_TIMEOUT_SECS}"),
        });
    }
    if config.diagnostics.owner.is_empty() {
        return Err(ConfigError::InvalidValue {
            key: "diagnostics.owner".to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let service = DefaultConfigService::new(Some(&dir.path().join("absent.toml")));
        let config = DefaultConfigService::load_from_path(&service.config_path())
            .await
            .unwrap();
        assert_eq!(config.rpc.timeout_secs, 30);
    }

    #[tokio::test]
    async fn test_load_from_explicit_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[connection]\naddress = \"localhost:4000\"\n\n[client]\nname = \"editor\"\n",
        )
        .unwrap();

        let config = DefaultConfigService::load_from_path(&path).await.unwrap();
        assert_eq!(config.connection.address, "localhost:4000");
        assert_eq!(config.client.name, "editor");
    }

    #[tokio::test]
    async fn test_parse_error_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[rpc\ntimeout_secs = ").unwrap();

        let err = DefaultConfigService::new(Some(&path)).load().await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let service = DefaultConfigService::new(Some(&path));

        assert_eq!(service.init(false).await.unwrap(), path);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("timeout_secs = 30"));

        assert!(matches!(
            service.init(false).await,
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(service.init(true).await.is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(BridgeConfig::default(), |key| match key {
            ENV_TIMEOUT_SECS => Some("7".to_string()),
            ENV_ADDRESS => Some("10.0.0.2:9000".to_string()),
            _ => None,
        });
        assert_eq!(config.rpc.timeout_secs, 7);
        assert_eq!(config.connection.address, "10.0.0.2:9000");

        let untouched = apply_env_overrides(BridgeConfig::default(), |key| {
            (key == ENV_TIMEOUT_SECS).then(|| "soon".to_string())
        });
        assert_eq!(untouched.rpc.timeout_secs, 30);
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        let mut config = BridgeConfig::default();
        config.rpc.timeout_secs = 0;
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "rpc.timeout_secs"
        ));
    }

    #[test]
    fn test_oversized_timeout_is_invalid() {
        let config = apply_env_overrides(BridgeConfig::default(), |key| {
            (key == ENV_TIMEOUT_SECS).then(|| u64::MAX.to_string())
        });
        assert_eq!(config.rpc.timeout_secs, u64::MAX);
        assert!(matches!(
            validate(&config),
            Err(ConfigError::InvalidValue { ref key, .. }) if key == "rpc.timeout_secs"
        ));

        let mut config = BridgeConfig::default();
        config.rpc.timeout_secs = MAX_TIMEOUT_SECS;
        assert!(validate(&config).is_ok());
    }
}
