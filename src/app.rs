//! Application container for lsp-bridge

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use tokio::task::JoinHandle;

use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::{CliSurface, OutputContext};
use crate::config::RuntimeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::infra::rpc::Disposable;
use crate::infra::rpc::protocol::methods;
use crate::infra::transport::Connection;
use crate::models::config::BridgeConfig;
use crate::models::editor::{LanguageExtensionPoint, ModelHandle};
use crate::models::lsp::{TextDocumentItem, language_id_for_path, path_to_uri};
use crate::services::config::{ConfigService, DefaultConfigService};
use crate::session::{Session, SessionState};

pub struct App {
    pub(crate) output: OutputContext,
    pub(crate) config_service: Arc<dyn ConfigService>,
    pub(crate) config: BridgeConfig,
    address_override: Option<String>,
}

impl App {
    pub async fn new(config_path: Option<&Path>, connect: Option<String>) -> anyhow::Result<Self> {
        let root = std::env::current_dir()?;
        let config_service = Arc::new(DefaultConfigService::new(config_path));
        let config = match config_service.load().await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Using default config: {}", e);
                BridgeConfig::default()
            }
        };

        tracing::debug!("Config loaded from {:?}", config_service.config_path());

        Ok(Self {
            output: OutputContext::new(root),
            config_service,
            config,
            address_override: connect,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// `--connect` wins over the configured address
    pub fn address(&self) -> &str {
        self.address_override
            .as_deref()
            .unwrap_or(&self.config.connection.address)
    }

    /// Connect, open `file` and wait until the session is running
    pub async fn attach(&self, file: &Path) -> anyhow::Result<Attachment> {
        let text = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;

        let address = self.address();
        let connection = Connection::connect_tcp(address)
            .await
            .with_context(|| format!("Failed to connect to language server at {address}"))?;

        let surface = Arc::new(CliSurface::default());
        let session = Session::new(
            connection.outbox(),
            connection.inbound().clone(),
            surface.clone(),
            RuntimeConfig::from(&self.config),
        );

        let language_id = language_id_for_path(file);
        let mut language = LanguageExtensionPoint::new(&language_id);
        if let Some(ext) = file.extension().and_then(|e| e.to_str()) {
            let ext = format!(".{ext}");
            language = language.with_extensions(&[ext.as_str()]);
        }
        session.add_language(language);

        let uri = path_to_uri(file);
        let model = ModelHandle::new(1, &uri);
        session.open_document(model.clone());

        let item = TextDocumentItem {
            uri,
            language_id: language_id.clone(),
            version: 1,
            text,
        };
        session.push_after_initialize_hook(move |engine| async move {
            engine.notify(
                methods::DID_OPEN,
                Some(serde_json::json!({ "textDocument": item })),
            )?;
            Ok::<(), BridgeError>(())
        });

        let server_requests = session.listen(|request| {
            tracing::info!("Server request: {} ({})", request.method, request.id);
            Ok(())
        });

        let task = tokio::spawn({
            let session = Arc::clone(&session);
            async move { session.start().await }
        });

        if session.wait_until(SessionState::Running).await != SessionState::Running {
            let reason = match task.await {
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(())) => "server closed the connection".to_string(),
                Err(e) => e.to_string(),
            };
            bail!("Session failed to start: {reason}");
        }

        tracing::info!("Attached to {} ({})", address, language_id);

        Ok(Attachment {
            file: file.to_path_buf(),
            language_id,
            model,
            session,
            surface,
            connection,
            task,
            _server_requests: server_requests,
        })
    }
}

/// A running session with one open document
pub struct Attachment {
    pub file: PathBuf,
    pub language_id: String,
    pub model: ModelHandle,
    pub session: Arc<Session>,
    pub surface: Arc<CliSurface>,
    connection: Connection,
    task: JoinHandle<BridgeResult<()>>,
    _server_requests: Disposable,
}

impl Attachment {
    pub async fn provide(&self, request: CapabilityRequest) -> BridgeResult<CapabilityResponse> {
        self.session
            .bridge()
            .provide(&self.language_id, request)
            .await
    }

    pub fn detach(self) {
        self.session.close_document(&self.model.uri);
        self.connection.shutdown();
        self.task.abort();
    }
}
