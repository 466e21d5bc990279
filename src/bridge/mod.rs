//! Capability translation between the editor surface and the server
//!
//! Every capability is a variant of `CapabilityRequest`; `ProviderBridge::provide`
//! is the single translation table from editor calls to protocol requests and
//! from protocol results back to editor shapes. Diagnostics travel the other
//! way and are applied through `EditorSurface::set_model_markers`.

mod converters;
mod diagnostics;

use std::collections::HashSet;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub use diagnostics::DocumentRegistry;

use crate::error::{BridgeError, BridgeResult, RpcError};
use crate::infra::rpc::RpcEngine;
use crate::infra::rpc::protocol::methods;
use crate::models::editor::{
    CompletionList, EditorDocumentSymbol, EditorHover, EditorPosition, EditorRange,
    EditorSemanticTokens, EditorTextEdit, EditorWorkspaceEdit, LanguageExtensionPoint, Marker,
    ModelHandle, RenameLocation,
};
use crate::models::lsp::{
    DocumentFormattingParams, FormattingOptions, Position, RenameParams, SemanticTokensLegend,
    TextDocumentIdentifier, TextDocumentPositionParams,
};

/// The editor widget, as seen by the bridge
pub trait EditorSurface: Send + Sync {
    /// Called once per language with every capability the bridge provides
    fn register_language(&self, language: &LanguageExtensionPoint, capabilities: &[Capability]);

    /// Replace the full marker set of `model` under `owner`
    fn set_model_markers(&self, model: &ModelHandle, owner: &str, markers: Vec<Marker>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    DocumentSymbols,
    Formatting,
    Rename,
    Hover,
    Completion,
    SemanticTokens,
}

impl Capability {
    /// Capabilities registered for every language
    pub const ALL: [Capability; 6] = [
        Capability::DocumentSymbols,
        Capability::Formatting,
        Capability::Rename,
        Capability::Hover,
        Capability::Completion,
        Capability::SemanticTokens,
    ];
}

/// An editor-side capability invocation
#[derive(Debug, Clone)]
pub enum CapabilityRequest {
    DocumentSymbols {
        model: ModelHandle,
    },
    Formatting {
        model: ModelHandle,
        options: FormattingOptions,
    },
    PrepareRename {
        model: ModelHandle,
        position: EditorPosition,
    },
    Rename {
        model: ModelHandle,
        position: EditorPosition,
        new_name: String,
    },
    Hover {
        model: ModelHandle,
        position: EditorPosition,
    },
    Completion {
        model: ModelHandle,
        position: EditorPosition,
    },
    SemanticTokens {
        model: ModelHandle,
    },
}

impl CapabilityRequest {
    pub fn capability(&self) -> Capability {
        match self {
            Self::DocumentSymbols { .. } => Capability::DocumentSymbols,
            Self::Formatting { .. } => Capability::Formatting,
            Self::PrepareRename { .. } | Self::Rename { .. } => Capability::Rename,
            Self::Hover { .. } => Capability::Hover,
            Self::Completion { .. } => Capability::Completion,
            Self::SemanticTokens { .. } => Capability::SemanticTokens,
        }
    }
}

/// Editor-native result of a `CapabilityRequest`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "capability", content = "result", rename_all = "camelCase")]
pub enum CapabilityResponse {
    DocumentSymbols(Vec<EditorDocumentSymbol>),
    Formatting(Vec<EditorTextEdit>),
    PrepareRename(RenameLocation),
    Rename(EditorWorkspaceEdit),
    Hover(Option<EditorHover>),
    Completion(CompletionList),
    SemanticTokens(EditorSemanticTokens),
}

/// Replace range used for completion items without their own edit range
const DEFAULT_COMPLETION_RANGE: EditorRange = EditorRange {
    start_line_number: 1,
    start_column: 1,
    end_line_number: 1,
    end_column: 1,
};

fn position_params(model: &ModelHandle, position: EditorPosition) -> TextDocumentPositionParams {
    TextDocumentPositionParams {
        text_document: TextDocumentIdentifier::new(&model.uri),
        position: Position::from_editor(position.line_number, position.column),
    }
}

fn to_params<T: Serialize>(params: &T) -> BridgeResult<Option<Value>> {
    Ok(Some(serde_json::to_value(params)?))
}

fn translate<T: DeserializeOwned>(capability: &'static str, value: Value) -> BridgeResult<T> {
    serde_json::from_value(value).map_err(|e| BridgeError::translation(capability, e))
}

pub struct ProviderBridge {
    engine: Arc<RpcEngine>,
    surface: Arc<dyn EditorSurface>,
    languages: Mutex<HashSet<String>>,
    documents: DocumentRegistry,
    legend: OnceLock<SemanticTokensLegend>,
    owner: String,
}

impl ProviderBridge {
    pub fn new(engine: Arc<RpcEngine>, surface: Arc<dyn EditorSurface>) -> Self {
        let owner = engine.config().diagnostics_owner.clone();
        Self {
            engine,
            surface,
            languages: Mutex::new(HashSet::new()),
            documents: DocumentRegistry::new(),
            legend: OnceLock::new(),
            owner,
        }
    }

    pub fn documents(&self) -> &DocumentRegistry {
        &self.documents
    }

    /// Semantic-token legend captured at handshake
    pub fn legend(&self) -> Option<&SemanticTokensLegend> {
        self.legend.get()
    }

    /// Store the handshake legend; later calls are ignored
    pub(crate) fn set_legend(&self, legend: SemanticTokensLegend) -> bool {
        self.legend.set(legend).is_ok()
    }

    /// Register every capability provider for `language`
    ///
    /// Idempotent per language id: a repeated call logs and returns the id.
    pub fn add_language(&self, language: LanguageExtensionPoint) -> String {
        let inserted = self
            .languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(language.id.clone());

        if inserted {
            tracing::debug!("Registering providers for language '{}'", language.id);
            self.surface.register_language(&language, &Capability::ALL);
        } else {
            tracing::warn!("Language already added: {}", language.id);
        }
        language.id
    }

    pub fn is_registered(&self, language_id: &str) -> bool {
        self.languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(language_id)
    }

    /// Translate one capability invocation through the server
    pub async fn provide(
        &self,
        language_id: &str,
        request: CapabilityRequest,
    ) -> BridgeResult<CapabilityResponse> {
        self.dispatch(language_id, request, None).await
    }

    /// Like `provide`, abandoning the server request when `cancel` fires
    pub async fn provide_with(
        &self,
        language_id: &str,
        request: CapabilityRequest,
        cancel: &CancellationToken,
    ) -> BridgeResult<CapabilityResponse> {
        self.dispatch(language_id, request, Some(cancel)).await
    }

    async fn dispatch(
        &self,
        language_id: &str,
        request: CapabilityRequest,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<CapabilityResponse> {
        if !self.is_registered(language_id) {
            return Err(BridgeError::UnknownLanguage(language_id.to_string()));
        }

        let response = match request {
            CapabilityRequest::DocumentSymbols { model } => {
                CapabilityResponse::DocumentSymbols(self.document_symbols(&model, cancel).await?)
            }
            CapabilityRequest::Formatting { model, options } => {
                CapabilityResponse::Formatting(self.format(&model, options, cancel).await?)
            }
            CapabilityRequest::PrepareRename { model, position } => CapabilityResponse::PrepareRename(
                self.resolve_rename_location(&model, position, cancel).await?,
            ),
            CapabilityRequest::Rename {
                model,
                position,
                new_name,
            } => CapabilityResponse::Rename(
                self.provide_rename_edits(&model, position, new_name, cancel)
                    .await?,
            ),
            CapabilityRequest::Hover { model, position } => {
                CapabilityResponse::Hover(self.hover(&model, position, cancel).await?)
            }
            CapabilityRequest::Completion { model, position } => {
                CapabilityResponse::Completion(self.completion(&model, position, cancel).await?)
            }
            CapabilityRequest::SemanticTokens { model } => {
                CapabilityResponse::SemanticTokens(self.semantic_tokens(&model, cancel).await?)
            }
        };
        Ok(response)
    }

    async fn call(
        &self,
        method: &str,
        params: Option<Value>,
        cancel: Option<&CancellationToken>,
    ) -> Result<Value, RpcError> {
        match cancel {
            Some(token) => self.engine.request_with(method, params, token).await,
            None => self.engine.request(method, params).await,
        }
    }

    async fn document_symbols(
        &self,
        model: &ModelHandle,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<Vec<EditorDocumentSymbol>> {
        let params = serde_json::json!({ "textDocument": TextDocumentIdentifier::new(&model.uri) });
        let value = self
            .call(methods::DOCUMENT_SYMBOL, Some(params), cancel)
            .await?;
        Ok(converters::convert_document_symbols(translate(
            "documentSymbol",
            value,
        )?))
    }

    async fn format(
        &self,
        model: &ModelHandle,
        options: FormattingOptions,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<Vec<EditorTextEdit>> {
        let params = to_params(&DocumentFormattingParams {
            text_document: TextDocumentIdentifier::new(&model.uri),
            options,
        })?;
        let value = self.call(methods::FORMATTING, params, cancel).await?;
        Ok(converters::convert_text_edits(translate("formatting", value)?))
    }

    /// Unusable prepare results and server refusals become a rejection
    async fn resolve_rename_location(
        &self,
        model: &ModelHandle,
        position: EditorPosition,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<RenameLocation> {
        let params = to_params(&position_params(model, position))?;
        let value = match self.call(methods::PREPARE_RENAME, params, cancel).await {
            Ok(value) => value,
            Err(RpcError::ServerError { code, message }) => {
                tracing::debug!("prepareRename refused [{}]: {}", code, message);
                return Ok(RenameLocation::rejected());
            }
            Err(e) => return Err(e.into()),
        };

        let response = serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::debug!("Unusable prepareRename result: {}", e);
            None
        });
        Ok(converters::convert_rename_location(response))
    }

    async fn provide_rename_edits(
        &self,
        model: &ModelHandle,
        position: EditorPosition,
        new_name: String,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<EditorWorkspaceEdit> {
        let params = to_params(&RenameParams {
            text_document: TextDocumentIdentifier::new(&model.uri),
            position: Position::from_editor(position.line_number, position.column),
            new_name,
        })?;
        let value = self.call(methods::RENAME, params, cancel).await?;
        Ok(converters::convert_workspace_edit(translate("rename", value)?))
    }

    async fn hover(
        &self,
        model: &ModelHandle,
        position: EditorPosition,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<Option<EditorHover>> {
        let params = to_params(&position_params(model, position))?;
        let value = self.call(methods::HOVER, params, cancel).await?;
        Ok(converters::convert_hover(translate("hover", value)?))
    }

    /// Translation failures are logged and yield an empty, complete list
    async fn completion(
        &self,
        model: &ModelHandle,
        position: EditorPosition,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<CompletionList> {
        let params = to_params(&position_params(model, position))?;
        let value = self.call(methods::COMPLETION, params, cancel).await?;

        Ok(
            converters::convert_completion(value, DEFAULT_COMPLETION_RANGE).unwrap_or_else(|e| {
                tracing::warn!("Failed to translate completion response: {}", e);
                CompletionList::default()
            }),
        )
    }

    async fn semantic_tokens(
        &self,
        model: &ModelHandle,
        cancel: Option<&CancellationToken>,
    ) -> BridgeResult<EditorSemanticTokens> {
        let params = serde_json::json!({ "textDocument": TextDocumentIdentifier::new(&model.uri) });
        let value = self
            .call(methods::SEMANTIC_TOKENS_FULL, Some(params), cancel)
            .await?;
        Ok(converters::convert_semantic_tokens(translate(
            "semanticTokens",
            value,
        )?))
    }
}
