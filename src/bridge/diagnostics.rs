//! Open-document registry and diagnostics application

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use super::{ProviderBridge, converters};
use crate::models::editor::ModelHandle;
use crate::models::lsp::PublishDiagnosticsParams;

/// URI → open editor document
#[derive(Default)]
pub struct DocumentRegistry {
    documents: RwLock<HashMap<String, ModelHandle>>,
}

impl DocumentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `model`; replaces any handle previously open under the same URI
    pub fn open(&self, model: ModelHandle) -> Option<ModelHandle> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.uri.clone(), model)
    }

    pub fn close(&self, uri: &str) -> Option<ModelHandle> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uri)
    }

    pub fn get(&self, uri: &str) -> Option<ModelHandle> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ProviderBridge {
    /// Apply a diagnostics push to the matching open document
    ///
    /// The full marker set under the owner tag is replaced. Pushes for
    /// documents that are not open are dropped, not buffered.
    pub fn handle_diagnostics(&self, params: PublishDiagnosticsParams) {
        let Some(model) = self.documents.get(&params.uri) else {
            tracing::trace!("Dropping diagnostics for unopened document {}", params.uri);
            return;
        };

        let markers = converters::convert_diagnostics(&params.diagnostics);
        tracing::debug!("Applying {} markers to {}", markers.len(), params.uri);
        self.surface.set_model_markers(&model, &self.owner, markers);
    }
}
