//! Editor surface backing the command line

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::bridge::{Capability, EditorSurface};
use crate::models::editor::{LanguageExtensionPoint, Marker, ModelHandle};

/// Keeps the latest marker set per document instead of drawing it
#[derive(Default)]
pub struct CliSurface {
    languages: Mutex<Vec<String>>,
    markers: Mutex<HashMap<String, Vec<Marker>>>,
}

impl CliSurface {
    pub fn languages(&self) -> Vec<String> {
        self.languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// `None` until the server has published for `uri`
    pub fn markers(&self, uri: &str) -> Option<Vec<Marker>> {
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned()
    }
}

impl EditorSurface for CliSurface {
    fn register_language(&self, language: &LanguageExtensionPoint, capabilities: &[Capability]) {
        tracing::debug!(
            "Language '{}' registered with {} capabilities",
            language.id,
            capabilities.len()
        );
        self.languages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(language.id.clone());
    }

    fn set_model_markers(&self, model: &ModelHandle, owner: &str, markers: Vec<Marker>) {
        tracing::debug!("{} markers from '{}' for {}", markers.len(), owner, model.uri);
        self.markers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(model.uri.clone(), markers);
    }
}
