//! Response types for CLI output
//!
//! Each command prints one of these, flattened next to `"success": true`.

use serde::Serialize;

use crate::models::editor::{
    CompletionSuggestion, EditorDocumentSymbol, EditorHover, EditorPosition, EditorRange,
    EditorTextEdit, Marker, ResourceTextEdit,
};

/// Position in a file, 1-indexed like the editor
#[derive(Debug, Clone, Serialize)]
pub struct LocationOutput {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl LocationOutput {
    pub fn new(file: impl Into<String>, position: EditorPosition) -> Self {
        Self {
            file: file.into(),
            line: position.line_number,
            column: position.column,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HoverResponse {
    pub location: LocationOutput,
    #[serde(flatten)]
    pub hover: Option<EditorHover>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub file: String,
    pub count: usize,
    pub symbols: Vec<EditorDocumentSymbol>,
}

#[derive(Debug, Serialize)]
pub struct FormatResponse {
    pub file: String,
    pub tab_size: u32,
    pub insert_spaces: bool,
    pub count: usize,
    pub edits: Vec<EditorTextEdit>,
}

#[derive(Debug, Serialize)]
pub struct CompletionResponse {
    pub location: LocationOutput,
    pub incomplete: bool,
    pub count: usize,
    pub suggestions: Vec<CompletionSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct RenameResponse {
    pub location: LocationOutput,
    pub old_name: String,
    pub new_name: String,
    pub range: EditorRange,
    pub files_changed: usize,
    pub total_changes: usize,
    pub edits: Vec<ResourceTextEdit>,
}

#[derive(Debug, Serialize)]
pub struct TokensResponse {
    pub file: String,
    pub token_types: Vec<String>,
    pub token_modifiers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    /// Number of encoded tokens (five integers each)
    pub count: usize,
    pub data: Vec<u32>,
}

#[derive(Debug, Serialize)]
pub struct DiagnosticsResponse {
    pub file: String,
    pub owner: String,
    /// False when the server published nothing within the wait window
    pub published: bool,
    pub count: usize,
    pub markers: Vec<Marker>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::editor::MarkdownString;

    #[test]
    fn test_hover_response_flattens_contents() {
        let response = HoverResponse {
            location: LocationOutput::new("a.ttl", EditorPosition::new(2, 3)),
            hover: Some(EditorHover {
                contents: vec![MarkdownString::new("**ex:a**")],
                range: None,
            }),
            message: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["location"]["line"], 2);
        assert_eq!(json["contents"][0]["value"], "**ex:a**");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_hover_response_without_hover() {
        let response = HoverResponse {
            location: LocationOutput::new("a.ttl", EditorPosition::new(1, 1)),
            hover: None,
            message: Some("No hover information available".to_string()),
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("contents").is_none());
        assert_eq!(json["message"], "No hover information available");
    }
}
