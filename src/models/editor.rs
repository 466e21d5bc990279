//! Editor-native types
//!
//! Shapes consumed and produced by the editor surface. Line numbers and
//! columns are 1-indexed, enum values follow the editor's own numbering.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Cursor position in the editor (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorPosition {
    pub line_number: u32,
    pub column: u32,
}

impl EditorPosition {
    pub fn new(line_number: u32, column: u32) -> Self {
        Self {
            line_number,
            column,
        }
    }
}

/// Range in the editor (1-indexed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorRange {
    pub start_line_number: u32,
    pub start_column: u32,
    pub end_line_number: u32,
    pub end_column: u32,
}

impl EditorRange {
    /// The all-zero range used by rename rejections
    pub const ZERO: Self = Self {
        start_line_number: 0,
        start_column: 0,
        end_line_number: 0,
        end_column: 0,
    };

    pub fn new(start_line_number: u32, start_column: u32, end_line_number: u32, end_column: u32) -> Self {
        Self {
            start_line_number,
            start_column,
            end_line_number,
            end_column,
        }
    }
}

/// Opaque handle to an open editor document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelHandle {
    pub id: u64,
    pub uri: String,
}

impl ModelHandle {
    pub fn new(id: u64, uri: impl Into<String>) -> Self {
        Self {
            id,
            uri: uri.into(),
        }
    }
}

/// Language contributed to the editor
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanguageExtensionPoint {
    pub id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mimetypes: Vec<String>,
}

impl LanguageExtensionPoint {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }
}

// ============================================================================
// Symbols
// ============================================================================

/// Editor symbol kind (0-indexed, unlike the protocol)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum SymbolKind {
    File = 0,
    Module = 1,
    Namespace = 2,
    Package = 3,
    Class = 4,
    Method = 5,
    Property = 6,
    Field = 7,
    Constructor = 8,
    Enum = 9,
    Interface = 10,
    Function = 11,
    Variable = 12,
    Constant = 13,
    String = 14,
    Number = 15,
    Boolean = 16,
    Array = 17,
    Object = 18,
    Key = 19,
    Null = 20,
    EnumMember = 21,
    Struct = 22,
    Event = 23,
    Operator = 24,
    TypeParameter = 25,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorDocumentSymbol {
    pub name: String,
    pub detail: String,
    pub kind: SymbolKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,
    pub range: EditorRange,
    pub selection_range: EditorRange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<EditorDocumentSymbol>,
}

// ============================================================================
// Edits
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorTextEdit {
    pub range: EditorRange,
    pub text: String,
}

/// Text edit bound to a resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTextEdit {
    pub resource: String,
    pub text_edit: EditorTextEdit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EditorWorkspaceEdit {
    pub edits: Vec<ResourceTextEdit>,
}

/// Result of resolving a rename location
///
/// A rejection carries `reject_reason`, empty text and the zero range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameLocation {
    pub text: String,
    pub range: EditorRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reject_reason: Option<String>,
}

impl RenameLocation {
    pub const NO_VALID_TOKEN: &'static str = "No valid token to rename";

    pub fn accepted(text: impl Into<String>, range: EditorRange) -> Self {
        Self {
            text: text.into(),
            range,
            reject_reason: None,
        }
    }

    pub fn rejected() -> Self {
        Self {
            text: String::new(),
            range: EditorRange::ZERO,
            reject_reason: Some(Self::NO_VALID_TOKEN.to_string()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        self.reject_reason.is_some()
    }
}

// ============================================================================
// Hover
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkdownString {
    pub value: String,
}

impl MarkdownString {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorHover {
    pub contents: Vec<MarkdownString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<EditorRange>,
}

// ============================================================================
// Completion
// ============================================================================

/// Editor completion item kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum CompletionItemKind {
    Method = 0,
    Function = 1,
    Constructor = 2,
    Field = 3,
    Variable = 4,
    Class = 5,
    Struct = 6,
    Interface = 7,
    Module = 8,
    Property = 9,
    Event = 10,
    Operator = 11,
    Unit = 12,
    Value = 13,
    Constant = 14,
    Enum = 15,
    EnumMember = 16,
    Keyword = 17,
    Text = 18,
    Color = 19,
    File = 20,
    Reference = 21,
    Customcolor = 22,
    Folder = 23,
    TypeParameter = 24,
    User = 25,
    Issue = 26,
    Snippet = 27,
}

/// `insertTextRules` flag: treat insert text as a snippet
pub const INSERT_AS_SNIPPET: u8 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSuggestion {
    pub label: String,
    pub kind: CompletionItemKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<MarkdownString>,
    pub insert_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insert_text_rules: Option<u8>,
    pub range: EditorRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,
    #[serde(default)]
    pub preselect: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u8>,
}

/// Completion result; `Default` is the benign empty list
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CompletionList {
    pub incomplete: bool,
    pub suggestions: Vec<CompletionSuggestion>,
}

// ============================================================================
// Semantic tokens
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditorSemanticTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_id: Option<String>,
    pub data: Vec<u32>,
}

// ============================================================================
// Markers
// ============================================================================

/// Editor marker severity (bit values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MarkerSeverity {
    Hint = 1,
    Info = 2,
    Warning = 4,
    Error = 8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum MarkerTag {
    Unnecessary = 1,
    Deprecated = 2,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedInformation {
    pub resource: String,
    pub message: String,
    pub range: EditorRange,
}

/// Diagnostic marker shown by the editor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Marker {
    pub severity: MarkerSeverity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub range: EditorRange,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<MarkerTag>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<RelatedInformation>,
}
