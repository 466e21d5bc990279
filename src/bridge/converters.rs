//! Protocol → editor conversions
//!
//! Protocol positions are 0-indexed, editor positions 1-indexed.

use serde_json::Value;

use crate::models::editor::{
    CompletionItemKind, CompletionList, CompletionSuggestion, EditorDocumentSymbol, EditorHover,
    EditorRange, EditorSemanticTokens, EditorTextEdit, EditorWorkspaceEdit, INSERT_AS_SNIPPET,
    MarkdownString, Marker, MarkerSeverity, MarkerTag, RelatedInformation, RenameLocation,
    ResourceTextEdit, SymbolKind,
};
use crate::models::lsp::{
    CompletionItem, CompletionResponse, CompletionTextEdit, DocumentChange, DocumentSymbol,
    DocumentSymbolResponse, Documentation, Hover, HoverContents, INSERT_TEXT_FORMAT_SNIPPET,
    LspDiagnostic, LspDiagnosticSeverity, LspDiagnosticTag, LspSymbolKind, MarkedString,
    PrepareRenameResponse, Range, SemanticTokens, SymbolInformation, TextEdit, WorkspaceEdit,
};

/// Positions at `u32::MAX` clamp instead of wrapping
pub(super) fn convert_range(range: &Range) -> EditorRange {
    EditorRange {
        start_line_number: range.start.line.saturating_add(1),
        start_column: range.start.character.saturating_add(1),
        end_line_number: range.end.line.saturating_add(1),
        end_column: range.end.character.saturating_add(1),
    }
}

// ============================================================================
// Symbols
// ============================================================================

pub(super) fn convert_symbol_kind(kind: LspSymbolKind) -> SymbolKind {
    use LspSymbolKind as LspKind;
    match kind {
        LspKind::File => SymbolKind::File,
        LspKind::Module => SymbolKind::Module,
        LspKind::Namespace => SymbolKind::Namespace,
        LspKind::Package => SymbolKind::Package,
        LspKind::Class => SymbolKind::Class,
        LspKind::Method => SymbolKind::Method,
        LspKind::Property => SymbolKind::Property,
        LspKind::Field => SymbolKind::Field,
        LspKind::Constructor => SymbolKind::Constructor,
        LspKind::Enum => SymbolKind::Enum,
        LspKind::Interface => SymbolKind::Interface,
        LspKind::Function => SymbolKind::Function,
        LspKind::Variable => SymbolKind::Variable,
        LspKind::Constant => SymbolKind::Constant,
        LspKind::String => SymbolKind::String,
        LspKind::Number => SymbolKind::Number,
        LspKind::Boolean => SymbolKind::Boolean,
        LspKind::Array => SymbolKind::Array,
        LspKind::Object => SymbolKind::Object,
        LspKind::Key => SymbolKind::Key,
        LspKind::Null => SymbolKind::Null,
        LspKind::EnumMember => SymbolKind::EnumMember,
        LspKind::Struct => SymbolKind::Struct,
        LspKind::Event => SymbolKind::Event,
        LspKind::Operator => SymbolKind::Operator,
        LspKind::TypeParameter => SymbolKind::TypeParameter,
    }
}

pub(super) fn convert_document_symbols(
    response: Option<DocumentSymbolResponse>,
) -> Vec<EditorDocumentSymbol> {
    match response {
        None => Vec::new(),
        Some(DocumentSymbolResponse::Nested(symbols)) => convert_nested_symbols(&symbols, None),
        Some(DocumentSymbolResponse::Flat(symbols)) => {
            symbols.iter().map(convert_symbol_information).collect()
        }
    }
}

fn convert_nested_symbols(
    symbols: &[DocumentSymbol],
    container: Option<&str>,
) -> Vec<EditorDocumentSymbol> {
    symbols
        .iter()
        .map(|sym| EditorDocumentSymbol {
            name: sym.name.clone(),
            detail: sym.detail.clone().unwrap_or_default(),
            kind: convert_symbol_kind(sym.kind),
            tags: sym.tags.clone(),
            container_name: container.map(str::to_string),
            range: convert_range(&sym.range),
            selection_range: convert_range(&sym.selection_range),
            children: sym
                .children
                .as_deref()
                .map(|children| convert_nested_symbols(children, Some(&sym.name)))
                .unwrap_or_default(),
        })
        .collect()
}

fn convert_symbol_information(info: &SymbolInformation) -> EditorDocumentSymbol {
    let range = convert_range(&info.location.range);
    EditorDocumentSymbol {
        name: info.name.clone(),
        detail: String::new(),
        kind: convert_symbol_kind(info.kind),
        tags: info.tags.clone(),
        container_name: info.container_name.clone(),
        range,
        selection_range: range,
        children: Vec::new(),
    }
}

// ============================================================================
// Edits
// ============================================================================

pub(super) fn convert_text_edit(edit: &TextEdit) -> EditorTextEdit {
    EditorTextEdit {
        range: convert_range(&edit.range),
        text: edit.new_text.clone(),
    }
}

pub(super) fn convert_text_edits(edits: Option<Vec<TextEdit>>) -> Vec<EditorTextEdit> {
    edits
        .unwrap_or_default()
        .iter()
        .map(convert_text_edit)
        .collect()
}

/// Flatten `changes` and `documentChanges` into one resource edit list
///
/// `changes` entries are ordered by URI so output is stable.
pub(super) fn convert_workspace_edit(edit: Option<WorkspaceEdit>) -> EditorWorkspaceEdit {
    let Some(edit) = edit else {
        return EditorWorkspaceEdit::default();
    };
    let mut edits = Vec::new();

    if let Some(changes) = edit.changes {
        let mut changes: Vec<_> = changes.into_iter().collect();
        changes.sort_by(|a, b| a.0.cmp(&b.0));
        for (uri, text_edits) in changes {
            edits.extend(text_edits.iter().map(|e| ResourceTextEdit {
                resource: uri.clone(),
                text_edit: convert_text_edit(e),
                version_id: None,
            }));
        }
    }

    for change in edit.document_changes.unwrap_or_default() {
        match change {
            DocumentChange::Edit(doc_edit) => {
                let uri = doc_edit.text_document.uri;
                let version = doc_edit.text_document.version;
                edits.extend(doc_edit.edits.iter().map(|e| ResourceTextEdit {
                    resource: uri.clone(),
                    text_edit: convert_text_edit(e),
                    version_id: version,
                }));
            }
            DocumentChange::Operation(op) => {
                tracing::debug!("Skipping resource operation in workspace edit: {}", op);
            }
        }
    }

    EditorWorkspaceEdit { edits }
}

pub(super) fn convert_rename_location(response: Option<PrepareRenameResponse>) -> RenameLocation {
    match response {
        Some(PrepareRenameResponse::RangeWithPlaceholder { range, placeholder }) => {
            RenameLocation::accepted(placeholder, convert_range(&range))
        }
        Some(PrepareRenameResponse::Range(range)) => {
            RenameLocation::accepted(String::new(), convert_range(&range))
        }
        Some(PrepareRenameResponse::DefaultBehavior { .. }) | None => RenameLocation::rejected(),
    }
}

// ============================================================================
// Hover
// ============================================================================

fn marked_string_to_markdown(marked: &MarkedString) -> String {
    match marked {
        MarkedString::String(s) => s.clone(),
        MarkedString::LanguageString { language, value } => {
            format!("```{language}\n{value}\n```")
        }
    }
}

pub(super) fn convert_hover(hover: Option<Hover>) -> Option<EditorHover> {
    let hover = hover?;
    let values: Vec<String> = match &hover.contents {
        HoverContents::MarkupContent(mc) => vec![mc.value.clone()],
        HoverContents::Scalar(marked) => vec![marked_string_to_markdown(marked)],
        HoverContents::Array(arr) => arr.iter().map(marked_string_to_markdown).collect(),
    };

    Some(EditorHover {
        contents: values
            .into_iter()
            .filter(|v| !v.is_empty())
            .map(MarkdownString::new)
            .collect(),
        range: hover.range.as_ref().map(convert_range),
    })
}

// ============================================================================
// Completion
// ============================================================================

/// Unknown kinds fall back to `Property`
pub(super) fn convert_completion_kind(kind: Option<u32>) -> CompletionItemKind {
    use CompletionItemKind as Kind;
    match kind {
        Some(1) => Kind::Text,
        Some(2) => Kind::Method,
        Some(3) => Kind::Function,
        Some(4) => Kind::Constructor,
        Some(5) => Kind::Field,
        Some(6) => Kind::Variable,
        Some(7) => Kind::Class,
        Some(8) => Kind::Interface,
        Some(9) => Kind::Module,
        Some(10) => Kind::Property,
        Some(11) => Kind::Unit,
        Some(12) => Kind::Value,
        Some(13) => Kind::Enum,
        Some(14) => Kind::Keyword,
        Some(15) => Kind::Snippet,
        Some(16) => Kind::Color,
        Some(17) => Kind::File,
        Some(18) => Kind::Reference,
        Some(19) => Kind::Folder,
        Some(20) => Kind::EnumMember,
        Some(21) => Kind::Constant,
        Some(22) => Kind::Struct,
        Some(23) => Kind::Event,
        Some(24) => Kind::Operator,
        Some(25) => Kind::TypeParameter,
        _ => Kind::Property,
    }
}

fn convert_completion_item(item: CompletionItem, default_range: EditorRange) -> CompletionSuggestion {
    let (insert_text, range) = match &item.text_edit {
        Some(CompletionTextEdit::Edit(edit)) => (edit.new_text.clone(), convert_range(&edit.range)),
        Some(CompletionTextEdit::InsertAndReplace(edit)) => {
            (edit.new_text.clone(), convert_range(&edit.replace))
        }
        None => (
            item.insert_text.clone().unwrap_or_else(|| item.label.clone()),
            default_range,
        ),
    };

    let documentation = item.documentation.map(|doc| match doc {
        Documentation::String(s) => MarkdownString::new(s),
        Documentation::MarkupContent(mc) => MarkdownString::new(mc.value),
    });

    CompletionSuggestion {
        kind: convert_completion_kind(item.kind),
        label: item.label,
        detail: item.detail,
        documentation,
        insert_text,
        insert_text_rules: (item.insert_text_format == Some(INSERT_TEXT_FORMAT_SNIPPET))
            .then_some(INSERT_AS_SNIPPET),
        range,
        sort_text: item.sort_text,
        filter_text: item.filter_text,
        preselect: item.preselect.unwrap_or(false),
        tags: item.tags,
    }
}

/// Translate a raw completion result; the caller recovers from errors
pub(super) fn convert_completion(
    value: Value,
    default_range: EditorRange,
) -> Result<CompletionList, serde_json::Error> {
    let response: Option<CompletionResponse> = serde_json::from_value(value)?;
    let (incomplete, items) = match response {
        None => (false, Vec::new()),
        Some(CompletionResponse::Array(items)) => (false, items),
        Some(CompletionResponse::List(list)) => (list.is_incomplete, list.items),
    };

    Ok(CompletionList {
        incomplete,
        suggestions: items
            .into_iter()
            .map(|item| convert_completion_item(item, default_range))
            .collect(),
    })
}

// ============================================================================
// Semantic tokens / diagnostics
// ============================================================================

pub(super) fn convert_semantic_tokens(tokens: Option<SemanticTokens>) -> EditorSemanticTokens {
    match tokens {
        Some(tokens) => EditorSemanticTokens {
            result_id: tokens.result_id,
            data: tokens.data,
        },
        None => EditorSemanticTokens {
            result_id: None,
            data: Vec::new(),
        },
    }
}

/// Missing severity is shown as an error
pub(super) fn convert_severity(severity: Option<LspDiagnosticSeverity>) -> MarkerSeverity {
    match severity {
        Some(LspDiagnosticSeverity::Error) | None => MarkerSeverity::Error,
        Some(LspDiagnosticSeverity::Warning) => MarkerSeverity::Warning,
        Some(LspDiagnosticSeverity::Information) => MarkerSeverity::Info,
        Some(LspDiagnosticSeverity::Hint) => MarkerSeverity::Hint,
    }
}

fn convert_marker_tag(tag: LspDiagnosticTag) -> MarkerTag {
    match tag {
        LspDiagnosticTag::Unnecessary => MarkerTag::Unnecessary,
        LspDiagnosticTag::Deprecated => MarkerTag::Deprecated,
    }
}

pub(super) fn convert_diagnostics(diagnostics: &[LspDiagnostic]) -> Vec<Marker> {
    diagnostics
        .iter()
        .map(|diag| Marker {
            severity: convert_severity(diag.severity),
            message: diag.message.clone(),
            source: diag.source.clone(),
            code: diag.code.as_ref().map(|code| match code {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }),
            range: convert_range(&diag.range),
            tags: diag.tags.iter().copied().map(convert_marker_tag).collect(),
            related_information: diag
                .related_information
                .iter()
                .map(|info| RelatedInformation {
                    resource: info.location.uri.clone(),
                    message: info.message.clone(),
                    range: convert_range(&info.location.range),
                })
                .collect(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_range_is_shifted_to_one_based() {
        let range: Range = serde_json::from_value(json!({
            "start": {"line": 0, "character": 4},
            "end": {"line": 2, "character": 0}
        }))
        .unwrap();
        assert_eq!(convert_range(&range), EditorRange::new(1, 5, 3, 1));
    }

    #[test]
    fn test_range_at_u32_max_saturates() {
        let range: Range = serde_json::from_value(json!({
            "start": {"line": u32::MAX, "character": 0},
            "end": {"line": u32::MAX, "character": u32::MAX}
        }))
        .unwrap();
        assert_eq!(
            convert_range(&range),
            EditorRange::new(u32::MAX, 1, u32::MAX, u32::MAX)
        );
    }

    #[test]
    fn test_nested_symbols_keep_hierarchy() {
        let response: Option<DocumentSymbolResponse> = serde_json::from_value(json!([{
            "name": "Person",
            "kind": 5,
            "range": {"start": {"line": 0, "character": 0}, "end": {"line": 9, "character": 1}},
            "selectionRange": {"start": {"line": 0, "character": 6}, "end": {"line": 0, "character": 12}},
            "children": [{
                "name": "name",
                "detail": "string",
                "kind": 7,
                "range": {"start": {"line": 1, "character": 2}, "end": {"line": 1, "character": 14}},
                "selectionRange": {"start": {"line": 1, "character": 2}, "end": {"line": 1, "character": 6}}
            }]
        }]))
        .unwrap();

        let symbols = convert_document_symbols(response);
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].kind, SymbolKind::Class);
        assert_eq!(symbols[0].detail, "");
        assert_eq!(symbols[0].selection_range, EditorRange::new(1, 7, 1, 13));

        let child = &symbols[0].children[0];
        assert_eq!(child.kind, SymbolKind::Property);
        assert_eq!(child.detail, "string");
        assert_eq!(child.container_name.as_deref(), Some("Person"));
    }

    #[test]
    fn test_flat_symbols_use_location_range() {
        let response: Option<DocumentSymbolResponse> = serde_json::from_value(json!([{
            "name": "ex:alice",
            "kind": 13,
            "location": {
                "uri": "file:///a.ttl",
                "range": {"start": {"line": 3, "character": 0}, "end": {"line": 3, "character": 8}}
            },
            "containerName": "ex"
        }]))
        .unwrap();

        let symbols = convert_document_symbols(response);
        assert_eq!(symbols[0].kind, SymbolKind::Variable);
        assert_eq!(symbols[0].range, EditorRange::new(4, 1, 4, 9));
        assert_eq!(symbols[0].range, symbols[0].selection_range);
        assert_eq!(symbols[0].container_name.as_deref(), Some("ex"));
    }

    #[test]
    fn test_workspace_edit_flattens_both_forms() {
        let edit: WorkspaceEdit = serde_json::from_value(json!({
            "changes": {
                "file:///b.ttl": [{"range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 3}}, "newText": "new"}],
                "file:///a.ttl": [{"range": {"start": {"line": 1, "character": 0}, "end": {"line": 1, "character": 3}}, "newText": "new"}]
            },
            "documentChanges": [
                {
                    "textDocument": {"uri": "file:///c.ttl", "version": 4},
                    "edits": [{"range": {"start": {"line": 2, "character": 1}, "end": {"line": 2, "character": 2}}, "newText": "x"}]
                },
                {"kind": "create", "uri": "file:///d.ttl"}
            ]
        }))
        .unwrap();

        let flat = convert_workspace_edit(Some(edit));
        let resources: Vec<_> = flat.edits.iter().map(|e| e.resource.as_str()).collect();
        assert_eq!(resources, vec!["file:///a.ttl", "file:///b.ttl", "file:///c.ttl"]);
        assert_eq!(flat.edits[2].version_id, Some(4));
        assert_eq!(flat.edits[2].text_edit.range, EditorRange::new(3, 2, 3, 3));

        assert!(convert_workspace_edit(None).edits.is_empty());
    }

    #[test]
    fn test_rename_location_forms() {
        let range = json!({"start": {"line": 0, "character": 3}, "end": {"line": 0, "character": 8}});

        let with_placeholder = serde_json::from_value(json!({"range": range, "placeholder": "alice"})).unwrap();
        let location = convert_rename_location(Some(with_placeholder));
        assert_eq!(location, RenameLocation::accepted("alice", EditorRange::new(1, 4, 1, 9)));

        let bare = serde_json::from_value(range).unwrap();
        let location = convert_rename_location(Some(bare));
        assert_eq!(location.text, "");
        assert!(!location.is_rejected());

        let default = serde_json::from_value(json!({"defaultBehavior": true})).unwrap();
        assert!(convert_rename_location(Some(default)).is_rejected());
        assert!(convert_rename_location(None).is_rejected());
    }

    #[test]
    fn test_hover_contents_become_markdown() {
        let hover: Hover = serde_json::from_value(json!({
            "contents": [{"language": "turtle", "value": "ex:a a ex:B ."}, "plain", ""]
        }))
        .unwrap();
        let converted = convert_hover(Some(hover)).unwrap();
        assert_eq!(
            converted.contents,
            vec![
                MarkdownString::new("```turtle\nex:a a ex:B .\n```"),
                MarkdownString::new("plain"),
            ]
        );
        assert!(converted.range.is_none());
        assert!(convert_hover(None).is_none());
    }

    #[test]
    fn test_completion_array_uses_default_range() {
        let list = convert_completion(
            json!([
                {"label": "foaf:name", "kind": 10},
                {"label": "prefix", "kind": 15, "insertText": "@prefix ${1:p}: <$2> .", "insertTextFormat": 2},
                {"label": "odd", "kind": 99}
            ]),
            EditorRange::new(1, 1, 1, 1),
        )
        .unwrap();

        assert!(!list.incomplete);
        assert_eq!(list.suggestions[0].insert_text, "foaf:name");
        assert_eq!(list.suggestions[0].kind, CompletionItemKind::Property);
        assert_eq!(list.suggestions[0].range, EditorRange::new(1, 1, 1, 1));
        assert_eq!(list.suggestions[1].kind, CompletionItemKind::Snippet);
        assert_eq!(list.suggestions[1].insert_text_rules, Some(INSERT_AS_SNIPPET));
        assert_eq!(list.suggestions[2].kind, CompletionItemKind::Property);
    }

    #[test]
    fn test_completion_list_with_text_edit() {
        let list = convert_completion(
            json!({
                "isIncomplete": true,
                "items": [{
                    "label": "rdf:type",
                    "textEdit": {
                        "range": {"start": {"line": 2, "character": 4}, "end": {"line": 2, "character": 7}},
                        "newText": "rdf:type"
                    }
                }]
            }),
            EditorRange::new(1, 1, 1, 1),
        )
        .unwrap();

        assert!(list.incomplete);
        assert_eq!(list.suggestions[0].range, EditorRange::new(3, 5, 3, 8));
        assert!(convert_completion(Value::Null, EditorRange::ZERO).unwrap().suggestions.is_empty());
    }

    #[test]
    fn test_malformed_completion_is_an_error() {
        assert!(convert_completion(json!({"items": 3}), EditorRange::ZERO).is_err());
        assert!(convert_completion(json!("nope"), EditorRange::ZERO).is_err());
    }

    #[test]
    fn test_diagnostics_become_markers() {
        let diagnostics: Vec<LspDiagnostic> = serde_json::from_value(json!([
            {
                "range": {"start": {"line": 0, "character": 0}, "end": {"line": 0, "character": 5}},
                "severity": 2,
                "code": 42,
                "source": "swls",
                "message": "unused prefix",
                "tags": [1]
            },
            {
                "range": {"start": {"line": 1, "character": 0}, "end": {"line": 1, "character": 1}},
                "message": "no severity"
            }
        ]))
        .unwrap();

        let markers = convert_diagnostics(&diagnostics);
        assert_eq!(markers[0].severity, MarkerSeverity::Warning);
        assert_eq!(markers[0].code.as_deref(), Some("42"));
        assert_eq!(markers[0].tags, vec![MarkerTag::Unnecessary]);
        assert_eq!(markers[0].range, EditorRange::new(1, 1, 1, 6));
        assert_eq!(markers[1].severity, MarkerSeverity::Error);
    }

    #[test]
    fn test_severity_mapping() {
        assert_eq!(convert_severity(Some(LspDiagnosticSeverity::Information)), MarkerSeverity::Info);
        assert_eq!(convert_severity(Some(LspDiagnosticSeverity::Hint)), MarkerSeverity::Hint);
    }
}
