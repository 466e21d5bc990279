//! Command implementations for lsp-bridge
//!
//! Each command is implemented in its own module. Server-backed commands
//! attach through `App::attach`, issue one capability call and detach.

pub mod complete;
pub mod config;
pub mod diagnostics;
pub mod format;
pub mod hover;
pub mod rename;
pub mod symbols;
pub mod tokens;

use anyhow::{Result, bail};

use crate::bridge::CapabilityResponse;

/// Error for a response whose variant does not match the request
fn unexpected(expected: &str, got: &CapabilityResponse) -> anyhow::Error {
    let got = serde_json::to_value(got)
        .ok()
        .and_then(|v| v.get("capability").and_then(|c| c.as_str()).map(str::to_string))
        .unwrap_or_default();
    anyhow::anyhow!("Expected {expected} result, got '{got}'")
}

/// Reject names that could not be an identifier in any language
fn check_new_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("New name cannot be empty");
    }
    if name.chars().any(char::is_whitespace) {
        bail!("New name '{}' contains whitespace", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::editor::CompletionList;

    #[test]
    fn test_unexpected_names_variant() {
        let err = unexpected("hover", &CapabilityResponse::Completion(CompletionList::default()));
        assert_eq!(err.to_string(), "Expected hover result, got 'completion'");
    }

    #[test]
    fn test_check_new_name() {
        assert!(check_new_name("ex:bob").is_ok());
        assert!(check_new_name("  ").is_err());
        assert!(check_new_name("two words").is_err());
    }
}
