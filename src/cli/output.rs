//! Output formatting for CLI commands

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Every command prints exactly one JSON document through this context
#[derive(Debug, Clone)]
pub struct OutputContext {
    /// Working directory, used to shorten displayed paths
    root: PathBuf,
}

impl OutputContext {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Display `path` relative to the working directory when it lies inside it
    pub fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| path.display().to_string())
    }

    /// Print the fields of `data` next to `"success": true`
    pub fn print_success_flat<T: Serialize>(&self, data: T) {
        print_json(&flat_envelope(data));
    }

    pub fn print_error(&self, message: &str) {
        print_json(&serde_json::json!({
            "success": false,
            "error": message
        }));
    }
}

fn success_envelope<T: Serialize>(data: T) -> serde_json::Value {
    serde_json::json!({
        "success": true,
        "data": data
    })
}

fn flat_envelope<T: Serialize>(data: T) -> serde_json::Value {
    let mut response = serde_json::to_value(data).unwrap_or(serde_json::json!({}));
    if !response.is_object() {
        return success_envelope(response);
    }
    if let Some(obj) = response.as_object_mut() {
        obj.insert("success".to_string(), serde_json::json!(true));
    }
    response
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Failed to serialize output: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_path() {
        let ctx = OutputContext::new(PathBuf::from("/work"));
        assert_eq!(ctx.relative_path(Path::new("/work/data/a.ttl")), "data/a.ttl");
        assert_eq!(ctx.relative_path(Path::new("/other/b.ttl")), "/other/b.ttl");
    }

    #[test]
    fn test_flat_envelope() {
        let value = flat_envelope(serde_json::json!({ "count": 2 }));
        assert_eq!(value["success"], true);
        assert_eq!(value["count"], 2);
    }

    #[test]
    fn test_flat_envelope_wraps_non_objects() {
        let value = flat_envelope(vec![1, 2]);
        assert_eq!(value["success"], true);
        assert_eq!(value["data"], serde_json::json!([1, 2]));
    }
}
