//! Location parsing for CLI commands

use std::path::PathBuf;

use anyhow::{Context, Result, bail};

use crate::models::editor::EditorPosition;

/// `file:line[:column]`, 1-indexed
#[derive(Debug, Clone)]
pub struct ParsedLocation {
    pub file: PathBuf,
    pub line: u32,
    pub column: u32,
}

impl ParsedLocation {
    /// Parse and canonicalize the file part in one step
    pub fn parse_absolute(input: &str) -> Result<Self> {
        let mut location = Self::parse(input)?;
        location.file = canonical_file(&location.file)?;
        Ok(location)
    }

    /// Numeric segments are taken from the end, so paths may contain `:`
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            bail!("Location cannot be empty");
        }

        let mut numbers = Vec::with_capacity(2);
        let mut rest = input;
        while numbers.len() < 2 {
            let Some((head, tail)) = rest.rsplit_once(':') else {
                break;
            };
            if tail.starts_with('-') {
                bail!("Invalid position '{}': negative values not allowed", tail);
            }
            if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
                break;
            }
            // Keep the drive letter of `C:\...`
            if head.len() == 1 && head.as_bytes()[0].is_ascii_alphabetic() {
                break;
            }
            let value: u32 = tail
                .parse()
                .with_context(|| format!("Invalid position '{tail}'"))?;
            numbers.push(value);
            rest = head;
        }

        let (line, column) = match numbers.as_slice() {
            [line] => (*line, 1),
            [column, line] => (*line, *column),
            _ => bail!(
                "Invalid location format. Expected: file:line[:column]\nExample: data/people.ttl:10:5"
            ),
        };

        if rest.is_empty() {
            bail!("Location is missing a file path");
        }
        if line == 0 {
            bail!("Line number must be >= 1 (got 0). Line numbers are 1-indexed.");
        }
        if column == 0 {
            bail!("Column number must be >= 1 (got 0). Column numbers are 1-indexed.");
        }

        Ok(Self {
            file: PathBuf::from(rest),
            line,
            column,
        })
    }

    pub fn position(&self) -> EditorPosition {
        EditorPosition::new(self.line, self.column)
    }

    /// Check the position against already-read file content
    pub fn validate_position_with_content(&self, content: &str) -> Result<()> {
        let lines: Vec<&str> = content.lines().collect();
        let line_count = lines.len().max(1);

        if self.line as usize > line_count {
            bail!(
                "Line {} exceeds file length ({} lines)",
                self.line,
                line_count
            );
        }

        let line_len = lines
            .get((self.line - 1) as usize)
            .map(|l| l.chars().count())
            .unwrap_or(0);
        if self.column as usize > line_len + 1 {
            bail!(
                "Column {} exceeds line length ({} chars) at line {}",
                self.column,
                line_len,
                self.line
            );
        }

        Ok(())
    }
}

/// Resolve `file` against the working directory and canonicalize it
pub fn canonical_file(file: &std::path::Path) -> Result<PathBuf> {
    let joined = if file.is_absolute() {
        file.to_path_buf()
    } else {
        std::env::current_dir()
            .context("Failed to get current directory")?
            .join(file)
    };
    joined
        .canonicalize()
        .with_context(|| format!("File not found: {}", joined.display()))
}

impl std::fmt::Display for ParsedLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}
