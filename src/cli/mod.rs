//! CLI module for lsp-bridge
//!
//! Provides command-line interface using clap derive macros.

pub mod commands;
pub mod location;
pub mod output;
pub mod response;
pub mod surface;

pub use location::ParsedLocation;
pub use output::OutputContext;
pub use surface::CliSurface;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::{
    complete::CompleteArgs, config::ConfigArgs, diagnostics::DiagnosticsArgs, format::FormatArgs,
    hover::HoverArgs, rename::RenameArgs, symbols::SymbolsArgs, tokens::TokensArgs,
};

const LONG_ABOUT: &str = r#"
lsp-bridge - drive a running language server through editor-style capability calls

Each command attaches to a server listening on TCP, performs the LSP handshake,
opens one document and prints the editor-native result as JSON.

EXAMPLES:
  lsp-bridge hover data/people.ttl:4:7
  lsp-bridge symbols data/people.ttl
  lsp-bridge complete query.rq:3:12
  lsp-bridge rename data/people.ttl:4:7 ex:bob
  lsp-bridge --connect 127.0.0.1:9000 diagnostics data/people.ttl --wait-ms 3000
"#;

/// lsp-bridge - editor capabilities over the Language Server Protocol
#[derive(Parser, Debug)]
#[command(name = "lsp-bridge")]
#[command(author, version, about, long_about = LONG_ABOUT)]
#[command(propagate_version = true)]
#[command(after_help = "Use 'lsp-bridge <COMMAND> --help' for more information about a command.")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Server address (host:port); overrides the configured address
    #[arg(long, global = true)]
    pub connect: Option<String>,

    /// Config file to use instead of the global one
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Hover information at a position
    Hover(HoverArgs),

    /// Document symbols of a file
    Symbols(SymbolsArgs),

    /// Formatting edits for a file
    Format(FormatArgs),

    /// Completion suggestions at a position
    Complete(CompleteArgs),

    /// Rename the symbol at a position (prepare, then apply)
    Rename(RenameArgs),

    /// Semantic tokens of a file
    Tokens(TokensArgs),

    /// Diagnostics pushed by the server for a file
    Diagnostics(DiagnosticsArgs),

    /// Configuration management
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command talks to a language server
    pub fn needs_server(&self) -> bool {
        !matches!(self, Commands::Config(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "lsp-bridge",
            "--connect",
            "localhost:9000",
            "hover",
            "a.ttl:1:2",
        ])
        .unwrap();
        assert_eq!(cli.connect.as_deref(), Some("localhost:9000"));
        assert!(cli.command.needs_server());
    }

    #[test]
    fn test_format_flags() {
        let cli =
            Cli::try_parse_from(["lsp-bridge", "format", "a.ttl", "--tab-size", "2", "--spaces"])
                .unwrap();
        let Commands::Format(args) = cli.command else {
            panic!("expected format command");
        };
        assert_eq!(args.tab_size, 2);
        assert!(args.spaces);
    }

    #[test]
    fn test_config_needs_no_server() {
        let cli = Cli::try_parse_from(["lsp-bridge", "config", "path"]).unwrap();
        assert!(!cli.command.needs_server());
    }

    #[test]
    fn test_rename_requires_new_name() {
        assert!(Cli::try_parse_from(["lsp-bridge", "rename", "a.ttl:1:1"]).is_err());
    }
}
