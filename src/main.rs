//! lsp-bridge - editor capabilities over the Language Server Protocol
//!
//! Attaches to a running language server, performs the handshake and
//! prints editor-native capability results as JSON.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lsp_bridge::app::App;
use lsp_bridge::cli::{Cli, Commands};

fn main() {
    // Quiet by default so stdout stays machine-readable
    // Use RUST_LOG=lsp_bridge=debug for verbose output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lsp_bridge=warn".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!(
                r#"{{"success":false,"error":"Failed to create runtime: {}"}}"#,
                e
            );
            std::process::exit(1);
        }
    };
    let result = runtime.block_on(async_main());

    if let Err(e) = result {
        let response = serde_json::json!({
            "success": false,
            "error": format!("{e:#}")
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&response)
                .unwrap_or_else(|_| format!(r#"{{"success":false,"error":"{}"}}"#, e))
        );
        std::process::exit(2);
    }
}

async fn async_main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let app = App::new(cli.config.as_deref(), cli.connect)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to initialize: {}", e))?;

    if cli.command.needs_server() {
        tracing::debug!("Using language server at {}", app.address());
    }

    execute_command(cli.command, &app).await
}

async fn execute_command(command: Commands, app: &App) -> anyhow::Result<()> {
    use lsp_bridge::cli::commands;

    match command {
        // Capabilities
        Commands::Hover(args) => commands::hover::execute(args, app).await,
        Commands::Symbols(args) => commands::symbols::execute(args, app).await,
        Commands::Format(args) => commands::format::execute(args, app).await,
        Commands::Complete(args) => commands::complete::execute(args, app).await,
        Commands::Rename(args) => commands::rename::execute(args, app).await,
        Commands::Tokens(args) => commands::tokens::execute(args, app).await,

        // Pushed by the server
        Commands::Diagnostics(args) => commands::diagnostics::execute(args, app).await,

        Commands::Config(args) => commands::config::execute(args, app).await,
    }
}
