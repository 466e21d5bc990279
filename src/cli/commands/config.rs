//! Config command implementation

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::app::App;
use crate::config::RuntimeConfig;
use crate::infra::rpc::protocol::methods;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Write a config file with default values
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration (file plus environment)
    Show,

    /// Show config file path
    Path,
}

#[derive(Serialize)]
struct ConfigInitResponse {
    status: &'static str,
    path: String,
}

#[derive(Serialize)]
struct ConfigShowResponse {
    path: String,
    config: serde_json::Value,
    /// Per-operation deadlines derived from `rpc.timeout_secs`
    timeouts_secs: serde_json::Value,
}

#[derive(Serialize)]
struct ConfigPathResponse {
    path: String,
    exists: bool,
}

pub async fn execute(args: ConfigArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let path = app.config_service.config_path();

    match args.command {
        ConfigCommand::Init { force } => match app.config_service.init(force).await {
            Ok(path) => ctx.print_success_flat(ConfigInitResponse {
                status: "created",
                path: path.display().to_string(),
            }),
            Err(e) => ctx.print_error(&e.to_string()),
        },

        ConfigCommand::Show => match app.config_service.load().await {
            Ok(config) => {
                let runtime = RuntimeConfig::from(&config);
                let timeouts = serde_json::json!({
                    "request": runtime.timeout_for(methods::HOVER).as_secs(),
                    "initialize": runtime.timeout_for(methods::INITIALIZE).as_secs(),
                    "rename": runtime.timeout_for(methods::RENAME).as_secs(),
                });
                ctx.print_success_flat(ConfigShowResponse {
                    path: path.display().to_string(),
                    config: serde_json::to_value(&config)?,
                    timeouts_secs: timeouts,
                });
            }
            Err(e) => ctx.print_error(&e.to_string()),
        },

        ConfigCommand::Path => ctx.print_success_flat(ConfigPathResponse {
            exists: path.exists(),
            path: path.display().to_string(),
        }),
    }

    Ok(())
}
