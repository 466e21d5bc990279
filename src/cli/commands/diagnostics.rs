//! Diagnostics command implementation
//!
//! Diagnostics are pushed, not requested: the command opens the file and
//! reports whatever the server has published once the wait window ends.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::Args;

use crate::app::App;
use crate::cli::location::canonical_file;
use crate::cli::response::DiagnosticsResponse;
use crate::models::editor::{Marker, MarkerSeverity};

#[derive(Args, Debug)]
pub struct DiagnosticsArgs {
    /// File path to check
    pub file: PathBuf,

    /// How long to wait for the server to publish, in milliseconds
    #[arg(long, default_value_t = 1500)]
    pub wait_ms: u64,

    /// Filter by severity (error, warning, info, hint)
    #[arg(long, short = 's', value_delimiter = ',')]
    pub severity: Option<Vec<String>>,
}

pub async fn execute(args: DiagnosticsArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = canonical_file(&args.file)?;
    let filter = args
        .severity
        .as_deref()
        .map(parse_severities)
        .transpose()?;

    let attachment = app.attach(&file).await?;
    tokio::time::sleep(Duration::from_millis(args.wait_ms)).await;
    let published = attachment.surface.markers(&attachment.model.uri);
    attachment.detach();

    let markers: Vec<Marker> = published
        .clone()
        .unwrap_or_default()
        .into_iter()
        .filter(|m| filter.as_ref().is_none_or(|f| f.contains(&m.severity)))
        .collect();

    ctx.print_success_flat(DiagnosticsResponse {
        file: ctx.relative_path(&file),
        owner: app.config().diagnostics.owner.clone(),
        published: published.is_some(),
        count: markers.len(),
        markers,
    });

    Ok(())
}

fn parse_severities(names: &[String]) -> Result<Vec<MarkerSeverity>> {
    names
        .iter()
        .map(|name| match name.trim().to_lowercase().as_str() {
            "error" => Ok(MarkerSeverity::Error),
            "warning" | "warn" => Ok(MarkerSeverity::Warning),
            "info" | "information" => Ok(MarkerSeverity::Info),
            "hint" => Ok(MarkerSeverity::Hint),
            other => Err(anyhow::anyhow!(
                "Unknown severity '{other}'. Expected: error, warning, info, hint"
            )),
        })
        .collect()
}
