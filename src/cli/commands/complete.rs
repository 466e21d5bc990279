//! Complete command implementation

use anyhow::Result;
use clap::Args;

use super::unexpected;
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::ParsedLocation;
use crate::cli::response::{CompletionResponse, LocationOutput};

#[derive(Args, Debug)]
pub struct CompleteArgs {
    /// File path with position (file:line:column)
    pub location: String,

    /// Maximum number of suggestions to print
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

pub async fn execute(args: CompleteArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse_absolute(&args.location)?;
    let content = tokio::fs::read_to_string(&loc.file).await?;
    if let Err(e) = loc.validate_position_with_content(&content) {
        ctx.print_error(&e.to_string());
        return Ok(());
    }

    let attachment = app.attach(&loc.file).await?;
    let result = attachment
        .provide(CapabilityRequest::Completion {
            model: attachment.model.clone(),
            position: loc.position(),
        })
        .await;
    attachment.detach();

    match result {
        Ok(CapabilityResponse::Completion(list)) => {
            let count = list.suggestions.len();
            let mut suggestions = list.suggestions;
            if let Some(limit) = args.limit {
                suggestions.truncate(limit);
            }
            ctx.print_success_flat(CompletionResponse {
                location: LocationOutput::new(ctx.relative_path(&loc.file), loc.position()),
                // Truncation means the client saw a partial list
                incomplete: list.incomplete || suggestions.len() < count,
                count,
                suggestions,
            });
        }
        Ok(other) => return Err(unexpected("completion", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}
