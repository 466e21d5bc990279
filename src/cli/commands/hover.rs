//! Hover command implementation
//!
//! Get hover information (type, documentation) for a position.

use anyhow::Result;
use clap::Args;

use super::unexpected;
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::ParsedLocation;
use crate::cli::response::{HoverResponse, LocationOutput};

#[derive(Args, Debug)]
pub struct HoverArgs {
    /// File path with position (file:line:column)
    pub location: String,
}

pub async fn execute(args: HoverArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse_absolute(&args.location)?;
    let content = tokio::fs::read_to_string(&loc.file).await?;
    if let Err(e) = loc.validate_position_with_content(&content) {
        ctx.print_error(&e.to_string());
        return Ok(());
    }

    let attachment = app.attach(&loc.file).await?;
    let result = attachment
        .provide(CapabilityRequest::Hover {
            model: attachment.model.clone(),
            position: loc.position(),
        })
        .await;
    attachment.detach();

    let location = LocationOutput::new(ctx.relative_path(&loc.file), loc.position());
    match result {
        Ok(CapabilityResponse::Hover(Some(hover))) => ctx.print_success_flat(HoverResponse {
            location,
            hover: Some(hover),
            message: None,
        }),
        Ok(CapabilityResponse::Hover(None)) => ctx.print_success_flat(HoverResponse {
            location,
            hover: None,
            message: Some("No hover information available".to_string()),
        }),
        Ok(other) => return Err(unexpected("hover", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}
