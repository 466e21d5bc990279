//! Rename command - prepare, then rename through the server

use anyhow::Result;
use clap::Args;

use super::{check_new_name, unexpected};
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::ParsedLocation;
use crate::cli::response::{LocationOutput, RenameResponse};
use crate::models::editor::EditorWorkspaceEdit;

#[derive(Args, Debug)]
pub struct RenameArgs {
    /// File path with position (file:line:column)
    pub location: String,

    /// New name for the symbol
    pub new_name: String,
}

pub async fn execute(args: RenameArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let loc = ParsedLocation::parse_absolute(&args.location)?;
    check_new_name(&args.new_name)?;

    let content = tokio::fs::read_to_string(&loc.file).await?;
    if let Err(e) = loc.validate_position_with_content(&content) {
        ctx.print_error(&e.to_string());
        return Ok(());
    }

    let attachment = app.attach(&loc.file).await?;
    let prepared = attachment
        .provide(CapabilityRequest::PrepareRename {
            model: attachment.model.clone(),
            position: loc.position(),
        })
        .await;

    let target = match prepared {
        Ok(CapabilityResponse::PrepareRename(target)) => target,
        Ok(other) => {
            attachment.detach();
            return Err(unexpected("prepareRename", &other));
        }
        Err(e) => {
            attachment.detach();
            ctx.print_error(&e.to_string());
            return Ok(());
        }
    };
    if let Some(reason) = &target.reject_reason {
        attachment.detach();
        ctx.print_error(reason);
        return Ok(());
    }

    let result = attachment
        .provide(CapabilityRequest::Rename {
            model: attachment.model.clone(),
            position: loc.position(),
            new_name: args.new_name.clone(),
        })
        .await;
    attachment.detach();

    match result {
        Ok(CapabilityResponse::Rename(edit)) => ctx.print_success_flat(RenameResponse {
            location: LocationOutput::new(ctx.relative_path(&loc.file), loc.position()),
            old_name: target.text,
            new_name: args.new_name,
            range: target.range,
            files_changed: files_changed(&edit),
            total_changes: edit.edits.len(),
            edits: edit.edits,
        }),
        Ok(other) => return Err(unexpected("rename", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}

fn files_changed(edit: &EditorWorkspaceEdit) -> usize {
    let mut resources: Vec<&str> = edit.edits.iter().map(|e| e.resource.as_str()).collect();
    resources.sort_unstable();
    resources.dedup();
    resources.len()
}
