//! Format command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::unexpected;
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::location::canonical_file;
use crate::cli::response::FormatResponse;
use crate::models::lsp::FormattingOptions;

#[derive(Args, Debug)]
pub struct FormatArgs {
    /// File to format
    pub file: PathBuf,

    /// Size of a tab in spaces
    #[arg(long, default_value_t = 4)]
    pub tab_size: u32,

    /// Prefer spaces over tabs
    #[arg(long)]
    pub spaces: bool,
}

pub async fn execute(args: FormatArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = canonical_file(&args.file)?;
    let options = FormattingOptions {
        tab_size: args.tab_size,
        insert_spaces: args.spaces,
    };

    let attachment = app.attach(&file).await?;
    let result = attachment
        .provide(CapabilityRequest::Formatting {
            model: attachment.model.clone(),
            options,
        })
        .await;
    attachment.detach();

    match result {
        Ok(CapabilityResponse::Formatting(edits)) => ctx.print_success_flat(FormatResponse {
            file: ctx.relative_path(&file),
            tab_size: options.tab_size,
            insert_spaces: options.insert_spaces,
            count: edits.len(),
            edits,
        }),
        Ok(other) => return Err(unexpected("formatting", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}
