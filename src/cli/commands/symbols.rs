//! Symbols command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::unexpected;
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::location::canonical_file;
use crate::cli::response::SymbolsResponse;
use crate::models::editor::EditorDocumentSymbol;

#[derive(Args, Debug)]
pub struct SymbolsArgs {
    /// File to list symbols for
    pub file: PathBuf,

    /// Drop nested symbols, keep top-level ones only
    #[arg(long)]
    pub flat: bool,
}

pub async fn execute(args: SymbolsArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = canonical_file(&args.file)?;

    let attachment = app.attach(&file).await?;
    let result = attachment
        .provide(CapabilityRequest::DocumentSymbols {
            model: attachment.model.clone(),
        })
        .await;
    attachment.detach();

    match result {
        Ok(CapabilityResponse::DocumentSymbols(mut symbols)) => {
            if args.flat {
                symbols.iter_mut().for_each(|s| s.children.clear());
            }
            ctx.print_success_flat(SymbolsResponse {
                file: ctx.relative_path(&file),
                count: count_symbols(&symbols),
                symbols,
            });
        }
        Ok(other) => return Err(unexpected("documentSymbols", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}

fn count_symbols(symbols: &[EditorDocumentSymbol]) -> usize {
    symbols
        .iter()
        .map(|s| 1 + count_symbols(&s.children))
        .sum()
}
