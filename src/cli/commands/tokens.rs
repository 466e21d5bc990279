//! Semantic tokens command implementation

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use super::unexpected;
use crate::app::App;
use crate::bridge::{CapabilityRequest, CapabilityResponse};
use crate::cli::location::canonical_file;
use crate::cli::response::TokensResponse;

#[derive(Args, Debug)]
pub struct TokensArgs {
    /// File to tokenize
    pub file: PathBuf,
}

pub async fn execute(args: TokensArgs, app: &App) -> Result<()> {
    let ctx = &app.output;
    let file = canonical_file(&args.file)?;

    let attachment = app.attach(&file).await?;
    let legend = attachment.session.bridge().legend().cloned();
    let result = attachment
        .provide(CapabilityRequest::SemanticTokens {
            model: attachment.model.clone(),
        })
        .await;
    attachment.detach();

    match result {
        Ok(CapabilityResponse::SemanticTokens(tokens)) => {
            let (token_types, token_modifiers) = legend
                .map(|l| (l.token_types, l.token_modifiers))
                .unwrap_or_default();
            ctx.print_success_flat(TokensResponse {
                file: ctx.relative_path(&file),
                token_types,
                token_modifiers,
                result_id: tokens.result_id,
                count: tokens.data.len() / 5,
                data: tokens.data,
            });
        }
        Ok(other) => return Err(unexpected("semanticTokens", &other)),
        Err(e) => ctx.print_error(&e.to_string()),
    }

    Ok(())
}
