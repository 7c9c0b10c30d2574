//! CLI `project` command — t-SNE projection of a persisted vector collection.

use std::path::Path;

use anyhow::{Context, Result};

use textscape::cancel::CancelFlag;
use textscape::config::TextscapeConfig;
use textscape::projection::{self, OutputFormat};

pub async fn run(
    config: &TextscapeConfig,
    input: &Path,
    perplexity: Option<f32>,
    seed: Option<u64>,
    format: OutputFormat,
    cancel: CancelFlag,
) -> Result<()> {
    let params = projection::resolve_params(&config.projection, perplexity, seed)?;

    // The optimization loop is CPU-bound; keep it off the async runtime.
    let input = input.to_path_buf();
    let run = tokio::task::spawn_blocking(move || {
        projection::project_file(&input, &params, format, &cancel)
    })
    .await
    .context("projection task panicked")??;

    println!("Projected {} rows to {}", run.rows, run.output.display());
    Ok(())
}
