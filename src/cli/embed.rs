//! CLI `embed` command — batch-embed a text source file.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use textscape::cancel::CancelFlag;
use textscape::config::TextscapeConfig;
use textscape::embedding::{self, EmbeddingProvider};
use textscape::pipeline;

pub async fn run(
    config: &TextscapeConfig,
    source: &Path,
    column: &str,
    limit: Option<usize>,
    resume: bool,
    cancel: CancelFlag,
) -> Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );

    let run = pipeline::embed_source(
        &config.embedding,
        provider,
        source,
        column,
        limit,
        resume,
        cancel,
    )
    .await?;

    println!(
        "Embedded {} records ({} dimensions) to {}",
        run.rows,
        run.dimensions,
        run.output.display()
    );
    Ok(())
}
