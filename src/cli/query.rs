//! CLI `query` command — embed one string for ad hoc lookups.

use std::sync::Arc;

use anyhow::{Context, Result};

use textscape::config::TextscapeConfig;
use textscape::embedding::{self, EmbeddingProvider};

pub async fn run(config: &TextscapeConfig, text: &str) -> Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );

    let text = text.to_string();
    let vector = tokio::task::spawn_blocking(move || provider.embed_query(&text))
        .await
        .context("query task panicked")??;

    println!("{}", serde_json::to_string(&vector)?);
    Ok(())
}
