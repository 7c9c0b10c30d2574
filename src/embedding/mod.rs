//! Text-to-vector embedding boundary.
//!
//! Provides the [`EmbeddingProvider`] trait and the Ollama-backed HTTP
//! implementation. A provider is created once via [`create_provider`] from
//! configuration and passed explicitly to every stage that embeds text.

pub mod ollama;

use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

/// Trait for embedding text into vectors.
///
/// Implementations return one vector per input string, in input order, all of
/// [`EmbeddingProvider::dimensions`] length. All methods are synchronous
/// blocking I/O — callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed an ordered batch of strings. Empty input yields empty output.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError>;

    /// Embed a single ad hoc query string.
    ///
    /// Defined in terms of [`EmbeddingProvider::embed_batch`], so batch and
    /// single-query results agree for any implementation that does not
    /// override this.
    fn embed_query(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let mut results = self.embed_batch(&[text])?;
        if results.len() != 1 {
            return Err(PipelineError::EmbeddingDecode {
                batch: None,
                reason: format!("expected 1 vector for a query, got {}", results.len()),
            });
        }
        Ok(results.remove(0))
    }

    /// Declared output dimension of the configured model.
    fn dimensions(&self) -> usize;
}

/// Create an embedding provider from config.
///
/// Currently only `"ollama"` is supported. The provider holds its own HTTP
/// client and connection settings; construct it once and share it.
pub fn create_provider(
    config: &EmbeddingConfig,
) -> Result<Box<dyn EmbeddingProvider>, PipelineError> {
    match config.provider.as_str() {
        "ollama" => {
            let provider = ollama::OllamaProvider::new(config)?;
            Ok(Box::new(provider))
        }
        other => Err(PipelineError::InvalidConfig(format!(
            "unknown embedding provider: {other}. Supported: ollama"
        ))),
    }
}
