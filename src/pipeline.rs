//! Batch embedding orchestrator.
//!
//! Drives the provider adapter over a full text source in bounded chunks,
//! appending each completed chunk to a checkpoint sidecar, and converts the
//! checkpoint into the final NPY output only when every record has embedded.
//! A failed or cancelled run keeps the checkpoint, so a `--resume` re-run
//! skips the rows already paid for; the final output file itself is
//! all-or-nothing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use crate::cancel::CancelFlag;
use crate::config::EmbeddingConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::PipelineError;
use crate::source;
use crate::store;

/// Summary of a completed embedding run.
#[derive(Debug)]
pub struct EmbedRun {
    pub rows: usize,
    pub dimensions: usize,
    pub output: PathBuf,
}

/// Derive the output path from the source location: a CSV source persists to
/// `train_embeddings.npy`, a plain-text source to `embedded_data.npy`, both
/// in the source's directory.
pub fn derived_output_path(source_path: &Path) -> PathBuf {
    let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
    let name = match source_path.extension().and_then(|e| e.to_str()) {
        Some("csv") => "train_embeddings.npy",
        _ => "embedded_data.npy",
    };
    dir.join(name)
}

fn checkpoint_path(output: &Path) -> PathBuf {
    output.with_extension("partial")
}

/// Embed a text source file end to end: load records, embed in chunks,
/// persist next to the source.
pub async fn embed_source(
    config: &EmbeddingConfig,
    provider: Arc<dyn EmbeddingProvider>,
    source_path: &Path,
    column: &str,
    limit: Option<usize>,
    resume: bool,
    cancel: CancelFlag,
) -> Result<EmbedRun> {
    let records = source::load_records(source_path, column, limit)?;
    tracing::info!(
        source = %source_path.display(),
        rows = records.len(),
        "loaded text records"
    );
    let output = derived_output_path(source_path);
    embed_records(config, provider, &records, &output, resume, cancel).await
}

/// Embed an in-memory record sequence and persist the vector collection to
/// `output`. Row `i` of the output corresponds to `records[i]`.
pub async fn embed_records(
    config: &EmbeddingConfig,
    provider: Arc<dyn EmbeddingProvider>,
    records: &[String],
    output: &Path,
    resume: bool,
    cancel: CancelFlag,
) -> Result<EmbedRun> {
    let started = Instant::now();
    let total = records.len();
    let dimensions = provider.dimensions();

    let mut checkpoint = store::Checkpoint::open(&checkpoint_path(output), dimensions, resume)?;
    let done = checkpoint.rows();
    if done > total {
        // More checkpointed rows than source records: the source shrank or
        // changed between runs, and positional identity is already lost.
        return Err(PipelineError::AlignmentViolation {
            context: "checkpoint/records",
            left: done,
            right: total,
        }
        .into());
    }

    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {bar:40.cyan/blue} {pos}/{len} ({eta})")
            .expect("valid template")
            .progress_chars("##-"),
    );
    pb.inc(done as u64);

    let batch_size = config.batch_size.max(1);
    for (index, chunk) in records[done..].chunks(batch_size).enumerate() {
        if cancel.is_cancelled() {
            pb.finish_and_clear();
            // Keep the checkpoint: a cancelled run resumes where it stopped.
            return Err(PipelineError::Cancelled.into());
        }

        let texts: Vec<String> = chunk.to_vec();
        let provider = Arc::clone(&provider);
        let max_retries = config.max_retries;
        let backoff_ms = config.retry_backoff_ms;

        let vectors = tokio::task::spawn_blocking(move || {
            embed_chunk_with_retry(provider.as_ref(), &texts, max_retries, backoff_ms)
        })
        .await
        .context("embedding task panicked")?
        .map_err(|e| e.with_batch(index))?;

        checkpoint.append(&vectors)?;
        pb.inc(chunk.len() as u64);
    }

    pb.finish_and_clear();

    let array = checkpoint.finalize(output)?;
    if array.nrows() != total {
        return Err(PipelineError::AlignmentViolation {
            context: "records/vectors",
            left: total,
            right: array.nrows(),
        }
        .into());
    }

    tracing::info!(
        rows = total,
        dimensions,
        elapsed_ms = started.elapsed().as_millis() as u64,
        output = %output.display(),
        "embedding run complete"
    );

    Ok(EmbedRun {
        rows: total,
        dimensions,
        output: output.to_path_buf(),
    })
}

/// One chunk through the provider, with bounded exponential backoff. Only
/// `ProviderUnavailable` is worth retrying — a decode error means the model
/// or request is wrong and will not heal on its own.
fn embed_chunk_with_retry(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    max_retries: u32,
    backoff_ms: u64,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    let mut attempt = 0u32;
    loop {
        match provider.embed_batch(&refs) {
            Ok(vectors) => return Ok(vectors),
            Err(err @ PipelineError::ProviderUnavailable { .. }) if attempt < max_retries => {
                let wait = backoff_ms.saturating_mul(2u64.saturating_pow(attempt));
                tracing::warn!(attempt, wait_ms = wait, error = %err, "provider unavailable, retrying");
                std::thread::sleep(Duration::from_millis(wait));
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
