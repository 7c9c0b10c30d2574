//! Pipeline error taxonomy.
//!
//! Every error here is fatal for the current run: no stage commits partial
//! output once one of these is raised. The orchestrator may retry
//! [`PipelineError::ProviderUnavailable`] with backoff before surfacing it;
//! everything else propagates immediately.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source file does not exist or could not be opened.
    #[error("source file not found: {}", .path.display())]
    SourceNotFound { path: PathBuf },

    /// Source file exists but lacks the expected structure (e.g. column).
    #[error("source schema error in {}: {reason}", .path.display())]
    SourceSchema { path: PathBuf, reason: String },

    /// Embedding service unreachable, timed out, or returned an HTTP error.
    #[error("embedding service unavailable at {endpoint}: {reason}")]
    ProviderUnavailable { endpoint: String, reason: String },

    /// Provider responded, but the payload was malformed, empty, miscounted,
    /// or had the wrong dimensionality.
    #[error("malformed embedding response{}: {reason}", batch_suffix(.batch))]
    EmbeddingDecode {
        /// Orchestrator chunk index, when the failure happened inside a
        /// chunked run.
        batch: Option<usize>,
        reason: String,
    },

    /// Too few rows for the configured perplexity.
    #[error("{rows} rows is not enough for perplexity {perplexity} (need at least {min_rows})")]
    InsufficientDataForProjection {
        rows: usize,
        perplexity: f32,
        min_rows: usize,
    },

    /// Two positionally-joined collections disagree on row count. Positional
    /// order is the only identity key in this system, so this always means
    /// corrupted or mismatched inputs.
    #[error("alignment violation joining {context}: {left} rows vs {right} rows")]
    AlignmentViolation {
        context: &'static str,
        left: usize,
        right: usize,
    },

    /// A persisted array file failed to parse.
    #[error("malformed array file {}: {reason}", .path.display())]
    MalformedArray { path: PathBuf, reason: String },

    /// Configuration value missing or out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Run was cancelled cooperatively (ctrl-c).
    #[error("run cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

fn batch_suffix(batch: &Option<usize>) -> String {
    match batch {
        Some(i) => format!(" (batch {i})"),
        None => String::new(),
    }
}

impl PipelineError {
    /// Attach an orchestrator chunk index to a decode error, leaving other
    /// variants untouched.
    pub fn with_batch(self, index: usize) -> Self {
        match self {
            Self::EmbeddingDecode { reason, .. } => Self::EmbeddingDecode {
                batch: Some(index),
                reason,
            },
            other => other,
        }
    }
}
