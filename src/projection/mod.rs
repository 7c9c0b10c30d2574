//! 2D projection of persisted vector collections.
//!
//! Loads a vector collection, runs [`tsne`], and persists the coordinates
//! aligned by original row index — either as a binary NPY file or as a
//! tabular file with `x,y` headers for consumers that join by column name.

pub mod tsne;

use std::path::{Path, PathBuf};
use std::time::Instant;

use ndarray::Array2;

use crate::cancel::CancelFlag;
use crate::config::ProjectionConfig;
use crate::error::PipelineError;
use crate::store;

pub use tsne::TsneParams;

/// Output encoding for the projected coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Row-aligned binary array, positional joins only.
    Npy,
    /// Tabular `x,y` file, for named-column joins downstream.
    Csv,
}

/// Summary of a completed projection run.
#[derive(Debug)]
pub struct ProjectRun {
    pub rows: usize,
    pub output: PathBuf,
}

/// Merge config with CLI overrides into concrete t-SNE parameters.
///
/// Perplexity is required: the right value depends on row count, so there is
/// deliberately no built-in fallback.
pub fn resolve_params(
    config: &ProjectionConfig,
    perplexity_override: Option<f32>,
    seed_override: Option<u64>,
) -> Result<TsneParams, PipelineError> {
    let perplexity = perplexity_override.or(config.perplexity).ok_or_else(|| {
        PipelineError::InvalidConfig(
            "projection.perplexity is not set; pass --perplexity or set it in config \
             (it should scale with the number of rows)"
                .into(),
        )
    })?;

    Ok(TsneParams {
        perplexity,
        iterations: config.iterations,
        learning_rate: config.learning_rate,
        seed: seed_override.or(config.seed),
    })
}

/// Project an in-memory vector collection to n × 2 coordinates.
pub fn project_collection(
    vectors: &Array2<f32>,
    params: &TsneParams,
    cancel: &CancelFlag,
) -> Result<Array2<f32>, PipelineError> {
    tsne::run(vectors.view(), params, cancel)
}

/// Project a persisted vector collection and write `tsne_projected.npy` or
/// `tsne_projected.csv` next to it.
pub fn project_file(
    input: &Path,
    params: &TsneParams,
    format: OutputFormat,
    cancel: &CancelFlag,
) -> Result<ProjectRun, PipelineError> {
    let vectors = store::read_npy_file(input)?;
    let rows = vectors.nrows();
    tracing::info!(
        input = %input.display(),
        rows,
        dims = vectors.ncols(),
        perplexity = params.perplexity,
        "projecting vector collection"
    );

    let started = Instant::now();
    let projected = project_collection(&vectors, params, cancel)?;
    if projected.nrows() != rows {
        return Err(PipelineError::AlignmentViolation {
            context: "vectors/projection",
            left: rows,
            right: projected.nrows(),
        });
    }

    let dir = input.parent().unwrap_or_else(|| Path::new("."));
    let output = match format {
        OutputFormat::Npy => {
            let path = dir.join("tsne_projected.npy");
            store::write_npy_file(&path, &projected)?;
            path
        }
        OutputFormat::Csv => {
            let path = dir.join("tsne_projected.csv");
            store::write_xy_csv(&path, &projected)?;
            path
        }
    };

    tracing::info!(
        rows,
        elapsed_ms = started.elapsed().as_millis() as u64,
        output = %output.display(),
        "projection complete"
    );

    Ok(ProjectRun { rows, output })
}
