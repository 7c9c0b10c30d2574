//! Cluster labeling and the plot-ready join.
//!
//! The core's obligation ends at a correctly joined, order-aligned
//! `(row, x, y, cluster)` table; rendering is an external concern. Cluster
//! ordinals come either from an annotated tabular file or from [`kmeans`]
//! over the projected points.

pub mod kmeans;

use std::path::Path;

use ndarray::Array2;

use crate::error::PipelineError;
use crate::store;

/// Spreadsheet-style letter label for a cluster ordinal: `0→A, 25→Z, 26→AA`.
/// Total and injective — no two ordinals ever share a label.
pub fn cluster_label(ordinal: usize) -> String {
    let mut n = ordinal;
    let mut letters = Vec::new();
    loop {
        letters.push(b'A' + (n % 26) as u8);
        n /= 26;
        if n == 0 {
            break;
        }
        n -= 1;
    }
    letters.reverse();
    String::from_utf8(letters).expect("ASCII letters")
}

/// One row of the joined output table.
#[derive(Debug, Clone)]
pub struct LabeledPoint {
    /// Original row index — the positional identity every stage joined on,
    /// made explicit so downstream consumers can detect reordering.
    pub row: usize,
    pub x: f32,
    pub y: f32,
    pub cluster: String,
}

/// Join projected coordinates with per-row cluster ordinals.
///
/// Row `i` of `points` and `ordinals[i]` must describe the same record; a
/// length mismatch means that assumption is already broken.
pub fn join_clusters(
    points: &Array2<f32>,
    ordinals: &[usize],
) -> Result<Vec<LabeledPoint>, PipelineError> {
    if points.ncols() != 2 {
        return Err(PipelineError::InvalidConfig(format!(
            "expected 2-D coordinates, got {} columns",
            points.ncols()
        )));
    }
    if points.nrows() != ordinals.len() {
        return Err(PipelineError::AlignmentViolation {
            context: "projection/labels",
            left: points.nrows(),
            right: ordinals.len(),
        });
    }

    Ok(ordinals
        .iter()
        .enumerate()
        .map(|(row, &ordinal)| LabeledPoint {
            row,
            x: points[[row, 0]],
            y: points[[row, 1]],
            cluster: cluster_label(ordinal),
        })
        .collect())
}

/// Read per-row cluster ordinals from an annotated tabular file's `cluster`
/// column.
pub fn read_cluster_ordinals(path: &Path) -> Result<Vec<usize>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?;
    let index = headers
        .iter()
        .position(|h| h == "cluster")
        .ok_or_else(|| PipelineError::SourceSchema {
            path: path.to_path_buf(),
            reason: format!("column `cluster` not found (headers: {headers:?})"),
        })?;

    let mut ordinals = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = record.get(index).unwrap_or("");
        let ordinal: usize = field.parse().map_err(|_| PipelineError::SourceSchema {
            path: path.to_path_buf(),
            reason: format!("row {row}: non-integer cluster value {field:?}"),
        })?;
        ordinals.push(ordinal);
    }
    Ok(ordinals)
}

/// Write the joined table as `row,x,y,cluster`.
pub fn write_joined_csv(path: &Path, points: &[LabeledPoint]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["row", "x", "y", "cluster"])?;
    for point in points {
        writer.write_record([
            point.row.to_string(),
            point.x.to_string(),
            point.y.to_string(),
            point.cluster.clone(),
        ])?;
    }
    let bytes = writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))?;
    store::atomic_write(path, &bytes)
}
