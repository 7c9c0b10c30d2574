//! Text source loading.
//!
//! Two encodings: a tabular (CSV) file with a named text-bearing column, or a
//! plain-text file with one record per line. Output order exactly matches
//! source order — row index is the only identity every downstream stage joins
//! on, so the loader never reorders, skips, or deduplicates.

use std::io::BufRead;
use std::path::Path;

use crate::error::PipelineError;

/// Load an ordered sequence of text records from `path`.
///
/// `.csv` sources are read through the `column` header (optionally capped at
/// `limit` rows); any other extension is treated as one record per line, with
/// line terminators stripped.
pub fn load_records(
    path: &Path,
    column: &str,
    limit: Option<usize>,
) -> Result<Vec<String>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }

    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => load_csv_column(path, column, limit),
        _ => load_lines(path, limit),
    }
}

/// Extract one column from a CSV file, in row order.
fn load_csv_column(
    path: &Path,
    column: &str,
    limit: Option<usize>,
) -> Result<Vec<String>, PipelineError> {
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?;
    let index = headers.iter().position(|h| h == column).ok_or_else(|| {
        PipelineError::SourceSchema {
            path: path.to_path_buf(),
            reason: format!("column `{column}` not found (headers: {headers:?})"),
        }
    })?;

    let cap = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        if records.len() >= cap {
            break;
        }
        let record = result?;
        let field = record.get(index).ok_or_else(|| PipelineError::SourceSchema {
            path: path.to_path_buf(),
            reason: format!("row {row} has no field at column `{column}`"),
        })?;
        records.push(field.to_string());
    }

    Ok(records)
}

/// One record per line. Line terminators are stripped — a trailing `\n` or
/// `\r\n` is framing, not record content.
fn load_lines(path: &Path, limit: Option<usize>) -> Result<Vec<String>, PipelineError> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let cap = limit.unwrap_or(usize::MAX);
    let mut records = Vec::new();
    for line in reader.lines() {
        if records.len() >= cap {
            break;
        }
        records.push(line?);
    }

    Ok(records)
}
