//! Durable storage for vector collections and 2-D projections.
//!
//! All final outputs are written atomically (temp file in the same directory,
//! then rename), so a failed run never leaves a partial `.npy` or `.csv`
//! behind. The one intentional intermediate is the [`Checkpoint`] sidecar the
//! orchestrator appends completed chunks to; it uses its own framed format so
//! a resumed run can tell exactly how many whole rows survived.

pub mod npy;

use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use ndarray::Array2;

use crate::error::PipelineError;

/// Write `bytes` to `path` atomically: temp path in the same directory, then
/// rename on success.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PipelineError> {
    let tmp_path = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(bytes)?;
    file.flush()?;
    drop(file);
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Persist a vector collection (or projection) as an NPY file.
pub fn write_npy_file(path: &Path, array: &Array2<f32>) -> Result<(), PipelineError> {
    atomic_write(path, &npy::encode(array))?;
    tracing::info!(path = %path.display(), rows = array.nrows(), cols = array.ncols(), "array written");
    Ok(())
}

/// Load an NPY file back into a 2-D array.
pub fn read_npy_file(path: &Path) -> Result<Array2<f32>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let bytes = std::fs::read(path)?;
    npy::decode(&bytes).map_err(|reason| PipelineError::MalformedArray {
        path: path.to_path_buf(),
        reason,
    })
}

/// Write a projection as a labeled tabular file with `x,y` headers — the form
/// downstream consumers join on by column name.
pub fn write_xy_csv(path: &Path, points: &Array2<f32>) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["x", "y"])?;
    for row in points.rows() {
        writer.write_record([row[0].to_string(), row[1].to_string()])?;
    }
    let bytes = writer.into_inner().map_err(|e| PipelineError::Io(e.into_error()))?;
    atomic_write(path, &bytes)
}

/// Read an `x,y` tabular file back into an N×2 array.
pub fn read_xy_csv(path: &Path) -> Result<Array2<f32>, PipelineError> {
    if !path.exists() {
        return Err(PipelineError::SourceNotFound {
            path: path.to_path_buf(),
        });
    }
    let mut reader = csv::Reader::from_path(path)?;

    let headers = reader.headers()?.clone();
    let x = column_index(&headers, "x", path)?;
    let y = column_index(&headers, "y", path)?;

    let mut values = Vec::new();
    for result in reader.records() {
        let record = result?;
        for index in [x, y] {
            let field = record.get(index).unwrap_or("");
            let value: f32 = field.parse().map_err(|_| PipelineError::MalformedArray {
                path: path.to_path_buf(),
                reason: format!("non-numeric coordinate {field:?}"),
            })?;
            values.push(value);
        }
    }

    let rows = values.len() / 2;
    Array2::from_shape_vec((rows, 2), values).map_err(|e| PipelineError::MalformedArray {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn column_index(
    headers: &csv::StringRecord,
    name: &str,
    path: &Path,
) -> Result<usize, PipelineError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| PipelineError::SourceSchema {
            path: path.to_path_buf(),
            reason: format!("column `{name}` not found (headers: {headers:?})"),
        })
}

// Checkpoint framing: 8-byte magic, u32 LE dimension, then raw little-endian
// f32 rows. Rows are only ever appended whole.
const CHECKPOINT_MAGIC: &[u8; 8] = b"TSCHKPT1";
const CHECKPOINT_HEADER_LEN: u64 = 12;

/// Append-only sidecar holding completed embedding chunks, so a failure
/// partway through a long run does not discard finished work.
#[derive(Debug)]
pub struct Checkpoint {
    file: std::fs::File,
    path: PathBuf,
    dim: usize,
    rows: usize,
}

impl Checkpoint {
    /// Open the checkpoint at `path`. With `resume`, an existing file is
    /// validated and continued from; otherwise it is truncated and restarted.
    /// A trailing partial row (crash mid-write) is discarded.
    pub fn open(path: &Path, dim: usize, resume: bool) -> Result<Self, PipelineError> {
        if resume && path.exists() {
            let mut file = OpenOptions::new().read(true).write(true).open(path)?;

            let mut header = [0u8; CHECKPOINT_HEADER_LEN as usize];
            file.read_exact(&mut header).map_err(|_| malformed(path, "truncated header"))?;
            if &header[..8] != CHECKPOINT_MAGIC {
                return Err(malformed(path, "bad checkpoint magic"));
            }
            let stored_dim =
                u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
            if stored_dim != dim {
                return Err(malformed(
                    path,
                    &format!("checkpoint dimension {stored_dim} != configured {dim}"),
                ));
            }

            let row_bytes = (dim * 4) as u64;
            let data_len = file.metadata()?.len() - CHECKPOINT_HEADER_LEN;
            let rows = (data_len / row_bytes) as usize;
            file.set_len(CHECKPOINT_HEADER_LEN + rows as u64 * row_bytes)?;
            file.seek(SeekFrom::End(0))?;

            tracing::info!(path = %path.display(), rows, "resuming from checkpoint");
            Ok(Self {
                file,
                path: path.to_path_buf(),
                dim,
                rows,
            })
        } else {
            let mut file = std::fs::File::create(path)?;
            file.write_all(CHECKPOINT_MAGIC)?;
            file.write_all(&(dim as u32).to_le_bytes())?;
            Ok(Self {
                file,
                path: path.to_path_buf(),
                dim,
                rows: 0,
            })
        }
    }

    /// Rows already persisted.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Append a chunk of vectors, flushed before returning.
    pub fn append(&mut self, vectors: &[Vec<f32>]) -> Result<(), PipelineError> {
        let mut bytes = Vec::with_capacity(vectors.len() * self.dim * 4);
        for vector in vectors {
            if vector.len() != self.dim {
                return Err(malformed(
                    &self.path,
                    &format!("row of dimension {} in a {}-dim checkpoint", vector.len(), self.dim),
                ));
            }
            for &v in vector {
                bytes.extend_from_slice(&v.to_le_bytes());
            }
        }
        self.file.write_all(&bytes)?;
        self.file.flush()?;
        self.rows += vectors.len();
        Ok(())
    }

    /// Convert the completed checkpoint into the final NPY output and remove
    /// the sidecar. The final file only ever appears whole.
    pub fn finalize(self, output: &Path) -> Result<Array2<f32>, PipelineError> {
        let path = self.path.clone();
        let dim = self.dim;
        let rows = self.rows;
        drop(self.file);

        let bytes = std::fs::read(&path)?;
        let data = &bytes[CHECKPOINT_HEADER_LEN as usize..];
        let values: Vec<f32> = data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let array = Array2::from_shape_vec((rows, dim), values)
            .map_err(|e| malformed(&path, &e.to_string()))?;

        write_npy_file(output, &array)?;
        std::fs::remove_file(&path)?;
        Ok(array)
    }
}

fn malformed(path: &Path, reason: &str) -> PipelineError {
    PipelineError::MalformedArray {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn npy_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.npy");
        let a = array![[0.1f32, 0.2], [0.3, 0.4]];

        write_npy_file(&path, &a).unwrap();
        assert_eq!(read_npy_file(&path).unwrap(), a);
        // no temp residue
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn xy_csv_roundtrip_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("projected.csv");
        let points = array![[1.5f32, -2.0], [0.0, 3.25]];

        write_xy_csv(&path, &points).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("x,y\n"));
        assert_eq!(read_xy_csv(&path).unwrap(), points);
    }

    #[test]
    fn checkpoint_append_and_finalize() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("out.partial");
        let output = dir.path().join("out.npy");

        let mut ck = Checkpoint::open(&partial, 2, false).unwrap();
        ck.append(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
        ck.append(&[vec![5.0, 6.0]]).unwrap();
        assert_eq!(ck.rows(), 3);

        let array = ck.finalize(&output).unwrap();
        assert_eq!(array, array![[1.0f32, 2.0], [3.0, 4.0], [5.0, 6.0]]);
        assert!(!partial.exists());
        assert_eq!(read_npy_file(&output).unwrap(), array);
    }

    #[test]
    fn checkpoint_resume_counts_whole_rows() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("out.partial");

        let mut ck = Checkpoint::open(&partial, 3, false).unwrap();
        ck.append(&[vec![1.0, 2.0, 3.0]]).unwrap();
        drop(ck);

        // Simulate a crash mid-row: append half a row of garbage.
        let mut f = OpenOptions::new().append(true).open(&partial).unwrap();
        f.write_all(&[0xAA; 5]).unwrap();
        drop(f);

        let ck = Checkpoint::open(&partial, 3, true).unwrap();
        assert_eq!(ck.rows(), 1);
    }

    #[test]
    fn checkpoint_rejects_dimension_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let partial = dir.path().join("out.partial");

        let ck = Checkpoint::open(&partial, 4, false).unwrap();
        drop(ck);

        let err = Checkpoint::open(&partial, 8, true).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedArray { .. }), "{err}");
    }
}
