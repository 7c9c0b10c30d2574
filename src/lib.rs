//! Embed free-text records, project them to 2D, and cluster the result.
//!
//! `textscape` turns a file of social-media comments into a plot-ready
//! `(row, x, y, cluster)` table in three persisted stages:
//!
//! 1. **Embed** — batch text-to-vector conversion through a local
//!    Ollama-compatible model service, persisted as a row-aligned NPY array.
//! 2. **Project** — exact t-SNE down to 2 dimensions, persisted as NPY or as
//!    an `x,y` tabular file.
//! 3. **Cluster** — k-means (or pre-annotated labels) joined with the
//!    projected coordinates; rendering is left to external tooling.
//!
//! Row index is the only identity a record carries, so every stage preserves
//! input order exactly and every join validates row counts.
//!
//! # Modules
//!
//! - [`config`] — Configuration loading from TOML files and environment variables
//! - [`source`] — Text record loading from CSV columns or line-delimited files
//! - [`embedding`] — The [`embedding::EmbeddingProvider`] boundary and its Ollama implementation
//! - [`pipeline`] — Chunked batch-embedding orchestration with checkpointing
//! - [`projection`] — t-SNE projection of persisted vector collections
//! - [`cluster`] — k-means, letter labeling, and the plot-ready join
//! - [`store`] — NPY/CSV persistence with atomic writes

pub mod cancel;
pub mod cluster;
pub mod config;
pub mod embedding;
pub mod error;
pub mod pipeline;
pub mod projection;
pub mod source;
pub mod store;
