#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use textscape::embedding::EmbeddingProvider;
use textscape::error::PipelineError;

/// Deterministic mock provider. Each text embeds to a vector derived from its
/// bytes, so the same text always yields the same vector regardless of which
/// batch it appears in. Canned vectors can be pinned per text.
pub struct MockProvider {
    dimensions: usize,
    canned: HashMap<String, Vec<f32>>,
    /// Size of every batch received, in call order.
    pub batch_sizes: Mutex<Vec<usize>>,
}

impl MockProvider {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            canned: HashMap::new(),
            batch_sizes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_canned(dimensions: usize, pairs: &[(&str, Vec<f32>)]) -> Self {
        let mut provider = Self::new(dimensions);
        for (text, vector) in pairs {
            provider.canned.insert(text.to_string(), vector.clone());
        }
        provider
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(vector) = self.canned.get(text) {
            return vector.clone();
        }
        let hash = fnv(text);
        (0..self.dimensions)
            .map(|d| ((hash ^ d as u64) % 997) as f32 / 997.0)
            .collect()
    }
}

impl EmbeddingProvider for MockProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        self.batch_sizes.lock().unwrap().push(texts.len());
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

fn fnv(text: &str) -> u64 {
    text.bytes()
        .fold(1469598103934665603u64, |h, b| (h ^ b as u64).wrapping_mul(1099511628211))
}

/// Fails with `ProviderUnavailable` for the first `failures` calls, then
/// behaves like [`MockProvider`]. Exercises the orchestrator's retry loop.
pub struct FlakyProvider {
    pub inner: MockProvider,
    remaining_failures: AtomicUsize,
}

impl FlakyProvider {
    pub fn new(dimensions: usize, failures: usize) -> Self {
        Self {
            inner: MockProvider::new(dimensions),
            remaining_failures: AtomicUsize::new(failures),
        }
    }
}

impl EmbeddingProvider for FlakyProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        let left = self.remaining_failures.load(Ordering::SeqCst);
        if left > 0 {
            self.remaining_failures.store(left - 1, Ordering::SeqCst);
            return Err(PipelineError::ProviderUnavailable {
                endpoint: "mock".into(),
                reason: "simulated outage".into(),
            });
        }
        self.inner.embed_batch(texts)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Embeds `good_batches` batches successfully, then fails every call.
/// Exercises checkpointing of partially completed runs.
pub struct FailAfterProvider {
    pub inner: MockProvider,
    good_batches: usize,
    calls: AtomicUsize,
}

impl FailAfterProvider {
    pub fn new(dimensions: usize, good_batches: usize) -> Self {
        Self {
            inner: MockProvider::new(dimensions),
            good_batches,
            calls: AtomicUsize::new(0),
        }
    }
}

impl EmbeddingProvider for FailAfterProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) >= self.good_batches {
            return Err(PipelineError::ProviderUnavailable {
                endpoint: "mock".into(),
                reason: "service went down mid-run".into(),
            });
        }
        self.inner.embed_batch(texts)
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
