use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TextscapeConfig {
    /// Log level filter for stderr output (e.g. "info", "textscape=debug").
    pub log_level: String,
    pub embedding: EmbeddingConfig,
    pub projection: ProjectionConfig,
    pub clustering: ClusteringConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Provider kind. Currently only "ollama" is supported.
    pub provider: String,
    /// Model identifier passed through to the embedding service.
    pub model: String,
    /// Base URL of the embedding service.
    pub endpoint: String,
    /// Declared output dimension of the configured model. Responses that
    /// disagree are rejected.
    pub dimensions: usize,
    /// Rows per provider call. The orchestrator chunks large inputs to this
    /// size so a failure partway through a long run loses at most one chunk.
    pub batch_size: usize,
    /// Request timeout for a single provider call, in seconds.
    pub timeout_secs: u64,
    /// Bounded retries per chunk when the service is unavailable.
    pub max_retries: u32,
    /// Initial backoff between retries, doubled per attempt.
    pub retry_backoff_ms: u64,
    /// Opaque provider tuning knobs, forwarded unchanged in the request body.
    pub options: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProjectionConfig {
    /// t-SNE perplexity. Required: there is no sane universal default — the
    /// right value scales with row count, so it must come from config or the
    /// `--perplexity` flag.
    pub perplexity: Option<f32>,
    /// Gradient descent iterations.
    pub iterations: usize,
    /// Learning rate. `None` auto-tunes from data size.
    pub learning_rate: Option<f32>,
    /// RNG seed for the randomized init. `None` draws from entropy, which
    /// makes runs non-reproducible.
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Number of clusters (k).
    pub clusters: usize,
    pub max_iterations: usize,
    /// Convergence threshold on centroid movement.
    pub tolerance: f32,
    pub seed: Option<u64>,
}

impl Default for TextscapeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            embedding: EmbeddingConfig::default(),
            projection: ProjectionConfig::default(),
            clustering: ClusteringConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".into(),
            model: "all-minilm".into(),
            endpoint: "http://localhost:11434".into(),
            dimensions: 384,
            batch_size: 32,
            timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
            options: serde_json::Map::new(),
        }
    }
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            perplexity: None,
            iterations: 1000,
            learning_rate: None,
            seed: None,
        }
    }
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: 8,
            max_iterations: 300,
            tolerance: 1e-4,
            seed: None,
        }
    }
}

/// Returns `~/.textscape/`
pub fn default_textscape_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".textscape")
}

/// Returns the default config file path: `~/.textscape/config.toml`
pub fn default_config_path() -> PathBuf {
    default_textscape_dir().join("config.toml")
}

impl TextscapeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TextscapeConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (TEXTSCAPE_ENDPOINT,
    /// TEXTSCAPE_MODEL, TEXTSCAPE_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TEXTSCAPE_ENDPOINT") {
            self.embedding.endpoint = val;
        }
        if let Ok(val) = std::env::var("TEXTSCAPE_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("TEXTSCAPE_LOG_LEVEL") {
            self.log_level = val;
        }
    }
}
