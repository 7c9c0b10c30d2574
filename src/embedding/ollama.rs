//! Ollama HTTP embedding provider.
//!
//! Talks to an Ollama-compatible server's `/api/embed` endpoint. The request
//! carries the configured model identifier and an opaque options map that is
//! forwarded unchanged — the adapter does not interpret tuning knobs like
//! `mirostat`, it only transports them.
//!
//! The adapter never retries: a failed call surfaces as
//! [`PipelineError::ProviderUnavailable`] and retry policy stays with the
//! orchestrator.

use serde::{Deserialize, Serialize};

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::PipelineError;

pub struct OllamaProvider {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    options: serde_json::Map<String, serde_json::Value>,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    options: &'a serde_json::Map<String, serde_json::Value>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, PipelineError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| PipelineError::ProviderUnavailable {
                endpoint: config.endpoint.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        tracing::info!(
            endpoint = %config.endpoint,
            model = %config.model,
            "embedding provider configured"
        );

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            options: config.options.clone(),
            dimensions: config.dimensions,
        })
    }

    fn unavailable(&self, reason: String) -> PipelineError {
        PipelineError::ProviderUnavailable {
            endpoint: self.endpoint.clone(),
            reason,
        }
    }
}

impl EmbeddingProvider for OllamaProvider {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, PipelineError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
            options: &self.options,
        };

        let response = self
            .client
            .post(format!("{}/api/embed", self.endpoint))
            .json(&request)
            .send()
            .map_err(|e| self.unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(self.unavailable(format!("HTTP {status}: {body}")));
        }

        let body = response
            .text()
            .map_err(|e| self.unavailable(format!("error reading response: {e}")))?;

        parse_embed_response(&body, texts.len(), self.dimensions)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Validate and decode a `/api/embed` response body.
///
/// The output must contain exactly one vector per input string, each of the
/// declared dimension — anything else means the model or request was wrong,
/// and joining such output downstream would silently corrupt row alignment.
fn parse_embed_response(
    body: &str,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, PipelineError> {
    let decoded: EmbedResponse =
        serde_json::from_str(body).map_err(|e| PipelineError::EmbeddingDecode {
            batch: None,
            reason: format!("unparseable response: {e}"),
        })?;

    if decoded.embeddings.len() != expected {
        return Err(PipelineError::EmbeddingDecode {
            batch: None,
            reason: format!(
                "expected {expected} vectors, got {}",
                decoded.embeddings.len()
            ),
        });
    }

    for (i, vector) in decoded.embeddings.iter().enumerate() {
        if vector.len() != dimensions {
            return Err(PipelineError::EmbeddingDecode {
                batch: None,
                reason: format!(
                    "vector {i} has dimension {}, expected {dimensions}",
                    vector.len()
                ),
            });
        }
    }

    Ok(decoded.embeddings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_shape() {
        let mut options = serde_json::Map::new();
        options.insert("mirostat".into(), serde_json::json!(0));
        let request = EmbedRequest {
            model: "all-minilm",
            input: &["hello", "world"],
            options: &options,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "all-minilm",
                "input": ["hello", "world"],
                "options": {"mirostat": 0},
            })
        );
    }

    #[test]
    fn empty_options_are_omitted() {
        let options = serde_json::Map::new();
        let request = EmbedRequest {
            model: "all-minilm",
            input: &["hi"],
            options: &options,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("options").is_none());
    }

    #[test]
    fn parse_valid_response() {
        let body = r#"{"model":"all-minilm","embeddings":[[0.1,0.2],[0.3,0.4]]}"#;
        let vectors = parse_embed_response(body, 2, 2).unwrap();
        assert_eq!(vectors, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
    }

    #[test]
    fn count_mismatch_is_decode_error() {
        let body = r#"{"embeddings":[[0.1,0.2]]}"#;
        let err = parse_embed_response(body, 2, 2).unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingDecode { .. }), "{err}");
    }

    #[test]
    fn dimension_mismatch_is_decode_error() {
        let body = r#"{"embeddings":[[0.1,0.2,0.3]]}"#;
        let err = parse_embed_response(body, 1, 2).unwrap_err();
        assert!(err.to_string().contains("dimension 3"), "{err}");
    }

    #[test]
    fn garbage_body_is_decode_error() {
        let err = parse_embed_response("service melted", 1, 2).unwrap_err();
        assert!(matches!(err, PipelineError::EmbeddingDecode { .. }), "{err}");
    }
}
