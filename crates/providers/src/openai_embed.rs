//! OpenAI-compatible embedding service.
//!
//! Works with any endpoint exposing `POST {base_url}/embeddings` in the
//! OpenAI wire format: OpenAI, OpenRouter, Ollama, vLLM, Together AI.
//! Keyword extraction stays local; there is no hosted keyword endpoint in
//! that API family.

use std::time::Duration;

use async_trait::async_trait;
use contextweave_core::embedding::EmbeddingService;
use contextweave_core::error::EmbeddingError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Input longer than this is cut before being sent; embedding models
/// reject oversized inputs outright.
const MAX_INPUT_CHARS: usize = 8000;

/// An OpenAI-compatible embedding client.
pub struct OpenAiEmbedder {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    /// Create a new embedder for an OpenAI-compatible endpoint.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client,
        })
    }

    /// Create an OpenAI embedder (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Result<Self, EmbeddingError> {
        Self::new(
            "openai",
            "https://api.openai.com/v1",
            api_key,
            "text-embedding-3-small",
            Duration::from_secs(10),
        )
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>, EmbeddingError> {
        let input = clip(text.trim(), MAX_INPUT_CHARS);
        if input.is_empty() {
            return Ok(None);
        }

        let url = format!("{}/embeddings", self.base_url);
        debug!(service = %self.name, model = %self.model, chars = input.len(), "Requesting embedding");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbeddingRequest {
                model: &self.model,
                input,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(EmbeddingError::QuotaExhausted { retry_after_secs });
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Embedding service returned error");
            return Err(EmbeddingError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let parsed: EmbeddingResponse = response.json().await.map_err(|e| EmbeddingError::Api {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        Ok(parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on an ephemeral port and return its base URL.
    async fn serve_once(status_line: &'static str, headers: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n{headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}/v1")
    }

    fn embedder(base_url: &str) -> OpenAiEmbedder {
        OpenAiEmbedder::new("test", base_url, "sk-test", "embed-small", Duration::from_secs(5))
            .unwrap()
    }

    #[tokio::test]
    async fn parses_embedding_vector() {
        let url = serve_once(
            "200 OK",
            "",
            r#"{"data":[{"embedding":[0.25,-0.5,1.0],"index":0}],"model":"embed-small"}"#.into(),
        )
        .await;
        let vector = embedder(&url).embed("building a fitness brand").await.unwrap();
        assert_eq!(vector, Some(vec![0.25, -0.5, 1.0]));
    }

    #[tokio::test]
    async fn empty_data_is_none() {
        let url = serve_once("200 OK", "", r#"{"data":[]}"#.into()).await;
        let vector = embedder(&url).embed("hello").await.unwrap();
        assert!(vector.is_none());
    }

    #[tokio::test]
    async fn rate_limit_maps_to_quota_exhausted() {
        let url = serve_once(
            "429 Too Many Requests",
            "Retry-After: 42\r\n",
            r#"{"error":"quota"}"#.into(),
        )
        .await;
        let err = embedder(&url).embed("hello").await.unwrap_err();
        assert!(matches!(
            err,
            EmbeddingError::QuotaExhausted {
                retry_after_secs: 42
            }
        ));
    }

    #[tokio::test]
    async fn server_error_maps_to_api_error() {
        let url = serve_once("500 Internal Server Error", "", "boom".into()).await;
        let err = embedder(&url).embed("hello").await.unwrap_err();
        assert!(matches!(err, EmbeddingError::Api { status_code: 500, .. }));
    }

    #[tokio::test]
    async fn blank_input_skips_request() {
        // No server behind this address; a request would fail with a network error.
        let vector = embedder("http://127.0.0.1:9/v1").embed("   ").await.unwrap();
        assert!(vector.is_none());
    }

    #[tokio::test]
    async fn keywords_are_extracted_locally() {
        let keywords = embedder("http://127.0.0.1:9/v1")
            .extract_keywords("building a fitness brand")
            .await
            .unwrap();
        assert_eq!(keywords, vec!["building", "fitness", "brand"]);
    }

    #[test]
    fn clip_respects_char_boundaries() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("abc", 10), "abc");
    }
}
