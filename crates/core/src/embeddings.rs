use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;
pub const OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const OPENAI_EMBEDDING_DIMENSIONS: usize = 1_536;
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: OPENAI_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: OPENAI_EMBEDDING_MODEL.to_string(),
            dimensions: OPENAI_EMBEDDING_DIMENSIONS,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend("openai-embeddings", format!("{status}: {body}")));
        }

        let payload: EmbeddingResponse = response.json().await?;
        first_embedding(payload)
    }
}

fn first_embedding(payload: EmbeddingResponse) -> Result<Vec<f32>, SearchError> {
    payload
        .data
        .into_iter()
        .next()
        .map(|data| data.embedding)
        .ok_or_else(|| SearchError::backend("openai-embeddings", "response had no embedding"))
}

/// Network-free embedder hashing character trigrams into a fixed number of
/// buckets. Vectors are L2-normalised.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let chars: Vec<char> = text.to_lowercase().chars().collect();

        for window in chars.windows(3) {
            let mut hash = 1469598103934665603u64;
            for byte in window.iter().collect::<String>().bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        Ok(self.embed_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ngram_embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed("IFRS17 insurance contracts").await.unwrap();
        let second = embedder.embed("IFRS17 insurance contracts").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), DEFAULT_EMBEDDING_DIMENSIONS);
    }

    #[test]
    fn short_text_embeds_to_zero_vector() {
        let embedder = CharacterNgramEmbedder { dimensions: 16 };
        assert!(embedder.embed_sync("ab").iter().all(|value| *value == 0.0));
    }

    #[test]
    fn embedding_payload_takes_first_vector() {
        let payload: EmbeddingResponse = serde_json::from_str(
            r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.1,0.2]}]}"#,
        )
        .unwrap();
        assert_eq!(first_embedding(payload).unwrap(), vec![0.1, 0.2]);
    }

    #[test]
    fn empty_embedding_payload_is_an_error() {
        let payload = EmbeddingResponse { data: Vec::new() };
        assert!(matches!(
            first_embedding(payload),
            Err(SearchError::BackendResponse { .. })
        ));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let embedder = OpenAiEmbedder::new("key").with_base_url("http://localhost:9000/v1/");
        assert_eq!(embedder.base_url, "http://localhost:9000/v1");
        assert_eq!(embedder.dimensions(), OPENAI_EMBEDDING_DIMENSIONS);
    }
}
