use crate::{IndexStats, QueryMatch, SearchError, VectorRecord};
use async_trait::async_trait;

#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), SearchError>;

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, SearchError>;

    async fn describe_stats(&self) -> Result<IndexStats, SearchError>;

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError>;

    async fn delete_all(&self) -> Result<(), SearchError>;
}

/// One message of a completion prompt. `role` is `system`, `user` or `assistant`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PromptMessage {
    pub role: String,
    pub content: String,
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<Option<String>, SearchError>;
}
