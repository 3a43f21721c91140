use crate::embeddings::Embedder;
use crate::traits::VectorIndex;
use crate::{QueryMatch, SearchError, RETRIEVAL_TOP_K};
use std::sync::Arc;

pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<QueryMatch>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let vector = self.embedder.embed(query).await?;
        self.index.query(&vector, top_k).await
    }

    /// Text of the nearest chunks, joined by a blank line.
    pub async fn context_for(&self, query: &str) -> Result<String, SearchError> {
        self.context_with_top_k(query, RETRIEVAL_TOP_K).await
    }

    pub async fn context_with_top_k(&self, query: &str, top_k: usize) -> Result<String, SearchError> {
        let matches = self.search(query, top_k).await?;
        Ok(join_context(&matches))
    }
}

pub fn join_context(matches: &[QueryMatch]) -> String {
    matches
        .iter()
        .filter_map(QueryMatch::text)
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stores::InMemoryIndex;
    use crate::{CharacterNgramEmbedder, ChunkMetadata, VectorRecord};

    async fn seeded(texts: &[&str]) -> Retriever {
        let embedder = CharacterNgramEmbedder::default();
        let index = InMemoryIndex::new();
        let records: Vec<_> = texts
            .iter()
            .enumerate()
            .map(|(position, text)| VectorRecord {
                id: format!("doc.pdf-1-0-{position}"),
                values: embedder.embed_sync(text),
                metadata: ChunkMetadata {
                    text: text.to_string(),
                    source: "doc.pdf".to_string(),
                    page: 1,
                },
            })
            .collect();
        index.upsert(&records).await.unwrap();
        Retriever::new(Arc::new(embedder), Arc::new(index))
    }

    #[tokio::test]
    async fn context_holds_at_most_three_blocks() {
        let retriever = seeded(&[
            "IFRS17 contractual service margin",
            "IFRS17 risk adjustment",
            "IFRS17 building block approach",
            "IFRS17 premium allocation approach",
            "KICS solvency capital",
        ])
        .await;

        let context = retriever.context_for("IFRS17 margin").await.unwrap();
        let blocks: Vec<_> = context.split(CONTEXT_SEPARATOR).collect();
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0], "IFRS17 contractual service margin");
    }

    #[tokio::test]
    async fn small_index_returns_fewer_blocks() {
        let retriever = seeded(&["only chunk"]).await;
        let context = retriever.context_for("chunk").await.unwrap();
        assert_eq!(context, "only chunk");
    }

    #[tokio::test]
    async fn blank_query_is_rejected() {
        let retriever = seeded(&[]).await;
        assert!(matches!(
            retriever.context_for("   ").await,
            Err(SearchError::Request(_))
        ));
    }

    #[test]
    fn matches_without_text_are_skipped() {
        let matches = vec![
            QueryMatch {
                id: "a".to_string(),
                score: 0.9,
                metadata: None,
            },
            QueryMatch {
                id: "b".to_string(),
                score: 0.8,
                metadata: Some(ChunkMetadata {
                    text: "kept".to_string(),
                    source: "b.pdf".to_string(),
                    page: 4,
                }),
            },
        ];
        assert_eq!(join_context(&matches), "kept");
    }
}
