//! In-memory [`VectorIndex`] for offline runs and tests.
//!
//! Brute-force cosine similarity over every stored record. Upserting an
//! existing id overwrites it, matching the remote index semantics.

use crate::traits::VectorIndex;
use crate::{IndexStats, QueryMatch, SearchError, VectorRecord};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemoryIndex {
    records: RwLock<BTreeMap<String, VectorRecord>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn cosine_sim(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if mag_a < f32::EPSILON || mag_b < f32::EPSILON {
        0.0
    } else {
        f64::from(dot / (mag_a * mag_b))
    }
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), SearchError> {
        let mut stored = self.records.write().await;
        for record in records {
            stored.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, SearchError> {
        let stored = self.records.read().await;
        let mut scored: Vec<QueryMatch> = stored
            .values()
            .map(|record| QueryMatch {
                id: record.id.clone(),
                score: cosine_sim(vector, &record.values),
                metadata: Some(record.metadata.clone()),
            })
            .collect();

        scored.sort_by(|left, right| right.score.total_cmp(&left.score));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn describe_stats(&self) -> Result<IndexStats, SearchError> {
        let stored = self.records.read().await;
        let total = stored.len() as u64;
        let mut namespaces = BTreeMap::new();
        if total > 0 {
            namespaces.insert(String::new(), total);
        }

        Ok(IndexStats {
            dimension: stored
                .values()
                .next()
                .map(|record| record.values.len())
                .unwrap_or(0),
            total_vector_count: total,
            namespaces,
        })
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
        let mut stored = self.records.write().await;
        for id in ids {
            stored.remove(id);
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SearchError> {
        self.records.write().await.clear();
        Ok(())
    }
}
