//! Operator tasks over the vector index: overview, duplicate cleanup, purge.
//!
//! Record listings come from a single probe query, so they cover at most
//! [`PROBE_TOP_K`] records.

use crate::traits::VectorIndex;
use crate::{IndexStats, QueryMatch, SearchError};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

pub const PROBE_TOP_K: usize = 10_000;
const TOP_PAGES: usize = 10;

#[derive(Debug, Clone)]
pub struct IndexOverview {
    pub stats: IndexStats,
    pub per_source: BTreeMap<String, usize>,
    pub top_pages: Vec<PageCount>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCount {
    pub source: String,
    pub page: u32,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateGroup {
    pub source: String,
    pub page: u32,
    pub ids: Vec<String>,
}

impl DuplicateGroup {
    pub fn redundant_ids(&self) -> &[String] {
        self.ids.get(1..).unwrap_or_default()
    }
}

async fn probe(index: &dyn VectorIndex, dimension: usize) -> Result<Vec<QueryMatch>, SearchError> {
    if dimension == 0 {
        return Ok(Vec::new());
    }
    // Unit vector: cosine indexes reject an all-zero query.
    let mut vector = vec![0f32; dimension];
    vector[0] = 1.0;
    index.query(&vector, PROBE_TOP_K).await
}

pub async fn overview(index: &dyn VectorIndex) -> Result<IndexOverview, SearchError> {
    let stats = index.describe_stats().await?;
    let matches = probe(index, stats.dimension).await?;

    let mut per_source = BTreeMap::<String, usize>::new();
    let mut per_page = BTreeMap::<(String, u32), usize>::new();
    for metadata in matches.iter().filter_map(|hit| hit.metadata.as_ref()) {
        *per_source.entry(metadata.source.clone()).or_default() += 1;
        *per_page
            .entry((metadata.source.clone(), metadata.page))
            .or_default() += 1;
    }

    let mut top_pages: Vec<PageCount> = per_page
        .into_iter()
        .map(|((source, page), records)| PageCount {
            source,
            page,
            records,
        })
        .collect();
    top_pages.sort_by(|left, right| right.records.cmp(&left.records));
    top_pages.truncate(TOP_PAGES);

    Ok(IndexOverview {
        stats,
        per_source,
        top_pages,
    })
}

/// Groups records sharing source, page and text. Groups keep probe order.
pub async fn find_duplicates(index: &dyn VectorIndex) -> Result<Vec<DuplicateGroup>, SearchError> {
    let stats = index.describe_stats().await?;
    let matches = probe(index, stats.dimension).await?;

    let mut order = Vec::new();
    let mut groups = HashMap::<(String, u32, String), Vec<String>>::new();
    for hit in &matches {
        let Some(metadata) = hit.metadata.as_ref() else {
            continue;
        };
        let key = (
            metadata.source.clone(),
            metadata.page,
            content_hash(&metadata.text),
        );
        let ids = groups.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Vec::new()
        });
        ids.push(hit.id.clone());
    }

    Ok(order
        .into_iter()
        .filter_map(|key| {
            let ids = groups.remove(&key)?;
            (ids.len() > 1).then(|| DuplicateGroup {
                source: key.0,
                page: key.1,
                ids,
            })
        })
        .collect())
}

/// Deletes every record of each group except the first. Returns the number removed.
pub async fn remove_duplicates(
    index: &dyn VectorIndex,
    groups: &[DuplicateGroup],
) -> Result<usize, SearchError> {
    let mut removed = 0;
    for group in groups {
        let redundant = group.redundant_ids();
        if redundant.is_empty() {
            continue;
        }
        index.delete(redundant).await?;
        removed += redundant.len();
        info!(source = %group.source, page = group.page, removed = redundant.len(), "removed duplicates");
    }
    Ok(removed)
}

/// Deletes every record. Returns the record count seen before deletion.
pub async fn purge(index: &dyn VectorIndex) -> Result<u64, SearchError> {
    let before = index.describe_stats().await?.total_vector_count;
    index.delete_all().await?;
    info!(records = before, "index purged");
    Ok(before)
}

fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
