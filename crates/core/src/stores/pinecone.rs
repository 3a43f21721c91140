use crate::traits::VectorIndex;
use crate::{ChunkMetadata, IndexStats, QueryMatch, SearchError, VectorRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

pub const PINECONE_CONTROL_PLANE: &str = "https://api.pinecone.io";
const API_VERSION: &str = "2024-07";
const BACKEND: &str = "pinecone";

/// REST client for one Pinecone index (data plane).
pub struct PineconeStore {
    client: Client,
    host: Url,
    api_key: String,
    namespace: String,
}

impl PineconeStore {
    pub fn new(host: &str, api_key: impl Into<String>) -> Result<Self, SearchError> {
        let host = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("https://{host}")
        };

        Ok(Self {
            client: Client::new(),
            host: Url::parse(&host)?,
            api_key: api_key.into(),
            namespace: String::new(),
        })
    }

    /// Looks up the data-plane host of `index_name` through the control plane.
    pub async fn connect(api_key: &str, index_name: &str) -> Result<Self, SearchError> {
        let url = Url::parse(PINECONE_CONTROL_PLANE)?.join(&format!("indexes/{index_name}"))?;
        let response = Client::new()
            .get(url)
            .header("Api-Key", api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend(
                BACKEND,
                format!("describe index {index_name} returned {status}: {body}"),
            ));
        }

        let description: Value = response.json().await?;
        let host = description
            .pointer("/host")
            .and_then(Value::as_str)
            .ok_or_else(|| SearchError::backend(BACKEND, "index description has no host"))?;

        debug!(index = index_name, host, "resolved pinecone index host");
        Self::new(host, api_key)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    async fn post(&self, path: &str, body: Value) -> Result<Value, SearchError> {
        let response = self
            .client
            .post(self.host.join(path)?)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::backend(BACKEND, format!("{path} returned {status}: {body}")));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl VectorIndex for PineconeStore {
    async fn upsert(&self, records: &[VectorRecord]) -> Result<(), SearchError> {
        if records.is_empty() {
            return Ok(());
        }

        let response = self
            .post("vectors/upsert", upsert_body(records, &self.namespace))
            .await?;
        let upserted = response
            .pointer("/upsertedCount")
            .and_then(Value::as_u64)
            .unwrap_or(records.len() as u64);
        debug!(upserted, "pinecone upsert");
        Ok(())
    }

    async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, SearchError> {
        let response = self
            .post(
                "query",
                json!({
                    "vector": vector,
                    "topK": top_k,
                    "includeMetadata": true,
                    "namespace": self.namespace,
                }),
            )
            .await?;
        Ok(parse_matches(&response))
    }

    async fn describe_stats(&self) -> Result<IndexStats, SearchError> {
        let response = self.post("describe_index_stats", json!({})).await?;
        Ok(parse_stats(&response))
    }

    async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
        if ids.is_empty() {
            return Ok(());
        }
        self.post(
            "vectors/delete",
            json!({ "ids": ids, "namespace": self.namespace }),
        )
        .await?;
        Ok(())
    }

    async fn delete_all(&self) -> Result<(), SearchError> {
        self.post(
            "vectors/delete",
            json!({ "deleteAll": true, "namespace": self.namespace }),
        )
        .await?;
        Ok(())
    }
}

fn upsert_body(records: &[VectorRecord], namespace: &str) -> Value {
    let vectors = records
        .iter()
        .map(|record| {
            json!({
                "id": record.id,
                "values": record.values,
                "metadata": {
                    "text": record.metadata.text,
                    "source": record.metadata.source,
                    "page": record.metadata.page,
                },
            })
        })
        .collect::<Vec<_>>();

    json!({ "vectors": vectors, "namespace": namespace })
}

fn parse_matches(response: &Value) -> Vec<QueryMatch> {
    response
        .pointer("/matches")
        .and_then(Value::as_array)
        .map(|matches| {
            matches
                .iter()
                .map(|hit| QueryMatch {
                    id: hit
                        .pointer("/id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    score: hit.pointer("/score").and_then(Value::as_f64).unwrap_or(0.0),
                    metadata: hit.pointer("/metadata").and_then(parse_metadata),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn parse_metadata(metadata: &Value) -> Option<ChunkMetadata> {
    let text = metadata.pointer("/text").and_then(Value::as_str)?;
    // Records written by older tooling use `file_name` instead of `source`.
    let source = metadata
        .pointer("/source")
        .or_else(|| metadata.pointer("/file_name"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let page = metadata
        .pointer("/page")
        .and_then(Value::as_f64)
        .unwrap_or(0.0) as u32;

    Some(ChunkMetadata {
        text: text.to_string(),
        source: source.to_string(),
        page,
    })
}

fn parse_stats(response: &Value) -> IndexStats {
    let namespaces = response
        .pointer("/namespaces")
        .and_then(Value::as_object)
        .map(|namespaces| {
            namespaces
                .iter()
                .map(|(name, summary)| {
                    let count = summary
                        .pointer("/vectorCount")
                        .and_then(Value::as_u64)
                        .unwrap_or(0);
                    (name.clone(), count)
                })
                .collect::<BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    IndexStats {
        dimension: response
            .pointer("/dimension")
            .and_then(Value::as_u64)
            .unwrap_or(0) as usize,
        total_vector_count: response
            .pointer("/totalVectorCount")
            .and_then(Value::as_u64)
            .unwrap_or(0),
        namespaces,
    }
}
