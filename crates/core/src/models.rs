use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_INDEX_NAME: &str = "actuary-docs";
pub const DEFAULT_DOCUMENTS_DIR: &str = "public/docs";
pub const RETRIEVAL_TOP_K: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeliveryStatus>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>, status: DeliveryStatus) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
            status: Some(status),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, DeliveryStatus::Sending)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, DeliveryStatus::Sent)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PdfChunk {
    pub chunk_id: String,
    pub source: String,
    pub page: u32,
    pub chunk_index: u64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChunkMetadata {
    pub text: String,
    pub source: String,
    pub page: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: ChunkMetadata,
}

impl VectorRecord {
    pub fn from_chunk(chunk: &PdfChunk, values: Vec<f32>) -> Self {
        Self {
            id: chunk.chunk_id.clone(),
            values,
            metadata: ChunkMetadata {
                text: chunk.text.clone(),
                source: chunk.source.clone(),
                page: chunk.page,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMatch {
    pub id: String,
    pub score: f64,
    pub metadata: Option<ChunkMetadata>,
}

impl QueryMatch {
    pub fn text(&self) -> Option<&str> {
        self.metadata.as_ref().map(|metadata| metadata.text.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexStats {
    pub dimension: usize,
    pub total_vector_count: u64,
    pub namespaces: BTreeMap<String, u64>,
}

#[derive(Debug, Clone)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub upsert_batch_size: usize,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1_000,
            chunk_overlap: 200,
            upsert_batch_size: 100,
        }
    }
}

pub const DEFAULT_SYSTEM_PROMPT: &str = "당신은 한국의 계리사들을 돕는 AI 어시스턴트입니다.
전문성과 정확성을 바탕으로 다음 원칙을 따라 응답해주세요:

오직 제공된 문서 내용을 기반으로 답변하고, 문서에 없는 내용에 대해서는 답변하지마세요.
답변 시 참고한 문서의 내용을 반드시 해당 파일명과 페이지를 인용하여 설명해주세요.

보험료 산출, 준비금 평가, 손해율 가정 등 계리적 가정과 모델와 같은 실무에 필요한 설명 제공

1. 관련 법규와 규정을 고려하여 조언
   - 보험업법, 감독규정, IFRS17 등 관련 규정 참조
   - 법규 준수 사항 강조

2. 불확실한 내용에 대해서는 명확히 한계점 언급
   - 추가 검토나 전문가 확인이 필요한 사항 명시
   - 가정이나 제한사항 명확히 설명";

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_k: usize,
    pub system_prompt: String,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.7,
            max_tokens: 500,
            top_k: RETRIEVAL_TOP_K,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}
