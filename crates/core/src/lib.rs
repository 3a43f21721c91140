pub mod chat;
pub mod chunking;
pub mod completion;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod maintenance;
pub mod models;
pub mod retrieval;
pub mod stores;
pub mod traits;

pub use chat::{build_prompt, ChatService};
pub use chunking::{build_chunks, split_text, ChunkingConfig};
pub use completion::{EchoCompletion, OpenAiChat};
pub use conversation::Conversation;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
    OPENAI_EMBEDDING_DIMENSIONS,
};
pub use error::{ChatError, IngestError, SearchError};
pub use extractor::{extract_page_texts, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{discover_pdf_files, FileReport, IngestionPipeline, IngestionReport};
pub use models::{
    ChatOptions, ChunkMetadata, DeliveryStatus, IndexStats, IngestionOptions, Message, PdfChunk,
    QueryMatch, Role, VectorRecord, DEFAULT_DOCUMENTS_DIR, DEFAULT_INDEX_NAME, RETRIEVAL_TOP_K,
};
pub use retrieval::Retriever;
pub use stores::{InMemoryIndex, PineconeStore};
pub use traits::{CompletionModel, PromptMessage, VectorIndex};
