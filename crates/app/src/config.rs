use actuary_rag_core::embeddings::OPENAI_BASE_URL;
use actuary_rag_core::{
    CharacterNgramEmbedder, ChatOptions, ChatService, CompletionModel, EchoCompletion, Embedder,
    InMemoryIndex, IngestionOptions, IngestionPipeline, LopdfExtractor, OpenAiChat,
    OpenAiEmbedder, PineconeStore, Retriever, VectorIndex, DEFAULT_INDEX_NAME,
};
use anyhow::Context;
use clap::Args;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct ServiceArgs {
    /// OpenAI API key used for embeddings and chat completions
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "OPENAI_BASE_URL", default_value = OPENAI_BASE_URL, global = true)]
    pub openai_base_url: String,

    /// Chat completion model
    #[arg(long, default_value = "gpt-3.5-turbo", global = true)]
    pub chat_model: String,

    /// Sampling temperature for chat completions
    #[arg(long, default_value_t = 0.7, global = true)]
    pub temperature: f32,

    /// Maximum tokens of a generated reply
    #[arg(long, default_value_t = 500, global = true)]
    pub max_tokens: u32,

    /// Pinecone API key
    #[arg(long, env = "PINECONE_API_KEY", hide_env_values = true, global = true)]
    pub pinecone_api_key: Option<String>,

    /// Pinecone index name
    #[arg(long, env = "PINECONE_INDEX", default_value = DEFAULT_INDEX_NAME, global = true)]
    pub pinecone_index: String,

    /// Pinecone data-plane host; resolved from the index name when omitted
    #[arg(long, env = "PINECONE_HOST", global = true)]
    pub pinecone_host: Option<String>,

    /// Pinecone namespace
    #[arg(long, env = "PINECONE_NAMESPACE", default_value = "", global = true)]
    pub pinecone_namespace: String,

    /// Chunk size in characters
    #[arg(long, default_value_t = 1_000, global = true)]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 200, global = true)]
    pub chunk_overlap: usize,

    /// Records per upsert request
    #[arg(long, default_value_t = 100, global = true)]
    pub upsert_batch_size: usize,

    /// Run without external services: local n-gram embeddings, in-memory index, echo replies
    #[arg(long, default_value_t = false, global = true)]
    pub offline: bool,
}

impl ServiceArgs {
    pub fn chat_options(&self) -> ChatOptions {
        ChatOptions {
            model: self.chat_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            ..ChatOptions::default()
        }
    }

    pub fn ingestion_options(&self) -> IngestionOptions {
        IngestionOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            upsert_batch_size: self.upsert_batch_size,
        }
    }

    fn openai_key(&self) -> anyhow::Result<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("OPENAI_API_KEY is not set (pass --offline to run without it)")
    }

    fn pinecone_key(&self) -> anyhow::Result<&str> {
        self.pinecone_api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .context("PINECONE_API_KEY is not set (pass --offline to run without it)")
    }
}

pub struct Services {
    pub index: Arc<dyn VectorIndex>,
    pub retriever: Arc<Retriever>,
    pub chat: Arc<ChatService>,
    pub ingestion: Arc<IngestionPipeline>,
}

pub async fn build_services(args: &ServiceArgs) -> anyhow::Result<Services> {
    let (embedder, index, completion): (
        Arc<dyn Embedder>,
        Arc<dyn VectorIndex>,
        Arc<dyn CompletionModel>,
    ) = if args.offline {
        info!("offline mode: in-memory index, n-gram embeddings, echo completions");
        (
            Arc::new(CharacterNgramEmbedder::default()),
            Arc::new(InMemoryIndex::new()),
            Arc::new(EchoCompletion),
        )
    } else {
        let openai_key = args.openai_key()?;
        let pinecone_key = args.pinecone_key()?;

        let store = match &args.pinecone_host {
            Some(host) => PineconeStore::new(host, pinecone_key)?,
            None => PineconeStore::connect(pinecone_key, &args.pinecone_index)
                .await
                .with_context(|| format!("resolving pinecone index {}", args.pinecone_index))?,
        }
        .with_namespace(args.pinecone_namespace.clone());

        (
            Arc::new(OpenAiEmbedder::new(openai_key).with_base_url(&args.openai_base_url)),
            Arc::new(store),
            Arc::new(
                OpenAiChat::new(openai_key, &args.chat_options())
                    .with_base_url(&args.openai_base_url),
            ),
        )
    };

    let retriever = Arc::new(Retriever::new(embedder.clone(), index.clone()));
    let chat = Arc::new(ChatService::new(
        retriever.clone(),
        completion,
        args.chat_options(),
    ));
    let ingestion = Arc::new(IngestionPipeline::new(
        Arc::new(LopdfExtractor),
        embedder,
        index.clone(),
        args.ingestion_options(),
    ));

    Ok(Services {
        index,
        retriever,
        chat,
        ingestion,
    })
}
