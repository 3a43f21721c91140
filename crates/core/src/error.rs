use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("extraction task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("conversation has no messages")]
    EmptyConversation,

    #[error("conversation has no user message")]
    NoUserMessage,

    #[error("completion returned no choices")]
    EmptyCompletion,

    #[error(transparent)]
    Search(#[from] SearchError),
}

impl SearchError {
    pub(crate) fn backend(backend: &str, details: impl Into<String>) -> Self {
        Self::BackendResponse {
            backend: backend.to_string(),
            details: details.into(),
        }
    }
}

pub type Result<T, E = IngestError> = std::result::Result<T, E>;
