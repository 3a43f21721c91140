pub mod memory;
pub mod pinecone;

pub use memory::InMemoryIndex;
pub use pinecone::PineconeStore;
