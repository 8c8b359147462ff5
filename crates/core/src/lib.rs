pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod store;
pub mod traits;

pub use chunking::{build_chunks, ChunkingConfig, RecursiveTextSplitter};
pub use embeddings::{CharacterNgramEmbedder, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{IngestError, RagError, ServiceError};
pub use extractor::{extract_text, LopdfExtractor, PageText, PdfExtractor};
pub use ingest::{ingest_uploads, FileSummary, IngestionReport};
pub use models::{
    ChatMessage, Chunk, DocumentKind, RagOptions, RetrievedChunk, Role, UploadedFile,
};
pub use orchestrator::{build_prompt, RagCoordinator, FALLBACK_ANSWER};
pub use providers::{OpenAiClient, OpenAiConfig};
pub use session::Session;
pub use store::InMemoryVectorIndex;
pub use traits::{ChatModel, Embedder};
