use crate::chunking::{ChunkingConfig, RecursiveTextSplitter};
use crate::ingest::{ingest_uploads, IngestionReport};
use crate::store::InMemoryVectorIndex;
use crate::traits::{ChatModel, Embedder};
use crate::{
    ChatMessage, Chunk, IngestError, RagOptions, RetrievedChunk, ServiceError, UploadedFile,
};
use tracing::{debug, info};

pub const FALLBACK_ANSWER: &str =
    "No documents have been processed or no relevant chunks were found.";

const SYSTEM_PREAMBLE: &str =
    "You are a helpful assistant. Use the following context to answer the question.";

pub struct RagCoordinator<E, C>
where
    E: Embedder,
    C: ChatModel,
{
    embedder: E,
    chat: C,
    options: RagOptions,
    splitter: RecursiveTextSplitter,
}

impl<E, C> RagCoordinator<E, C>
where
    E: Embedder,
    C: ChatModel,
{
    pub fn new(embedder: E, chat: C) -> Self {
        Self {
            embedder,
            chat,
            options: RagOptions::default(),
            splitter: RecursiveTextSplitter::default(),
        }
    }

    pub fn with_options(embedder: E, chat: C, options: RagOptions) -> Result<Self, IngestError> {
        let splitter = RecursiveTextSplitter::new(ChunkingConfig::from(&options))?;
        Ok(Self {
            embedder,
            chat,
            options,
            splitter,
        })
    }

    pub fn ingest(&self, files: &[UploadedFile]) -> Result<IngestionReport, IngestError> {
        ingest_uploads(files, &self.splitter)
    }

    /// Embeds every chunk through one `embed_documents` call. Any service
    /// failure aborts the build, so a half-embedded index never exists.
    pub async fn build_index(&self, chunks: Vec<Chunk>) -> Result<InMemoryVectorIndex, ServiceError> {
        if chunks.is_empty() {
            return InMemoryVectorIndex::build(Vec::new(), Vec::new());
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let embeddings = self.embedder.embed_documents(&texts).await?;
        let index = InMemoryVectorIndex::build(chunks, embeddings)?;

        info!(
            chunk_count = index.len(),
            dimensions = index.dimensions(),
            "built vector index"
        );
        Ok(index)
    }

    /// Up to `top_k` chunks closest to the question. No index, or an empty
    /// one, means nothing has been processed yet and yields no chunks.
    pub async fn retrieve(
        &self,
        question: &str,
        index: Option<&InMemoryVectorIndex>,
    ) -> Result<Vec<RetrievedChunk>, ServiceError> {
        let Some(index) = index.filter(|index| !index.is_empty()) else {
            return Ok(Vec::new());
        };

        let query_vector = self.embedder.embed_query(question).await?;
        index.search(&query_vector, self.options.top_k)
    }

    pub async fn generate_answer(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
    ) -> Result<String, ServiceError> {
        if chunks.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let messages = build_prompt(question, chunks);
        debug!(context = %join_context(chunks), "retrieved context");

        let answer = self.chat.complete(&messages, self.options.temperature).await?;
        info!(
            context_chunks = chunks.len(),
            answer_chars = answer.chars().count(),
            "generated answer"
        );
        Ok(answer)
    }

    pub async fn answer(
        &self,
        question: &str,
        index: Option<&InMemoryVectorIndex>,
    ) -> Result<String, ServiceError> {
        let chunks = self.retrieve(question, index).await?;
        self.generate_answer(question, &chunks).await
    }
}

pub fn join_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|retrieved| retrieved.chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// System message carrying the retrieved context, followed by the user
/// message carrying the question.
pub fn build_prompt(question: &str, chunks: &[RetrievedChunk]) -> Vec<ChatMessage> {
    let context = join_context(chunks);
    vec![
        ChatMessage::system(format!("{SYSTEM_PREAMBLE}\n\nContext:\n{context}")),
        ChatMessage::user(format!("Question: {question}")),
    ]
}
