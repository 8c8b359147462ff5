use crate::ingest::IngestionReport;
use crate::orchestrator::RagCoordinator;
use crate::store::InMemoryVectorIndex;
use crate::traits::{ChatModel, Embedder};
use crate::{ChatMessage, RagError, UploadedFile};
use tracing::{info, warn};

/// State of one interactive session: the chat transcript and the index built
/// from the most recently processed file set. Handlers receive it explicitly.
#[derive(Debug, Default)]
pub struct Session {
    transcript: Vec<ChatMessage>,
    index: Option<InMemoryVectorIndex>,
    notice: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    pub fn index(&self) -> Option<&InMemoryVectorIndex> {
        self.index.as_ref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    /// Extracts, chunks and indexes `files`, replacing the previous index.
    /// Does nothing when no files were uploaded. The old index stays in place
    /// if any step fails.
    pub async fn process_files<E, C>(
        &mut self,
        coordinator: &RagCoordinator<E, C>,
        files: &[UploadedFile],
    ) -> Result<Option<IngestionReport>, RagError>
    where
        E: Embedder,
        C: ChatModel,
    {
        if files.is_empty() {
            return Ok(None);
        }

        let report = coordinator.ingest(files).inspect_err(|error| {
            warn!(%error, "could not read uploaded files");
        })?;
        let index = coordinator
            .build_index(report.chunks.clone())
            .await
            .inspect_err(|error| warn!(%error, "could not build index"))?;

        info!(
            files = files.len(),
            chunks = index.len(),
            "processed uploaded files"
        );
        self.index = Some(index);
        self.notice = Some(format!(
            "Processed {} file(s) and created embeddings.",
            files.len()
        ));

        Ok(Some(report))
    }

    /// Records the question as submitted, answers it from the current index
    /// and records the answer. Blank questions are ignored. On failure the question stays
    /// in the transcript without an answer.
    pub async fn ask<E, C>(
        &mut self,
        coordinator: &RagCoordinator<E, C>,
        question: &str,
    ) -> Result<Option<String>, RagError>
    where
        E: Embedder,
        C: ChatModel,
    {
        let trimmed = question.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }

        self.transcript.push(ChatMessage::user(question));

        let answer = coordinator
            .answer(trimmed, self.index.as_ref())
            .await
            .inspect_err(|error| warn!(%error, "could not answer question"))?;

        self.transcript.push(ChatMessage::assistant(answer.clone()));
        Ok(Some(answer))
    }
}
