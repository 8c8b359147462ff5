use crate::chunking::{build_chunks, RecursiveTextSplitter};
use crate::extractor::extract_text;
use crate::models::{Chunk, DocumentKind, UploadedFile};
use crate::IngestError;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Serialize)]
pub struct FileSummary {
    pub name: String,
    pub kind: DocumentKind,
    pub characters: usize,
    pub chunk_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub files: Vec<FileSummary>,
    pub chunks: Vec<Chunk>,
}

/// Extracts and chunks every upload in order. The first unreadable file
/// aborts the whole batch.
pub fn ingest_uploads(
    files: &[UploadedFile],
    splitter: &RecursiveTextSplitter,
) -> Result<IngestionReport, IngestError> {
    let mut report = IngestionReport::default();
    let mut cursor = 0u64;

    for file in files {
        let kind = file.kind().ok_or_else(|| IngestError::UnsupportedFile {
            file: file.name.clone(),
            mime_type: file.mime_type.clone(),
        })?;
        let text = extract_text(file)?;
        let (chunks, next_cursor) = build_chunks(&file.name, &text, splitter, cursor);
        cursor = next_cursor;

        debug!(file = %file.name, %kind, chunk_count = chunks.len(), "chunked upload");

        report.files.push(FileSummary {
            name: file.name.clone(),
            kind,
            characters: text.chars().count(),
            chunk_count: chunks.len(),
        });
        report.chunks.extend(chunks);
    }

    Ok(report)
}
