use crate::error::IngestError;
use crate::models::{Chunk, RagOptions};
use sha2::{Digest, Sha256};
use tracing::warn;

pub const DEFAULT_SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&RagOptions> for ChunkingConfig {
    fn from(value: &RagOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

/// Splits text on the coarsest separator present, recursing with finer
/// separators into pieces that are still too long, then merges neighbouring
/// pieces back into chunks of at most `chunk_size` characters. Consecutive
/// chunks share up to `chunk_overlap` characters of trailing pieces.
///
/// Separators are kept at the start of the piece that follows them, so
/// paragraph and line breaks survive inside a chunk.
#[derive(Debug, Clone)]
pub struct RecursiveTextSplitter {
    config: ChunkingConfig,
    separators: Vec<String>,
}

impl RecursiveTextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, IngestError> {
        if config.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                config.chunk_overlap, config.chunk_size
            )));
        }

        Ok(Self {
            config,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        })
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map(String::as_str).unwrap_or_default();
        let mut finer: &[String] = &[];
        for (position, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = "";
                break;
            }
            if text.contains(candidate.as_str()) {
                separator = candidate.as_str();
                finer = &separators[position + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();

        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge_pieces(&pending));
                pending.clear();
            }

            if finer.is_empty() {
                if let Some(trimmed) = trimmed_chunk(piece) {
                    chunks.push(trimmed);
                }
            } else {
                chunks.extend(self.split_recursive(piece, finer));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge_pieces(&pending));
        }

        chunks
    }

    fn merge_pieces(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkingConfig {
            chunk_size,
            chunk_overlap,
        } = self.config;

        let mut chunks = Vec::new();
        let mut window: Vec<&str> = Vec::new();
        let mut total = 0usize;
        let mut front = 0usize;

        for &piece in pieces {
            let length = char_len(piece);

            if total + length > chunk_size {
                if total > chunk_size {
                    warn!(total, chunk_size, "created a chunk longer than the configured size");
                }
                if front < window.len() {
                    if let Some(chunk) = trimmed_chunk(&window[front..].concat()) {
                        chunks.push(chunk);
                    }

                    while front < window.len()
                        && (total > chunk_overlap || total + length > chunk_size)
                    {
                        total -= char_len(window[front]);
                        front += 1;
                    }
                }
            }

            window.push(piece);
            total += length;
        }

        if front < window.len() {
            if let Some(chunk) = trimmed_chunk(&window[front..].concat()) {
                chunks.push(chunk);
            }
        }

        chunks
    }
}

impl Default for RecursiveTextSplitter {
    fn default() -> Self {
        let options = RagOptions::default();
        Self {
            config: ChunkingConfig::from(&options),
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Tags every chunk of `text` with its source file and a running index that
/// starts at `first_index`. Returns the chunks and the next free index.
pub fn build_chunks(
    source: &str,
    text: &str,
    splitter: &RecursiveTextSplitter,
    first_index: u64,
) -> (Vec<Chunk>, u64) {
    let mut cursor = first_index;
    let chunks = splitter
        .split_text(text)
        .into_iter()
        .map(|piece| {
            let chunk = Chunk {
                chunk_id: make_chunk_id(source, cursor, &piece),
                source: source.to_string(),
                chunk_index: cursor,
                text: piece,
            };
            cursor = cursor.saturating_add(1);
            chunk
        })
        .collect();

    (chunks, cursor)
}

fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (position, _) in text.match_indices(separator) {
        if position > start {
            pieces.push(&text[start..position]);
        }
        start = position;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }

    pieces.retain(|piece| !piece.is_empty());
    pieces
}

fn trimmed_chunk(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn make_chunk_id(source: &str, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
