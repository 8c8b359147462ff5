use crate::models::{Chunk, RetrievedChunk};
use crate::ServiceError;

/// Similarity index over one processed file set. Built in one go and never
/// updated; a new file set gets a new index.
#[derive(Debug, Clone, Default)]
pub struct InMemoryVectorIndex {
    entries: Vec<(Chunk, Vec<f32>)>,
    dimensions: usize,
}

impl InMemoryVectorIndex {
    pub fn build(chunks: Vec<Chunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, ServiceError> {
        if chunks.len() != embeddings.len() {
            return Err(ServiceError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let dimensions = embeddings.first().map(Vec::len).unwrap_or_default();
        if let Some(mismatch) = embeddings.iter().find(|vector| vector.len() != dimensions) {
            return Err(ServiceError::Request(format!(
                "embedding dimension {} != {}",
                mismatch.len(),
                dimensions
            )));
        }

        Ok(Self {
            entries: chunks.into_iter().zip(embeddings).collect(),
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|(chunk, _)| chunk)
    }

    /// Top `k` chunks by cosine similarity, best first. Equal scores keep
    /// insertion order.
    pub fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, ServiceError> {
        if self.entries.is_empty() || k == 0 {
            return Ok(Vec::new());
        }

        if query_vector.len() != self.dimensions {
            return Err(ServiceError::Request(format!(
                "query vector dim {} is not {}",
                query_vector.len(),
                self.dimensions
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, (_, vector))| (position, cosine_similarity(query_vector, vector)))
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1).then(left.0.cmp(&right.0)));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(position, score)| RetrievedChunk {
                chunk: self.entries[position].0.clone(),
                score,
            })
            .collect())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f32 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }
    let dot: f32 = left.iter().zip(right).map(|(a, b)| a * b).sum();
    let norm_left = left.iter().map(|a| a * a).sum::<f32>().sqrt();
    let norm_right = right.iter().map(|b| b * b).sum::<f32>().sqrt();
    if norm_left == 0.0 || norm_right == 0.0 {
        return 0.0;
    }
    dot / (norm_left * norm_right)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u64, text: &str) -> Chunk {
        Chunk {
            chunk_id: format!("chunk-{index}"),
            source: "doc.txt".to_string(),
            chunk_index: index,
            text: text.to_string(),
        }
    }

    fn sample_index() -> InMemoryVectorIndex {
        InMemoryVectorIndex::build(
            vec![chunk(0, "east"), chunk(1, "north"), chunk(2, "north-east")],
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![0.7, 0.7]],
        )
        .expect("index should build")
    }

    #[test]
    fn search_orders_by_similarity() {
        let hits = sample_index()
            .search(&[0.0, 2.0], 3)
            .expect("search should succeed");

        let texts: Vec<&str> = hits.iter().map(|hit| hit.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["north", "north-east", "east"]);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn search_returns_at_most_k() {
        let index = sample_index();
        assert_eq!(index.search(&[1.0, 0.0], 2).expect("search").len(), 2);
        assert_eq!(index.search(&[1.0, 0.0], 10).expect("search").len(), 3);
        assert!(index.search(&[1.0, 0.0], 0).expect("search").is_empty());
    }

    #[test]
    fn equal_scores_keep_insertion_order() {
        let index = InMemoryVectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .expect("index should build");

        let hits = index.search(&[1.0, 0.0], 2).expect("search");
        assert_eq!(hits[0].chunk.text, "a");
        assert_eq!(hits[1].chunk.text, "b");
    }

    #[test]
    fn mismatched_inputs_are_rejected() {
        assert!(InMemoryVectorIndex::build(vec![chunk(0, "a")], Vec::new()).is_err());
        assert!(InMemoryVectorIndex::build(
            vec![chunk(0, "a"), chunk(1, "b")],
            vec![vec![1.0, 0.0], vec![1.0]],
        )
        .is_err());
        assert!(sample_index().search(&[1.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn empty_index_finds_nothing() {
        let index = InMemoryVectorIndex::build(Vec::new(), Vec::new()).expect("empty build");
        assert!(index.is_empty());
        assert!(index.search(&[1.0], 3).expect("search").is_empty());
    }

    #[test]
    fn cosine_similarity_edge_cases() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 1.0]), 0.0);
    }
}
