use crate::traits::Embedder;
use crate::ServiceError;
use async_trait::async_trait;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Hashed character-trigram embedding. Deterministic and offline, so it can
/// stand in for the remote embedding service.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

impl CharacterNgramEmbedder {
    fn embed_one(&self, text: &str) -> Vec<f32> {
        let buckets = self.dimensions.max(1);
        let chars: Vec<char> = text.chars().flat_map(char::to_lowercase).collect();

        let mut vector = vec![0f32; buckets];
        for trigram in chars.windows(3) {
            vector[trigram_bucket(trigram, buckets)] += 1.0;
        }
        normalize(&mut vector);
        vector
    }
}

/// FNV-1a over the UTF-8 bytes of the trigram.
fn trigram_bucket(trigram: &[char], buckets: usize) -> usize {
    let mut encoded = [0u8; 4];
    let hash = trigram.iter().fold(FNV_OFFSET_BASIS, |hash, ch| {
        ch.encode_utf8(&mut encoded)
            .bytes()
            .fold(hash, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME))
    });
    (hash % buckets as u64) as usize
}

fn normalize(vector: &mut [f32]) {
    let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        vector.iter_mut().for_each(|value| *value /= magnitude);
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        Ok(texts.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::CharacterNgramEmbedder;
    use crate::traits::Embedder;

    async fn embed(embedder: &CharacterNgramEmbedder, text: &str) -> Vec<f32> {
        embedder
            .embed_query(text)
            .await
            .expect("local embedding cannot fail")
    }

    #[tokio::test]
    async fn same_text_gives_the_same_unit_vector() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embed(&embedder, "Hydraulic pressure and flow").await;
        let second = embed(&embedder, "HYDRAULIC pressure and flow").await;

        assert_eq!(first, second);
        let norm = first.iter().map(|value| value * value).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn short_text_is_the_zero_vector_of_the_configured_length() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let vector = embed(&embedder, "ab").await;

        assert_eq!(vector.len(), 32);
        assert!(vector.iter().all(|value| *value == 0.0));
    }

    #[tokio::test]
    async fn batch_embedding_keeps_input_order() {
        let embedder = CharacterNgramEmbedder::default();
        let texts = vec!["first text".to_string(), "second text".to_string()];

        let vectors = embedder
            .embed_documents(&texts)
            .await
            .expect("local embedding cannot fail");

        assert_eq!(vectors.len(), 2);
        assert_eq!(vectors[0], embed(&embedder, "first text").await);
        assert_eq!(vectors[1], embed(&embedder, "second text").await);
        assert_ne!(vectors[0], vectors[1]);
    }
}
