use crate::{ChatMessage, ServiceError};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in input order.
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let mut vectors = self.embed_documents(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| ServiceError::Request("embedding service returned no vector".to_string()))
    }
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ServiceError>;
}

#[async_trait]
impl<T> Embedder for Arc<T>
where
    T: Embedder + ?Sized,
{
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ServiceError> {
        (**self).embed_documents(texts).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        (**self).embed_query(text).await
    }
}

#[async_trait]
impl<T> ChatModel for Arc<T>
where
    T: ChatModel + ?Sized,
{
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
    ) -> Result<String, ServiceError> {
        (**self).complete(messages, temperature).await
    }
}
