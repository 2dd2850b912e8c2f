use anyhow::{Result, anyhow};
use async_openai::{Client, config::OpenAIConfig, types::CreateEmbeddingRequestArgs};
use async_trait::async_trait;

/// Provider-agnostic embedding trait for generating vectors from text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| anyhow!("Embedding provider returned no vector"))
    }

    /// Generate embeddings for a batch of texts, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;
}

/// Embeddings from the OpenAI `/v1/embeddings` endpoint.
pub struct OpenAIEmbeddings {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbeddings {
    pub fn new(config: OpenAIConfig, model: String, dimensions: usize) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            dimensions,
        }
    }

    /// Only the v3 embedding models accept a `dimensions` override.
    fn supports_dimensions(&self) -> bool {
        self.model.starts_with("text-embedding-3")
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddings {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model).input(texts.to_vec());
        if self.supports_dimensions() {
            args.dimensions(self.dimensions as u32);
        }
        let request = args.build()?;

        let mut data = self.client.embeddings().create(request).await?.data;
        if data.len() != texts.len() {
            return Err(anyhow!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            ));
        }
        data.sort_by_key(|embedding| embedding.index);
        Ok(data.into_iter().map(|embedding| embedding.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
