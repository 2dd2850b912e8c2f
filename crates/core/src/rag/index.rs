use super::{
    RagComponents, RagConfig,
    loader::load_documents,
    rerank::LexicalReranker,
    sparse,
    splitter::{Chunk, ParagraphSplitter},
    store::{ChunkPayload, CollectionSpec, Point, ScoredPoint, SearchQuery},
};
use anyhow::{Result, anyhow, bail};
use tracing::{debug, info, instrument};

const EMBED_BATCH_SIZE: usize = 64;

/// Returned when nothing relevant was retrieved.
pub const EMPTY_RESPONSE: &str = "Empty Response";

const SYNTHESIS_SYSTEM_PROMPT: &str = "You answer questions about a museum using only the \
context you are given. If the context does not contain the answer, say that you do not know. \
Answer in the language of the question.";

/// A built, queryable view over one vector-store collection.
pub struct RagIndex {
    collection: String,
    hybrid: bool,
    components: RagComponents,
    reranker: LexicalReranker,
    chunk_count: usize,
}

impl RagIndex {
    /// Loads and splits the documents, makes sure the collection exists and
    /// upserts every chunk. Chunk ids are stable, so rebuilding is idempotent.
    #[instrument(skip_all, fields(collection = %config.collection))]
    pub async fn build(config: &RagConfig, components: RagComponents) -> Result<Self> {
        let documents = load_documents(&config.docs_dir)?;
        let chunks = ParagraphSplitter::new()?.split_all(&documents);
        info!(
            documents = documents.len(),
            chunks = chunks.len(),
            "Building RAG index"
        );

        let embedder = &components.embedder;
        if embedder.dimensions() != config.embedding_size {
            bail!(
                "Embedding model {} produces {} dimensions, collection expects {}",
                embedder.model_name(),
                embedder.dimensions(),
                config.embedding_size
            );
        }

        let store = &components.store;
        if !store.collection_exists(&config.collection).await? {
            store
                .create_collection(
                    &config.collection,
                    CollectionSpec {
                        dense_size: config.embedding_size,
                        hybrid: config.hybrid,
                    },
                )
                .await?;
        }

        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let vectors = components.embedder.embed_batch(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding provider returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                );
            }
            let points = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, dense)| to_point(chunk, dense, config))
                .collect::<Result<Vec<_>>>()?;
            store.upsert(&config.collection, points).await?;
        }

        info!(chunks = chunks.len(), "RAG index ready");
        Ok(Self {
            collection: config.collection.clone(),
            hybrid: config.hybrid,
            components,
            reranker: LexicalReranker::default(),
            chunk_count: chunks.len(),
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunk_count
    }

    /// The `top_k` nearest chunks for `query`.
    pub async fn retrieve(&self, query: &str, top_k: usize) -> Result<Vec<ScoredPoint>> {
        let dense = self.components.embedder.embed(query).await?;
        let search = SearchQuery {
            dense,
            sparse: self.hybrid.then(|| sparse::encode(query)),
        };
        self.components
            .store
            .search(&self.collection, &search, top_k)
            .await
    }

    /// Retrieves `top_k` candidates, keeps the best `top_n` and asks the chat
    /// model to answer from them.
    #[instrument(skip(self))]
    pub async fn query(&self, query: &str, top_k: usize, top_n: usize) -> Result<String> {
        if query.trim().is_empty() {
            bail!("Query must not be empty");
        }
        let candidates = self.retrieve(query, top_k.max(1)).await?;
        let kept = self.reranker.rerank(query, candidates, top_n.max(1));
        debug!(kept = kept.len(), "Reranked RAG candidates");
        if kept.is_empty() {
            return Ok(EMPTY_RESPONSE.to_string());
        }

        self.components
            .llm
            .complete(
                SYNTHESIS_SYSTEM_PROMPT.to_string(),
                synthesis_prompt(query, &kept),
            )
            .await
    }
}

fn to_point(chunk: &Chunk, dense: Vec<f32>, config: &RagConfig) -> Result<Point> {
    if dense.len() != config.embedding_size {
        return Err(anyhow!(
            "Embedding has {} dimensions, collection expects {}",
            dense.len(),
            config.embedding_size
        ));
    }
    Ok(Point {
        id: chunk.id,
        dense,
        sparse: config.hybrid.then(|| sparse::encode(&chunk.text)),
        payload: ChunkPayload {
            text: chunk.text.clone(),
            doc_id: chunk.doc_id.clone(),
            chunk_index: chunk.index,
        },
    })
}

fn synthesis_prompt(query: &str, context: &[ScoredPoint]) -> String {
    let context = context
        .iter()
        .map(|point| format!("file_name: {}\n\n{}", point.payload.doc_id, point.payload.text))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Context information is below.\n---------------------\n{context}\n---------------------\n\
         Given the context information and not prior knowledge, answer the query.\n\
         Query: {query}\nAnswer: "
    )
}
