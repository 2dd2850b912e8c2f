//! Retrieval-augmented answers over the museum's text documents.
//!
//! Documents are split into paragraphs, embedded and stored in a vector
//! collection. Queries retrieve the nearest paragraphs, rerank them and let a
//! chat model answer from what was kept. The index is built at most once per
//! process through [`RagAccessor`].

pub mod embeddings;
pub mod index;
pub mod loader;
pub mod qdrant;
pub mod rerank;
pub mod sparse;
pub mod splitter;
pub mod store;

use crate::llm_client::LLMClient;
use anyhow::Result;
use async_trait::async_trait;
use embeddings::EmbeddingProvider;
use index::RagIndex;
use std::{path::PathBuf, sync::Arc};
use store::VectorStore;
use tokio::sync::OnceCell;

#[derive(Debug, Clone)]
pub struct RagConfig {
    pub collection: String,
    pub docs_dir: PathBuf,
    pub embedding_size: usize,
    /// Adds a sparse vector and fuses dense and sparse results.
    pub hybrid: bool,
}

/// The external services an index is built from.
#[derive(Clone)]
pub struct RagComponents {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub store: Arc<dyn VectorStore>,
    pub llm: Arc<dyn LLMClient>,
}

/// Anything that can answer a free-text question from stored knowledge.
#[async_trait]
pub trait KnowledgeBase: Send + Sync {
    async fn query(&self, query: &str, top_k: usize, top_n: usize) -> Result<String>;
}

/// Process-wide entry point to the RAG index.
///
/// The first caller builds the index; concurrent callers wait for that build
/// and every later call gets the same handle. A failed build is not cached,
/// so the next call tries again.
pub struct RagAccessor {
    config: RagConfig,
    components: RagComponents,
    index: OnceCell<Arc<RagIndex>>,
}

impl RagAccessor {
    pub fn new(config: RagConfig, components: RagComponents) -> Self {
        Self {
            config,
            components,
            index: OnceCell::new(),
        }
    }

    pub async fn index(&self) -> Result<Arc<RagIndex>> {
        self.index
            .get_or_try_init(|| async {
                RagIndex::build(&self.config, self.components.clone())
                    .await
                    .map(Arc::new)
            })
            .await
            .cloned()
    }
}

#[async_trait]
impl KnowledgeBase for RagAccessor {
    async fn query(&self, query: &str, top_k: usize, top_n: usize) -> Result<String> {
        self.index().await?.query(query, top_k, top_n).await
    }
}

#[cfg(test)]
impl RagConfig {
    pub(crate) fn for_tests(docs_dir: &std::path::Path, hybrid: bool) -> Self {
        Self {
            collection: "museum_docs".into(),
            docs_dir: docs_dir.to_path_buf(),
            embedding_size: testing::FakeEmbedder::DIMS,
            hybrid,
        }
    }
}

/// In-memory stand-ins for the embedding service and the vector database.
#[cfg(test)]
pub(crate) mod testing {
    use super::{
        embeddings::EmbeddingProvider,
        store::{CollectionSpec, Point, ScoredPoint, SearchQuery, VectorStore},
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use std::{
        collections::{BTreeMap, HashSet},
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };
    use uuid::Uuid;

    /// Buckets lower-cased words into a small fixed-size vector.
    #[derive(Default)]
    pub struct FakeEmbedder {
        batches: AtomicUsize,
    }

    impl FakeEmbedder {
        pub const DIMS: usize = 8;

        pub fn batches(&self) -> usize {
            self.batches.load(Ordering::SeqCst)
        }

        fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0; Self::DIMS];
            for word in text.split_whitespace() {
                let bucket = word
                    .to_lowercase()
                    .bytes()
                    .map(usize::from)
                    .sum::<usize>()
                    % Self::DIMS;
                v[bucket] += 1.0;
            }
            v
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.batches.fetch_add(1, Ordering::SeqCst);
            // Let concurrent callers interleave.
            tokio::task::yield_now().await;
            Ok(texts.iter().map(|t| Self::vector(t)).collect())
        }

        fn model_name(&self) -> &str {
            "fake"
        }

        fn dimensions(&self) -> usize {
            Self::DIMS
        }
    }

    #[derive(Default)]
    pub struct MemoryStore {
        collections: Mutex<HashSet<String>>,
        points: Mutex<BTreeMap<Uuid, Point>>,
        created: AtomicUsize,
    }

    impl MemoryStore {
        pub fn created(&self) -> usize {
            self.created.load(Ordering::SeqCst)
        }

        pub fn len(&self) -> usize {
            self.points.lock().unwrap().len()
        }

        pub fn points(&self) -> Vec<Point> {
            self.points.lock().unwrap().values().cloned().collect()
        }
    }

    #[async_trait]
    impl VectorStore for MemoryStore {
        async fn collection_exists(&self, collection: &str) -> Result<bool> {
            Ok(self.collections.lock().unwrap().contains(collection))
        }

        async fn create_collection(&self, collection: &str, _spec: CollectionSpec) -> Result<()> {
            self.created.fetch_add(1, Ordering::SeqCst);
            self.collections.lock().unwrap().insert(collection.to_string());
            Ok(())
        }

        async fn upsert(&self, _collection: &str, points: Vec<Point>) -> Result<()> {
            let mut stored = self.points.lock().unwrap();
            for point in points {
                stored.insert(point.id, point);
            }
            Ok(())
        }

        async fn search(
            &self,
            _collection: &str,
            query: &SearchQuery,
            limit: usize,
        ) -> Result<Vec<ScoredPoint>> {
            let mut scored: Vec<ScoredPoint> = self
                .points
                .lock()
                .unwrap()
                .values()
                .map(|p| ScoredPoint {
                    score: p.dense.iter().zip(&query.dense).map(|(a, b)| a * b).sum(),
                    payload: p.payload.clone(),
                })
                .collect();
            scored.sort_by(|a, b| b.score.total_cmp(&a.score));
            scored.truncate(limit);
            Ok(scored)
        }
    }

    /// Two documents, three paragraphs.
    pub fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("casa.txt"),
            "La Casa de los Balcones es una casona canaria.\n\nLos balcones son de madera de tea.\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("patio.txt"),
            "El patio central tiene un pozo.",
        )
        .unwrap();
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::MockLLMClient;
    use testing::{FakeEmbedder, MemoryStore, fixture_dir};

    fn accessor(dir: &std::path::Path, embedder: Arc<FakeEmbedder>, llm: MockLLMClient) -> RagAccessor {
        RagAccessor::new(
            RagConfig::for_tests(dir, false),
            RagComponents {
                embedder,
                store: Arc::new(MemoryStore::default()),
                llm: Arc::new(llm),
            },
        )
    }

    #[tokio::test]
    async fn test_concurrent_access_builds_once() {
        let dir = fixture_dir();
        let embedder = Arc::new(FakeEmbedder::default());
        let rag = accessor(dir.path(), embedder.clone(), MockLLMClient::new());
        assert!(!rag.index.initialized());

        let (first, second) = tokio::join!(rag.index(), rag.index());
        let (first, second) = (first.unwrap(), second.unwrap());
        assert!(Arc::ptr_eq(&first, &second));

        let third = rag.index().await.unwrap();
        assert!(Arc::ptr_eq(&first, &third));
        assert!(rag.index.initialized());
        // Three chunks fit in a single embedding batch.
        assert_eq!(embedder.batches(), 1);
    }

    #[tokio::test]
    async fn test_failed_build_is_retried() {
        let dir = tempfile::tempdir().unwrap();
        let docs = dir.path().join("docs");
        let rag = accessor(&docs, Arc::new(FakeEmbedder::default()), MockLLMClient::new());

        assert!(rag.index().await.is_err());
        assert!(!rag.index.initialized());

        std::fs::create_dir(&docs).unwrap();
        std::fs::write(docs.join("a.txt"), "Hola").unwrap();
        assert_eq!(rag.index().await.unwrap().chunk_count(), 1);
    }

    #[tokio::test]
    async fn test_knowledge_base_query_goes_through_index() {
        let dir = fixture_dir();
        let mut llm = MockLLMClient::new();
        llm.expect_complete()
            .times(1)
            .returning(|_, _| Ok("En el patio hay un pozo.".to_string()));
        let rag = accessor(dir.path(), Arc::new(FakeEmbedder::default()), llm);

        let kb: &dyn KnowledgeBase = &rag;
        assert_eq!(kb.query("pozo", 10, 3).await.unwrap(), "En el patio hay un pozo.");
    }
}
