use super::sparse::SparseVector;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DENSE_VECTOR: &str = "text-dense";
pub const SPARSE_VECTOR: &str = "text-sparse";

/// Shape of a collection: dense size, plus a sparse vector when hybrid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionSpec {
    pub dense_size: usize,
    pub hybrid: bool,
}

/// What is stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    pub doc_id: String,
    pub chunk_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub id: Uuid,
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
    pub payload: ChunkPayload,
}

/// A dense query, optionally fused with a sparse one.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub dense: Vec<f32>,
    pub sparse: Option<SparseVector>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredPoint {
    pub score: f32,
    pub payload: ChunkPayload,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool>;

    async fn create_collection(&self, collection: &str, spec: CollectionSpec) -> Result<()>;

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()>;

    /// Best matches first, at most `limit`.
    async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>>;
}
