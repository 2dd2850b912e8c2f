//! [`VectorStore`] backed by a Qdrant server's REST API.

use super::store::{
    ChunkPayload, CollectionSpec, DENSE_VECTOR, Point, SPARSE_VECTOR, ScoredPoint, SearchQuery,
    VectorStore,
};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

const UPSERT_BATCH_SIZE: usize = 64;

pub struct QdrantStore {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct QdrantResponse<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct QueryResult {
    points: Vec<QueryPoint>,
}

#[derive(Deserialize)]
struct QueryPoint {
    score: f32,
    payload: Option<ChunkPayload>,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("api-key", key),
            None => request,
        }
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Qdrant request failed with {}: {}", status, body));
        }
        Ok(response.json::<QdrantResponse<T>>().await?.result)
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn collection_exists(&self, collection: &str) -> Result<bool> {
        let result: ExistsResult = self
            .execute(self.http.get(self.url(&format!("/collections/{collection}/exists"))))
            .await
            .with_context(|| format!("Failed to check collection '{collection}'"))?;
        Ok(result.exists)
    }

    async fn create_collection(&self, collection: &str, spec: CollectionSpec) -> Result<()> {
        info!(collection, ?spec, "Creating Qdrant collection");
        let _: Value = self
            .execute(
                self.http
                    .put(self.url(&format!("/collections/{collection}")))
                    .json(&collection_body(spec)),
            )
            .await
            .with_context(|| format!("Failed to create collection '{collection}'"))?;
        Ok(())
    }

    async fn upsert(&self, collection: &str, points: Vec<Point>) -> Result<()> {
        for batch in points.chunks(UPSERT_BATCH_SIZE) {
            debug!(collection, points = batch.len(), "Upserting points");
            let _: Value = self
                .execute(
                    self.http
                        .put(self.url(&format!("/collections/{collection}/points?wait=true")))
                        .json(&upsert_body(batch)),
                )
                .await
                .with_context(|| format!("Failed to upsert points into '{collection}'"))?;
        }
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        query: &SearchQuery,
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let result: QueryResult = self
            .execute(
                self.http
                    .post(self.url(&format!("/collections/{collection}/points/query")))
                    .json(&query_body(query, limit)),
            )
            .await
            .with_context(|| format!("Failed to query collection '{collection}'"))?;
        Ok(result
            .points
            .into_iter()
            .filter_map(|point| {
                point.payload.map(|payload| ScoredPoint {
                    score: point.score,
                    payload,
                })
            })
            .collect())
    }
}

fn collection_body(spec: CollectionSpec) -> Value {
    let mut body = json!({
        "vectors": {
            DENSE_VECTOR: { "size": spec.dense_size, "distance": "Cosine" }
        }
    });
    if spec.hybrid {
        body["sparse_vectors"] = json!({ SPARSE_VECTOR: {} });
    }
    body
}

fn upsert_body(points: &[Point]) -> Value {
    let points: Vec<Value> = points
        .iter()
        .map(|point| {
            let mut vector = Map::new();
            vector.insert(DENSE_VECTOR.to_string(), json!(point.dense));
            if let Some(sparse) = &point.sparse {
                vector.insert(SPARSE_VECTOR.to_string(), json!(sparse));
            }
            json!({
                "id": point.id.to_string(),
                "vector": vector,
                "payload": point.payload,
            })
        })
        .collect();
    json!({ "points": points })
}

/// Dense-only search, or dense and sparse prefetches fused with RRF.
fn query_body(query: &SearchQuery, limit: usize) -> Value {
    match &query.sparse {
        Some(sparse) if !sparse.is_empty() => json!({
            "prefetch": [
                { "query": query.dense, "using": DENSE_VECTOR, "limit": limit },
                { "query": sparse, "using": SPARSE_VECTOR, "limit": limit },
            ],
            "query": { "fusion": "rrf" },
            "limit": limit,
            "with_payload": true,
        }),
        _ => json!({
            "query": query.dense,
            "using": DENSE_VECTOR,
            "limit": limit,
            "with_payload": true,
        }),
    }
}
